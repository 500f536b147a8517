// SPDX-License-Identifier: MPL-2.0

//! Non exposed modules.

mod queue;
mod selection;

pub(crate) use queue::{locked_candidate, VersionQueue};
pub(crate) use selection::{Pending, SearchState, Selection};
