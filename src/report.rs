// SPDX-License-Identifier: MPL-2.0

//! Structured progress events.
//!
//! A [Tracer] observes a solve without influencing it: the solver makes the
//! same decisions with or without one attached.

use std::fmt::{self, Display, Write as _};

use crate::error::Rejection;
use crate::project::{Atom, ProjectIdentifier};
use crate::version::Version;

/// A step of the solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// The root project was analysed.
    RootSelected {
        root: ProjectIdentifier,
        /// Internal packages with a valid reach.
        internal_packages: usize,
        /// External packages imported, across all projects.
        external_packages: usize,
        /// Projects those packages belong to.
        projects: usize,
    },
    /// The solver is looking for a version, or for packages, of a project.
    Attempting {
        ident: ProjectIdentifier,
        packages: usize,
        /// Project selections on the stack.
        depth: usize,
        /// Only packages are missing; the version is already selected.
        addition: bool,
    },
    Selected {
        atom: Atom,
        packages: usize,
        depth: usize,
    },
    Rejected {
        ident: ProjectIdentifier,
        version: Option<Version>,
        rejection: Rejection,
        depth: usize,
    },
    /// Selections down to and including `to` were undone.
    Backjump {
        from: ProjectIdentifier,
        to: ProjectIdentifier,
        depth: usize,
    },
    Solved {
        packages: usize,
        projects: usize,
        attempts: usize,
    },
    Failed,
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootSelected {
                root,
                internal_packages,
                external_packages,
                projects,
            } => write!(
                f,
                "root project is {root}: {internal_packages} internal packages, \
                 {external_packages} external packages from {projects} projects"
            ),
            Self::Attempting {
                ident,
                packages,
                addition,
                ..
            } => {
                if *addition {
                    write!(f, "? adding {packages} packages of {ident}")
                } else {
                    write!(f, "? attempting {ident} (with {packages} packages)")
                }
            }
            Self::Selected { atom, .. } => write!(f, "✓ select {atom}"),
            Self::Rejected {
                ident,
                version: Some(version),
                rejection,
                ..
            } => write!(f, "✗ {ident} at {version}: {rejection}"),
            Self::Rejected {
                ident, rejection, ..
            } => write!(f, "✗ {ident}: {rejection}"),
            Self::Backjump { from, to, .. } => write!(f, "← backjump from {from} to {to}"),
            Self::Solved {
                packages, projects, ..
            } => write!(
                f,
                "✓ found solution with {packages} packages from {projects} projects"
            ),
            Self::Failed => f.write_str("✗ solving failed"),
        }
    }
}

/// Receives [TraceEvent]s as the solve progresses.
pub trait Tracer {
    fn trace(&mut self, event: &TraceEvent);
}

/// Discards every event.
impl Tracer for () {
    fn trace(&mut self, _event: &TraceEvent) {}
}

/// Records every event.
impl Tracer for Vec<TraceEvent> {
    fn trace(&mut self, event: &TraceEvent) {
        self.push(event.clone());
    }
}

/// Writes each event as an indented line, one level per selection on the
/// stack.
pub struct TextTracer<W: fmt::Write> {
    out: W,
}

impl<W: fmt::Write> TextTracer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: fmt::Write> Tracer for TextTracer<W> {
    fn trace(&mut self, event: &TraceEvent) {
        let depth = match event {
            TraceEvent::Attempting { depth, .. }
            | TraceEvent::Rejected { depth, .. } => depth + 1,
            TraceEvent::Selected { depth, .. } | TraceEvent::Backjump { depth, .. } => *depth,
            _ => 0,
        };
        // A tracer has nowhere to report its own failures.
        let _ = writeln!(self.out, "{}{event}", "| ".repeat(depth));
    }
}
