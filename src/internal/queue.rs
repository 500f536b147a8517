// SPDX-License-Identifier: MPL-2.0

//! Ordered cursor over the candidate versions of one project.

use crate::constraint::Constraint;
use crate::error::{CandidateFailure, Rejection};
use crate::project::{LockedProject, ProjectIdentifier};
use crate::type_aliases::FxIndexSet;
use crate::version::{Revision, Version};

#[derive(Debug, Clone)]
pub(crate) struct VersionQueue {
    pub(crate) ident: ProjectIdentifier,
    candidates: Vec<Version>,
    cursor: usize,
    /// Local names of projects whose decisions rejected candidates of this
    /// queue. Backjumping targets the most recent of them.
    pub(crate) culprits: FxIndexSet<String>,
    pub(crate) failures: Vec<CandidateFailure>,
}

impl VersionQueue {
    /// Candidates are tried in this order: the locked version, a revision
    /// that only a constraint names, then the listing (already sorted for
    /// the solve's direction) without the entries seen before.
    pub(crate) fn new(
        ident: ProjectIdentifier,
        locked: Option<Version>,
        injected: Option<Revision>,
        listed: &[Version],
    ) -> Self {
        let mut candidates: Vec<Version> = Vec::with_capacity(listed.len() + 2);
        let head = locked
            .into_iter()
            .chain(injected.map(Version::Revision));
        for v in head.chain(listed.iter().cloned()) {
            if !candidates.contains(&v) {
                candidates.push(v);
            }
        }
        Self {
            ident,
            candidates,
            cursor: 0,
            culprits: FxIndexSet::default(),
            failures: Vec::new(),
        }
    }

    /// A queue with nothing to offer, for a project that could not be queried.
    pub(crate) fn empty(ident: ProjectIdentifier, rejection: Rejection) -> Self {
        let mut queue = Self::new(ident, None, None, &[]);
        queue.failures.push(CandidateFailure {
            version: None,
            rejection,
        });
        queue
    }

    pub(crate) fn current(&self) -> Option<&Version> {
        self.candidates.get(self.cursor)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.cursor >= self.candidates.len()
    }

    /// Drop the current candidate, recording why if it was rejected.
    pub(crate) fn advance(&mut self, rejection: Option<Rejection>) {
        if let Some(rejection) = rejection {
            self.blame(rejection.culprits().iter().map(|id| id.local_name.clone()));
            self.failures.push(CandidateFailure {
                version: self.current().cloned(),
                rejection,
            });
        }
        self.cursor += 1;
    }

    pub(crate) fn blame(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            if name != self.ident.local_name {
                self.culprits.insert(name);
            }
        }
    }
}

/// The candidate a lock entry stands for.
///
/// A locked version name is replaced by its listed pair, so that it carries
/// a revision. A bare locked revision becomes the first listed version
/// pointing at it that `constraint` accepts, and stays a bare revision when
/// there is none.
pub(crate) fn locked_candidate(
    locked: &LockedProject,
    listed: &[Version],
    constraint: &Constraint,
) -> Version {
    match &locked.version {
        Version::Paired(_) => locked.version.clone(),
        Version::Unpaired(u) => listed
            .iter()
            .find(|v| matches!(v, Version::Paired(p) if p.unpaired() == u))
            .unwrap_or(&locked.version)
            .clone(),
        Version::Revision(rev) => listed
            .iter()
            .find(|v| v.revision() == Some(rev) && constraint.matches(v))
            .unwrap_or(&locked.version)
            .clone(),
    }
}
