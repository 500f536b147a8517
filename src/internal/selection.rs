// SPDX-License-Identifier: MPL-2.0

//! The selection stack and everything derived from it.
//!
//! The stack is the only mutable search state. Constraints, required
//! packages and pending work are all recomputed from it, so backjumping is a
//! plain truncation.

use crate::constraint::Constraint;
use crate::internal::queue::VersionQueue;
use crate::project::{AtomWithPackages, CompleteDep, ProjectIdentifier};
use crate::type_aliases::{FxIndexMap, FxIndexSet};
use crate::version::Version;

/// One entry of the selection stack.
///
/// A project selection owns the queue it was picked from. Entries that only
/// add packages to an already selected project carry no queue; backjumping
/// skips over them.
#[derive(Debug, Clone)]
pub(crate) struct Selection {
    pub(crate) atom: AtomWithPackages,
    pub(crate) deps: Vec<CompleteDep>,
    pub(crate) queue: Option<VersionQueue>,
}

impl Selection {
    pub(crate) fn local_name(&self) -> &str {
        &self.atom.atom.ident.local_name
    }

    pub(crate) fn is_project(&self) -> bool {
        self.queue.is_some()
    }
}

/// Work the solver still has to do for one project.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub(crate) ident: ProjectIdentifier,
    /// Required packages not covered by a selection yet.
    pub(crate) packages: Vec<String>,
    /// The project is selected already, only packages are missing.
    pub(crate) addition: bool,
}

#[derive(Debug)]
pub(crate) struct SearchState {
    pub(crate) root: ProjectIdentifier,
    pub(crate) root_deps: Vec<CompleteDep>,
    pub(crate) selections: Vec<Selection>,
}

impl SearchState {
    pub(crate) fn new(root: ProjectIdentifier, root_deps: Vec<CompleteDep>) -> Self {
        Self {
            root,
            root_deps,
            selections: Vec::new(),
        }
    }

    /// Number of project selections on the stack.
    pub(crate) fn depth(&self) -> usize {
        self.selections.iter().filter(|s| s.is_project()).count()
    }

    /// Every dependency edge currently in force, with its depender, root
    /// edges first.
    pub(crate) fn edges(&self) -> impl Iterator<Item = (&ProjectIdentifier, &CompleteDep)> {
        let root = self.root_deps.iter().map(move |cd| (&self.root, cd));
        let selected = self
            .selections
            .iter()
            .flat_map(|s| s.deps.iter().map(move |cd| (&s.atom.atom.ident, cd)));
        root.chain(selected)
    }

    pub(crate) fn dependencies_on<'s>(
        &'s self,
        local_name: &'s str,
    ) -> impl Iterator<Item = (&'s ProjectIdentifier, &'s CompleteDep)> + 's {
        self.edges()
            .filter(move |(_, cd)| cd.ident().local_name == local_name)
    }

    /// Distinct projects depending on `local_name`.
    pub(crate) fn dependers(&self, local_name: &str) -> Vec<ProjectIdentifier> {
        let mut out: Vec<ProjectIdentifier> = Vec::new();
        for (depender, _) in self.dependencies_on(local_name) {
            if !out.contains(depender) {
                out.push(depender.clone());
            }
        }
        out
    }

    /// Intersection of every constraint on `local_name`.
    pub(crate) fn constraint_on(&self, local_name: &str) -> Constraint {
        self.dependencies_on(local_name)
            .fold(Constraint::Any, |acc, (_, cd)| {
                acc.intersect(&cd.dep.constraint)
            })
    }

    /// Packages of `local_name` that some depender imports.
    pub(crate) fn required_packages(&self, local_name: &str) -> FxIndexSet<String> {
        self.dependencies_on(local_name)
            .flat_map(|(_, cd)| cd.packages.iter().cloned())
            .collect()
    }

    pub(crate) fn selected_version(&self, local_name: &str) -> Option<&Version> {
        self.selections
            .iter()
            .find(|s| s.is_project() && s.local_name() == local_name)
            .map(|s| &s.atom.atom.version)
    }

    pub(crate) fn selected_packages(&self, local_name: &str) -> FxIndexSet<&str> {
        self.selections
            .iter()
            .filter(|s| s.local_name() == local_name)
            .flat_map(|s| s.atom.packages.iter().map(String::as_str))
            .collect()
    }

    /// Projects with unselected versions or packages, in the order their
    /// first dependency edge appears.
    pub(crate) fn pending(&self) -> FxIndexMap<String, Pending> {
        let mut pending: FxIndexMap<String, Pending> = FxIndexMap::default();
        let mut seen: FxIndexSet<&str> = FxIndexSet::default();
        for (_, cd) in self.edges() {
            let local = cd.ident().local_name.as_str();
            if local == self.root.local_name || !seen.insert(local) {
                continue;
            }
            let required = self.required_packages(local);
            let work = if self.selected_version(local).is_some() {
                let have = self.selected_packages(local);
                let missing: Vec<String> = required
                    .into_iter()
                    .filter(|p| !have.contains(p.as_str()))
                    .collect();
                if missing.is_empty() {
                    continue;
                }
                Pending {
                    ident: cd.ident().clone(),
                    packages: missing,
                    addition: true,
                }
            } else {
                Pending {
                    ident: cd.ident().clone(),
                    packages: required.into_iter().collect(),
                    addition: false,
                }
            };
            pending.insert(local.to_string(), work);
        }
        pending
    }

    pub(crate) fn push(&mut self, selection: Selection) {
        self.selections.push(selection);
    }

    /// Index of the most recent project selection named in `culprits`.
    pub(crate) fn backjump_target(&self, culprits: &FxIndexSet<String>) -> Option<usize> {
        self.selections
            .iter()
            .rposition(|s| s.is_project() && culprits.contains(s.local_name()))
    }

    /// Pop the selection at `index` and everything above it.
    pub(crate) fn unwind_to(&mut self, index: usize) -> Selection {
        assert!(
            index < self.selections.len(),
            "unwinding to an index within the stack: {index} of {}",
            self.selections.len()
        );
        self.selections.truncate(index + 1);
        self.selections
            .pop()
            .expect("the stack is not empty after the bounds check")
    }
}
