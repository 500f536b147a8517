// SPDX-License-Identifier: MPL-2.0

//! Projects, their declared dependencies and previously solved locks.

use std::fmt::{self, Display};

use crate::constraint::Constraint;
use crate::version::Version;

/// Names a project.
///
/// The local name is the import path code uses to refer to the project. The
/// network name is where its source actually lives. They differ when a
/// dependency is redirected to a fork or mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectIdentifier {
    /// Import path root used in source.
    pub local_name: String,
    /// Location the source manager fetches from.
    pub network_name: String,
}

impl ProjectIdentifier {
    /// A project fetched from the location it is imported as.
    pub fn new(name: impl Into<String>) -> Self {
        let local_name = name.into();
        Self {
            network_name: local_name.clone(),
            local_name,
        }
    }

    /// A project imported as `local_name` but fetched from `network_name`.
    pub fn with_source(local_name: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            network_name: network_name.into(),
        }
    }

    /// Two identifiers denote the same project when they fetch from the same
    /// place, whatever they are called locally.
    pub fn same_project(&self, other: &ProjectIdentifier) -> bool {
        self.network_name == other.network_name
    }

    /// Whether the project is fetched from somewhere other than its import
    /// path.
    pub fn is_redirected(&self) -> bool {
        self.local_name != self.network_name
    }
}

impl Display for ProjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_redirected() {
            write!(f, "{} (from {})", self.local_name, self.network_name)
        } else {
            f.write_str(&self.local_name)
        }
    }
}

/// One declared dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectDep {
    /// The project depended upon.
    pub ident: ProjectIdentifier,
    /// Versions of it that are acceptable.
    pub constraint: Constraint,
}

impl ProjectDep {
    pub fn new(ident: ProjectIdentifier, constraint: Constraint) -> Self {
        Self { ident, constraint }
    }
}

/// The dependency declarations of one project at one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Manifest {
    pub dependencies: Vec<ProjectDep>,
    /// Only honoured when the project is the root of a solve.
    pub test_dependencies: Vec<ProjectDep>,
}

impl Manifest {
    pub fn new(dependencies: impl IntoIterator<Item = ProjectDep>) -> Self {
        Self {
            dependencies: dependencies.into_iter().collect(),
            test_dependencies: Vec::new(),
        }
    }

    pub fn with_test_dependencies(mut self, deps: impl IntoIterator<Item = ProjectDep>) -> Self {
        self.test_dependencies.extend(deps);
        self
    }
}

/// A project pinned by a previous solve.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockedProject {
    pub ident: ProjectIdentifier,
    /// A version, possibly paired, or a bare revision.
    pub version: Version,
    /// Packages of the project that were in use.
    pub packages: Vec<String>,
}

impl LockedProject {
    pub fn new(ident: ProjectIdentifier, version: impl Into<Version>) -> Self {
        Self {
            ident,
            version: version.into(),
            packages: Vec::new(),
        }
    }
}

/// The outcome of a previous solve, used to bias version selection.
///
/// A lock never constrains a solve: an entry that no longer satisfies the
/// current constraints is simply tried first and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lock {
    pub projects: Vec<LockedProject>,
}

impl Lock {
    pub fn new(projects: impl IntoIterator<Item = LockedProject>) -> Self {
        Self {
            projects: projects.into_iter().collect(),
        }
    }

    /// The entry for `ident`. Entries are matched on both names, so a lock
    /// taken against a fork does not apply to the upstream project.
    pub fn get(&self, ident: &ProjectIdentifier) -> Option<&LockedProject> {
        self.projects.iter().find(|lp| &lp.ident == ident)
    }
}

/// A project at a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Atom {
    pub ident: ProjectIdentifier,
    pub version: Version,
}

impl Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.ident, self.version)
    }
}

/// A selected [Atom] together with the packages of it that are needed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomWithPackages {
    pub atom: Atom,
    pub packages: Vec<String>,
}

/// A dependency edge annotated with the packages of the target that the
/// depender actually imports.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompleteDep {
    pub dep: ProjectDep,
    pub packages: Vec<String>,
}

impl CompleteDep {
    pub fn ident(&self) -> &ProjectIdentifier {
        &self.dep.ident
    }
}
