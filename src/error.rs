// SPDX-License-Identifier: MPL-2.0

//! Handling bimodal solver errors.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::constraint::Constraint;
use crate::project::ProjectIdentifier;
use crate::provider::SourceManager;
use crate::version::Version;

/// There is no solution for this set of dependencies, or the solve was
/// aborted.
#[derive(Error)]
pub enum SolveError<SM: SourceManager> {
    /// Every candidate of some project was rejected and no earlier decision
    /// could be revised to make room for one.
    #[error("{0}")]
    NoSolution(NoSolution),

    /// Two dependers disagree on where a project comes from.
    #[error("{0}")]
    IdentityMismatch(IdentityMismatch),

    /// A package of the root project could not be read.
    #[error("root package {package} has errors: {message}")]
    RootPackage {
        /// Import path of the package.
        package: String,
        /// What went wrong with it.
        message: String,
    },

    /// An external import of the root project could not be mapped to a
    /// project.
    #[error("cannot determine the project owning {path}, imported by the root project: {message}")]
    RootImport {
        /// The import path.
        path: String,
        /// Why deduction failed.
        message: String,
    },

    /// The solve parameters do not describe a usable root project.
    #[error("invalid root project: {0}")]
    InvalidRoot(String),

    /// The solve needed more attempts than allowed.
    #[error("gave up after {attempts} attempts")]
    AttemptsExceeded {
        /// Attempts made, including the one that passed the bound.
        attempts: usize,
        /// Projects involved in the last backjump.
        chain: Vec<ProjectIdentifier>,
    },

    /// [SourceManager::should_cancel] returned an error.
    #[error("solving was cancelled")]
    Cancelled(#[source] SM::Err),
}

impl<SM: SourceManager> From<NoSolution> for SolveError<SM> {
    fn from(err: NoSolution) -> Self {
        Self::NoSolution(err)
    }
}

impl<SM: SourceManager> From<IdentityMismatch> for SolveError<SM> {
    fn from(err: IdentityMismatch) -> Self {
        Self::IdentityMismatch(err)
    }
}

impl<SM: SourceManager> SolveError<SM> {
    /// Whether the solve stopped early rather than proving there is no
    /// solution.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::AttemptsExceeded { .. } | Self::Cancelled(_))
    }
}

impl<SM> std::fmt::Debug for SolveError<SM>
where
    SM: SourceManager,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSolution(err) => f.debug_tuple("NoSolution").field(&err).finish(),
            Self::IdentityMismatch(err) => f.debug_tuple("IdentityMismatch").field(&err).finish(),
            Self::RootPackage { package, message } => f
                .debug_struct("RootPackage")
                .field("package", package)
                .field("message", message)
                .finish(),
            Self::RootImport { path, message } => f
                .debug_struct("RootImport")
                .field("path", path)
                .field("message", message)
                .finish(),
            Self::InvalidRoot(arg0) => f.debug_tuple("InvalidRoot").field(arg0).finish(),
            Self::AttemptsExceeded { attempts, chain } => f
                .debug_struct("AttemptsExceeded")
                .field("attempts", attempts)
                .field("chain", chain)
                .finish(),
            Self::Cancelled(arg0) => f.debug_tuple("Cancelled").field(arg0).finish(),
        }
    }
}

/// The search space was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoSolution {
    /// The project whose candidates ran out first, followed by every project
    /// the solver backjumped to while trying to make room for it.
    pub chain: Vec<ProjectIdentifier>,
    /// The root project, when its own requirements were implicated.
    pub root: Option<ProjectIdentifier>,
    /// Why each candidate of the first project in the chain was rejected.
    pub failures: Vec<CandidateFailure>,
}

impl NoSolution {
    /// Local names of the projects in the chain.
    pub fn chain_names(&self) -> Vec<&str> {
        self.chain.iter().map(|id| id.local_name.as_str()).collect()
    }
}

impl Display for NoSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain.first() {
            Some(first) => write!(f, "no versions of {first} met constraints:")?,
            None => write!(f, "no solution:")?,
        }
        for failure in &self.failures {
            write!(f, "\n\t{failure}")?;
        }
        if self.chain.len() > 1 {
            write!(f, "\nimplicated projects: {}", join(&self.chain))?;
        }
        if let Some(root) = &self.root {
            write!(f, "\nrequired by the root project {root}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NoSolution {}

/// Dependers disagree on the network name of a project.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{depender} wants {local_name} from {wanted}, but {} already get it from {existing}",
    join(.existing_dependers)
)]
pub struct IdentityMismatch {
    /// Local name both sides use.
    pub local_name: String,
    /// Network name the new edge declares.
    pub wanted: String,
    /// Project declaring the new edge.
    pub depender: ProjectIdentifier,
    /// Network name already in use.
    pub existing: String,
    /// Projects whose edges use the existing network name.
    pub existing_dependers: Vec<ProjectIdentifier>,
}

/// A version that was tried and rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// `None` when the project itself could not be queried.
    pub version: Option<Version>,
    pub rejection: Rejection,
}

impl Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{v}: {}", self.rejection),
            None => write!(f, "{}", self.rejection),
        }
    }
}

/// Why a candidate version was not selected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("{depender} requires {constraint}")]
    ConstraintNotMet {
        depender: ProjectIdentifier,
        constraint: Constraint,
    },
    /// The source manager could not provide the manifest or package tree.
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("package {package} does not exist, but {} import it", join(.dependers))]
    MissingPackage {
        package: String,
        dependers: Vec<ProjectIdentifier>,
    },
    #[error("package {package}, imported by {}, has errors: {message}", join(.dependers))]
    PackageError {
        package: String,
        message: String,
        dependers: Vec<ProjectIdentifier>,
    },
    #[error("cannot determine the project owning {path}: {message}")]
    UnknownImport { path: String, message: String },
    #[error("its constraint {constraint} on {dep} is disjoint with those of {}", join(.dependers))]
    DisjointConstraint {
        dep: ProjectIdentifier,
        constraint: Constraint,
        dependers: Vec<ProjectIdentifier>,
    },
    #[error("it requires {dep} at {constraint}, but {selected} is selected")]
    SelectedVersionDisallowed {
        dep: ProjectIdentifier,
        constraint: Constraint,
        selected: Version,
    },
    #[error("it requires package {package}, which {dep} at {selected} does not provide")]
    SelectedPackageMissing {
        dep: ProjectIdentifier,
        package: String,
        selected: Version,
    },
    #[error("no version of {dep} satisfies {constraint}")]
    NoMatchingVersion {
        dep: ProjectIdentifier,
        constraint: Constraint,
        dependers: Vec<ProjectIdentifier>,
    },
    #[error("the project could not be located")]
    Unlocatable,
}

impl Rejection {
    /// Projects whose decisions contributed to the rejection. Revising any of
    /// them may make the candidate acceptable.
    pub fn culprits(&self) -> &[ProjectIdentifier] {
        match self {
            Self::ConstraintNotMet { depender, .. } => std::slice::from_ref(depender),
            Self::MissingPackage { dependers, .. }
            | Self::PackageError { dependers, .. }
            | Self::DisjointConstraint { dependers, .. }
            | Self::NoMatchingVersion { dependers, .. } => dependers,
            Self::SelectedVersionDisallowed { dep, .. }
            | Self::SelectedPackageMissing { dep, .. } => std::slice::from_ref(dep),
            Self::Unavailable(_) | Self::UnknownImport { .. } | Self::Unlocatable => &[],
        }
    }
}

/// A package could not be read while reach was computed with errors
/// honoured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("package {package}: {message}")]
pub struct ReachError {
    pub package: String,
    pub message: String,
}

/// A version requirement could not be parsed.
#[derive(Error, Debug)]
pub enum ConstraintError {
    #[error("invalid version requirement {input:?}")]
    Requirement {
        input: String,
        #[source]
        source: semver::Error,
    },
    #[error("unsupported operator in version requirement {0:?}")]
    UnsupportedOperator(String),
}

fn join(idents: &[ProjectIdentifier]) -> String {
    idents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
