// SPDX-License-Identifier: MPL-2.0

//! Bimodal version solving for package-based ecosystems.
//!
//! Projects are versioned as a whole, but code imports individual packages
//! of them. Solving is therefore bimodal: the solver picks one version of
//! every project reachable from the root, and within each project only the
//! packages that are actually imported. Packages a depender does not import
//! contribute no dependencies, so unused corners of a project never narrow
//! the search.
//!
//! Versions come in three flavours: semantic versions, branches and plain
//! tags, each optionally paired with the revision it points at, plus bare
//! revisions. Dependers restrict them with [Constraint]s. A previous
//! [Lock] biases the search towards the versions it records without ever
//! constraining it.
//!
//! # Basic example
//!
//! A [SourceManager] answers every question the solver has about the outside
//! world: which versions a project has, what a version declares, which
//! packages it contains. Here the root project imports nothing.
//!
//! ```
//! # use std::convert::Infallible;
//! # use std::path::Path;
//! use bimodal::{
//!     solve, Lock, Manifest, Package, PackageTree, ProjectIdentifier, SolveParameters,
//!     SourceManager, Version,
//! };
//!
//! struct Offline;
//!
//! impl SourceManager for Offline {
//!     type Err = Infallible;
//! #   fn list_versions(&self, _: &str) -> Result<Vec<Version>, Infallible> {
//! #       Ok(Vec::new())
//! #   }
//! #   fn get_project_info(&self, _: &str, _: &Version) -> Result<(Manifest, Lock), Infallible> {
//! #       Ok(Default::default())
//! #   }
//! #   fn list_packages(&self, name: &str, _: &Version) -> Result<PackageTree, Infallible> {
//! #       Ok(PackageTree::new(name))
//! #   }
//! #   fn repo_exists(&self, _: &str) -> Result<bool, Infallible> {
//! #       Ok(false)
//! #   }
//! #   fn vendor_code_exists(&self, _: &str) -> Result<bool, Infallible> {
//! #       Ok(false)
//! #   }
//! #   fn export_project(&self, _: &str, _: &Version, _: &Path) -> Result<(), Infallible> {
//! #       Ok(())
//! #   }
//! #   fn deduce_project_root(&self, path: &str) -> Result<String, Infallible> {
//! #       Ok(path.to_string())
//! #   }
//!     // ...
//! }
//!
//! let root = ProjectIdentifier::new("example.org/app");
//! let tree = PackageTree::new("example.org/app").with_package(Package::new("example.org/app"));
//! let params = SolveParameters::new(root, Manifest::default(), tree);
//! let solution = solve(&Offline, &params).unwrap();
//! assert!(solution.projects().is_empty());
//! assert_eq!(solution.attempts(), 1);
//! ```
//!
//! # Dependencies and packages
//!
//! The root's [PackageTree] determines which external import paths the root
//! reaches. Each path is attributed to the declared dependency whose local
//! name is its longest prefix, or failing that to the project root the
//! source manager deduces for it. Every selected project is then analysed
//! the same way, at the selected version, starting from the packages its
//! dependers import.
//!
//! # Solution and errors
//!
//! A [Solution] lists the selected projects with their packages. It can be
//! turned back into a [Lock] with [Solution::to_lock], and exported through
//! the source manager with [Solution::export].
//!
//! When no combination works, [solve] returns [SolveError::NoSolution]
//! naming the project whose candidates ran out, the projects the solver
//! backjumped to, whether the root's own requirements took part, and why
//! each candidate was rejected. Two dependers
//! disagreeing on where a project comes from abort the solve with
//! [SolveError::IdentityMismatch].
//!
//! # Tracing
//!
//! [solve_traced] reports every step to a [Tracer]. [TextTracer] renders
//! the steps as an indented log; a `Vec<TraceEvent>` records them.

mod bridge;
mod constraint;
mod error;
mod package_tree;
mod project;
mod provider;
mod report;
mod solver;
mod type_aliases;
mod version;
mod version_set;

pub use constraint::Constraint;
pub use error::{
    CandidateFailure, ConstraintError, IdentityMismatch, NoSolution, ReachError, Rejection,
    SolveError,
};
pub use package_tree::{Package, PackageError, PackageTree, ReachOptions};
pub use project::{
    Atom, AtomWithPackages, CompleteDep, Lock, LockedProject, Manifest, ProjectDep,
    ProjectIdentifier,
};
pub use provider::SourceManager;
pub use report::{TextTracer, TraceEvent, Tracer};
pub use solver::{solve, solve_traced, Solution, SolveParameters};
pub use type_aliases::{ExternalReach, Map, Set};
pub use version::{PairedVersion, Revision, UnpairedVersion, Version};
pub use version_set::{parse_requirement, requirement_ranges, SemverRanges};
pub use version_ranges::Ranges;

mod internal;
