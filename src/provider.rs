// SPDX-License-Identifier: MPL-2.0

use std::error::Error;
use std::path::Path;

use crate::package_tree::PackageTree;
use crate::project::{Lock, Manifest};
use crate::version::Version;

/// Trait that allows the solver to interrogate repositories.
/// An implementor needs to be supplied to the [solve](crate::solve) function.
///
/// Every method receives the network name of a project. Answers must not
/// change for the duration of a solve; the solver memoizes them and relies
/// on getting the same answer when it revisits a project after backjumping.
pub trait SourceManager {
    /// The kind of error returned from these methods.
    ///
    /// Errors from the query methods mean "not found" to the solver: the
    /// project or version is simply not offered. Only an error from
    /// [should_cancel](SourceManager::should_cancel) ends the solve.
    type Err: Error + 'static;

    /// Every version of the project, bare revisions excluded.
    fn list_versions(&self, name: &str) -> Result<Vec<Version>, Self::Err>;

    /// The manifest and lock of the project at `version`. The version may be
    /// a bare revision.
    fn get_project_info(&self, name: &str, version: &Version)
        -> Result<(Manifest, Lock), Self::Err>;

    /// The packages of the project at `version`.
    fn list_packages(&self, name: &str, version: &Version) -> Result<PackageTree, Self::Err>;

    /// Whether the upstream repository exists.
    fn repo_exists(&self, name: &str) -> Result<bool, Self::Err>;

    /// Whether a vendored copy of the project exists.
    fn vendor_code_exists(&self, name: &str) -> Result<bool, Self::Err>;

    /// Write the source of the project at `version` into `to`.
    fn export_project(&self, name: &str, version: &Version, to: &Path) -> Result<(), Self::Err>;

    /// The root of the project that provides `import_path`.
    fn deduce_project_root(&self, import_path: &str) -> Result<String, Self::Err>;

    /// This is called at every step of the solve, before each candidate
    /// version is checked and before each backjump,
    /// if it returns an Err then solving will be terminated.
    /// This is helpful if you want to add some form of early termination like a timeout,
    /// or you want to add some form of user feedback if things are taking a while.
    /// If not provided the solver will run as long as needed.
    fn should_cancel(&self) -> Result<(), Self::Err> {
        Ok(())
    }
}
