// SPDX-License-Identifier: MPL-2.0

//! Package trees and the reach computer.
//!
//! A project is made of packages that import each other and packages of other
//! projects. Only the packages a depender actually imports are required from
//! a project, and only the external imports reachable from those packages
//! turn into further dependencies. [PackageTree::external_reach] computes,
//! for every internal package, the external import paths it transitively
//! reaches.

use std::collections::BTreeMap;

use crate::error::ReachError;
use crate::type_aliases::{ExternalReach, Set};

/// One package of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Package {
    pub import_path: String,
    pub name: String,
    pub imports: Vec<String>,
    /// Imports used only by the package's tests.
    pub test_imports: Vec<String>,
}

impl Package {
    /// A package named after the last segment of its import path.
    pub fn new(import_path: impl Into<String>) -> Self {
        let import_path = import_path.into();
        let name = import_path
            .rsplit('/')
            .next()
            .unwrap_or(&import_path)
            .to_string();
        Self {
            import_path,
            name,
            imports: Vec::new(),
            test_imports: Vec::new(),
        }
    }

    pub fn imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(imports.into_iter().map(Into::into));
        self
    }

    pub fn test_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_imports.extend(imports.into_iter().map(Into::into));
        self
    }
}

/// Why a package could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageError {
    pub message: String,
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PackageError {}

/// All packages of one project at one version, keyed by import path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageTree {
    pub import_root: String,
    pub packages: BTreeMap<String, Result<Package, PackageError>>,
}

/// How [PackageTree::external_reach] treats test imports and broken packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachOptions {
    /// Also follow test imports.
    pub include_tests: bool,
    /// Fail on the first broken package instead of leaving it, and every
    /// package importing it, out of the result.
    pub honor_errors: bool,
}

impl ReachOptions {
    /// The root project: its tests count and it cannot be substituted, so its
    /// errors are fatal.
    pub fn root() -> Self {
        Self {
            include_tests: true,
            honor_errors: true,
        }
    }

    /// Any other project.
    pub fn dependency() -> Self {
        Self {
            include_tests: false,
            honor_errors: false,
        }
    }
}

enum Node<'a> {
    Broken,
    Ok {
        internal: Vec<&'a str>,
        external: Vec<&'a str>,
    },
}

impl PackageTree {
    pub fn new(import_root: impl Into<String>) -> Self {
        Self {
            import_root: import_root.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Add a package. Its import path should lie under the import root.
    pub fn with_package(mut self, package: Package) -> Self {
        self.packages
            .insert(package.import_path.clone(), Ok(package));
        self
    }

    /// Add a package that could not be read.
    pub fn with_error(mut self, import_path: impl Into<String>, message: impl Into<String>) -> Self {
        self.packages.insert(
            import_path.into(),
            Err(PackageError {
                message: message.into(),
            }),
        );
        self
    }

    /// Whether `path` is the import root or below it.
    pub fn is_internal(&self, path: &str) -> bool {
        path == self.import_root
            || path
                .strip_prefix(self.import_root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// For each internal package, the sorted external import paths it
    /// reaches through any chain of internal imports.
    ///
    /// Ignored paths are neither reported nor traversed. Without
    /// [ReachOptions::honor_errors], a broken package and every package that
    /// reaches it are left out of the result.
    pub fn external_reach(
        &self,
        options: ReachOptions,
        ignore: &Set<String>,
    ) -> Result<ExternalReach, ReachError> {
        let mut graph: BTreeMap<&str, Node<'_>> = BTreeMap::new();
        for (path, entry) in &self.packages {
            if ignore.contains(path) {
                continue;
            }
            let node = match entry {
                Err(err) if options.honor_errors => {
                    return Err(ReachError {
                        package: path.clone(),
                        message: err.message.clone(),
                    })
                }
                Err(_) => Node::Broken,
                Ok(pkg) => {
                    let tests = options
                        .include_tests
                        .then_some(&pkg.test_imports)
                        .into_iter()
                        .flatten();
                    let (internal, external) = pkg
                        .imports
                        .iter()
                        .chain(tests)
                        .filter(|imp| !ignore.contains(*imp))
                        .map(String::as_str)
                        .partition(|imp| self.is_internal(imp));
                    Node::Ok { internal, external }
                }
            };
            graph.insert(path.as_str(), node);
        }

        let mut reach = ExternalReach::new();
        'packages: for &start in graph.keys() {
            let mut visited: Set<&str> = Set::default();
            let mut stack = vec![start];
            let mut external: Vec<String> = Vec::new();
            while let Some(path) = stack.pop() {
                if !visited.insert(path) {
                    continue;
                }
                match graph.get(path) {
                    Some(Node::Ok {
                        internal,
                        external: ext,
                    }) => {
                        external.extend(ext.iter().map(|s| s.to_string()));
                        stack.extend(internal.iter().copied());
                    }
                    Some(Node::Broken) => continue 'packages,
                    None if options.honor_errors => {
                        return Err(ReachError {
                            package: path.to_string(),
                            message: format!("imported by {start}, but not found"),
                        })
                    }
                    None => continue 'packages,
                }
            }
            external.sort();
            external.dedup();
            reach.insert(start.to_string(), external);
        }
        Ok(reach)
    }

    /// Every external import path reached by any internal package, sorted.
    pub fn list_external_imports(
        &self,
        options: ReachOptions,
        ignore: &Set<String>,
    ) -> Result<Vec<String>, ReachError> {
        let reach = self.external_reach(options, ignore)?;
        let mut all: Vec<String> = reach.into_values().flatten().collect();
        all.sort();
        all.dedup();
        Ok(all)
    }
}

// TESTS #######################################################################
