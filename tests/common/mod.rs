// SPDX-License-Identifier: MPL-2.0

//! An in-memory source manager described with a small text notation.
//!
//! A project version is written `name version [revision]`. The version may
//! carry a prefix: `r` for a bare revision, `b` for a branch, `p` for a plain
//! tag. Without a prefix it is a semantic version. A trailing revision pairs
//! the version with it.
//!
//! A dependency is written `name constraint`, where the constraint follows
//! the same prefixes, and without one is a semver requirement. `name from
//! source ...` fetches the project from `source`. A `(dev) ` prefix makes it
//! a test dependency.
//!
//! Unless told otherwise, every project has a single package named after the
//! project, importing each of its dependencies.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bimodal::{
    Constraint, Lock, LockedProject, Manifest, Package, PackageTree, ProjectDep,
    ProjectIdentifier, Solution, SolveParameters, SourceManager, UnpairedVersion, Version,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FixtureError(pub String);

/// One project at one version.
#[derive(Debug, Clone)]
pub struct Spec {
    pub name: String,
    pub version: Version,
    pub manifest: Manifest,
    pub tree: PackageTree,
}

fn split_ident(info: &str) -> (ProjectIdentifier, &str) {
    let (name, rest) = info
        .split_once(' ')
        .unwrap_or_else(|| panic!("malformed fixture {info:?}"));
    match rest.strip_prefix("from ") {
        Some(rest) => {
            let (source, rest) = rest
                .split_once(' ')
                .unwrap_or_else(|| panic!("malformed fixture {info:?}"));
            (ProjectIdentifier::with_source(name, source), rest)
        }
        None => (ProjectIdentifier::new(name), rest),
    }
}

fn unpaired(version: &str) -> UnpairedVersion {
    match version.split_at(1) {
        ("b", name) => UnpairedVersion::branch(name),
        ("p", name) => UnpairedVersion::plain(name),
        _ => UnpairedVersion::semver(version)
            .unwrap_or_else(|err| panic!("bad fixture version {version:?}: {err}")),
    }
}

/// Parse `name version [revision]`.
pub fn atom(info: &str) -> (ProjectIdentifier, Version) {
    let (ident, rest) = split_ident(info);
    let mut parts = rest.split(' ');
    let version = parts.next().unwrap();
    let version = match (version.strip_prefix('r'), parts.next()) {
        (Some(rev), None) => Version::bare_revision(rev),
        (_, Some(rev)) => unpaired(version).pair(rev).into(),
        (None, None) => unpaired(version).into(),
    };
    (ident, version)
}

/// Parse `name constraint`.
pub fn dep(info: &str) -> ProjectDep {
    let (ident, rest) = split_ident(info);
    let constraint = match rest.as_bytes()[0] {
        b'r' => Constraint::revision(&rest[1..]),
        b'b' | b'p' => {
            let mut parts = rest.split(' ');
            let version = unpaired(parts.next().unwrap());
            match parts.next() {
                Some(rev) => Constraint::Paired(version.pair(rev)),
                None => Constraint::from(Version::from(version)),
            }
        }
        _ => Constraint::semver(rest)
            .unwrap_or_else(|err| panic!("bad fixture constraint {rest:?}: {err}")),
    };
    ProjectDep::new(ident, constraint)
}

impl Spec {
    /// A project with a single package importing every normal dependency.
    /// Test dependencies are only imported by the package's tests.
    pub fn new(info: &str, deps: &[&str]) -> Self {
        let (ident, version) = atom(info);
        assert!(!ident.is_redirected(), "a project cannot come from elsewhere");
        let mut manifest = Manifest::default();
        for d in deps {
            match d.strip_prefix("(dev) ") {
                Some(d) => manifest.test_dependencies.push(dep(d)),
                None => manifest.dependencies.push(dep(d)),
            }
        }
        let package = Package::new(ident.local_name.as_str())
            .imports(manifest.dependencies.iter().map(|d| d.ident.local_name.clone()))
            .test_imports(
                manifest
                    .test_dependencies
                    .iter()
                    .map(|d| d.ident.local_name.clone()),
            );
        Self {
            tree: PackageTree::new(ident.local_name.as_str()).with_package(package),
            name: ident.local_name,
            version,
            manifest,
        }
    }

    /// Replace the packages with explicit ones: `(path, imports)`.
    pub fn packages(mut self, packages: &[(&str, &[&str])]) -> Self {
        let mut tree = PackageTree::new(self.name.as_str());
        for (path, imports) in packages {
            tree = tree.with_package(Package::new(*path).imports(imports.iter().copied()));
        }
        self.tree = tree;
        self
    }

    /// Add a package that cannot be read.
    pub fn broken(mut self, path: &str, message: &str) -> Self {
        self.tree = self.tree.with_error(path, message);
        self
    }
}

/// A lock holding each atom as written.
pub fn lock(atoms: &[&str]) -> Lock {
    Lock::new(atoms.iter().map(|info| {
        let (ident, version) = atom(info);
        LockedProject::new(ident, version)
    }))
}

/// A lock holding only the revision of each atom.
pub fn rev_lock(atoms: &[&str]) -> Lock {
    Lock::new(atoms.iter().map(|info| {
        let (ident, version) = atom(info);
        let rev = version.revision().expect("revision lock needs a revision").clone();
        LockedProject::new(ident, rev)
    }))
}

/// The first spec is the root project.
pub struct FixtureSM {
    specs: Vec<Spec>,
    /// Every query made, as `method name [version]`.
    pub calls: RefCell<Vec<String>>,
    pub exports: RefCell<Vec<(String, Version, PathBuf)>>,
    /// Cancel once `should_cancel` was called this many times.
    pub cancel_after: Option<usize>,
    polls: Cell<usize>,
}

impl FixtureSM {
    pub fn new(specs: Vec<Spec>) -> Self {
        assert!(!specs.is_empty(), "the first spec is the root");
        Self {
            specs,
            calls: RefCell::new(Vec::new()),
            exports: RefCell::new(Vec::new()),
            cancel_after: None,
            polls: Cell::new(0),
        }
    }

    pub fn root(&self) -> &Spec {
        &self.specs[0]
    }

    /// Parameters for solving the root spec.
    pub fn params(&self) -> SolveParameters {
        let root = self.root();
        SolveParameters::new(
            ProjectIdentifier::new(root.name.as_str()),
            root.manifest.clone(),
            root.tree.clone(),
        )
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn find(&self, name: &str, version: &Version) -> Result<&Spec, FixtureError> {
        self.specs
            .iter()
            .find(|s| s.name == name && s.version.matches(version))
            .ok_or_else(|| FixtureError(format!("{name} at {version} could not be found")))
    }
}

impl SourceManager for FixtureSM {
    type Err = FixtureError;

    fn list_versions(&self, name: &str) -> Result<Vec<Version>, FixtureError> {
        self.record(format!("list_versions {name}"));
        let versions: Vec<Version> = self
            .specs
            .iter()
            .filter(|s| s.name == name && !s.version.is_revision())
            .map(|s| s.version.clone())
            .collect();
        if versions.is_empty() {
            return Err(FixtureError(format!("{name} could not be found")));
        }
        Ok(versions)
    }

    fn get_project_info(&self, name: &str, version: &Version) -> Result<(Manifest, Lock), FixtureError> {
        self.record(format!("get_project_info {name} {version}"));
        let spec = self.find(name, version)?;
        Ok((spec.manifest.clone(), Lock::default()))
    }

    fn list_packages(&self, name: &str, version: &Version) -> Result<PackageTree, FixtureError> {
        self.record(format!("list_packages {name} {version}"));
        Ok(self.find(name, version)?.tree.clone())
    }

    fn repo_exists(&self, name: &str) -> Result<bool, FixtureError> {
        self.record(format!("repo_exists {name}"));
        Ok(self.specs.iter().any(|s| s.name == name))
    }

    fn vendor_code_exists(&self, _: &str) -> Result<bool, FixtureError> {
        Ok(false)
    }

    fn export_project(&self, name: &str, version: &Version, to: &Path) -> Result<(), FixtureError> {
        self.exports
            .borrow_mut()
            .push((name.to_string(), version.clone(), to.to_path_buf()));
        Ok(())
    }

    fn deduce_project_root(&self, import_path: &str) -> Result<String, FixtureError> {
        self.record(format!("deduce_project_root {import_path}"));
        self.specs
            .iter()
            .map(|s| s.name.as_str())
            .find(|n| {
                import_path == *n
                    || import_path
                        .strip_prefix(*n)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(str::to_string)
            .ok_or_else(|| FixtureError(format!("no known project provides {import_path}")))
    }

    fn should_cancel(&self) -> Result<(), FixtureError> {
        self.polls.set(self.polls.get() + 1);
        match self.cancel_after {
            Some(after) if self.polls.get() > after => Err(FixtureError("cancelled".to_string())),
            _ => Ok(()),
        }
    }
}

/// Selected versions by local name.
pub fn versions(solution: &Solution) -> BTreeMap<String, Version> {
    solution
        .projects()
        .iter()
        .map(|p| (p.atom.ident.local_name.clone(), p.atom.version.clone()))
        .collect()
}

/// Expected versions, written as atoms.
pub fn results(atoms: &[&str]) -> BTreeMap<String, Version> {
    atoms
        .iter()
        .map(|info| {
            let (ident, version) = atom(info);
            (ident.local_name, version)
        })
        .collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
