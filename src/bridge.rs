// SPDX-License-Identifier: MPL-2.0

//! Memoizing facade between the solver and the [SourceManager].
//!
//! Every answer is cached for the lifetime of one solve, failures included,
//! so a project revisited after a backjump sees exactly what it saw before.
//! Errors are kept as their rendered message: to the solver they only mean
//! "not available".

use std::rc::Rc;

use log::debug;

use crate::constraint::Constraint;
use crate::error::SolveError;
use crate::package_tree::{PackageTree, ReachOptions};
use crate::project::{CompleteDep, Manifest, ProjectDep, ProjectIdentifier};
use crate::provider::SourceManager;
use crate::type_aliases::{ExternalReach, FxIndexMap, Map, Set};
use crate::version::{sort_for_queue, Revision, Version};

type Cached<T> = Result<Rc<T>, Rc<str>>;

fn message(err: impl ToString) -> Rc<str> {
    Rc::from(err.to_string())
}

/// Whether `path` is `root` or a package below it.
fn within(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub(crate) struct SourceBridge<'a, SM: SourceManager> {
    sm: &'a SM,
    downgrade: bool,
    ignore: &'a Set<String>,
    exists: Map<String, bool>,
    versions: Map<String, Cached<[Version]>>,
    manifests: Map<(String, Version), Cached<Manifest>>,
    trees: Map<(String, Version), Cached<PackageTree>>,
    reaches: Map<(String, Version), Rc<ExternalReach>>,
    roots: Map<String, Cached<str>>,
}

impl<'a, SM: SourceManager> SourceBridge<'a, SM> {
    pub(crate) fn new(sm: &'a SM, downgrade: bool, ignore: &'a Set<String>) -> Self {
        Self {
            sm,
            downgrade,
            ignore,
            exists: Map::default(),
            versions: Map::default(),
            manifests: Map::default(),
            trees: Map::default(),
            reaches: Map::default(),
            roots: Map::default(),
        }
    }

    pub(crate) fn source_manager(&self) -> &'a SM {
        self.sm
    }

    /// Whether the project can be found upstream or in vendored code.
    pub(crate) fn exists(&mut self, id: &ProjectIdentifier) -> bool {
        let sm = self.sm;
        *self
            .exists
            .entry(id.network_name.clone())
            .or_insert_with(|| {
                let name = &id.network_name;
                let upstream = sm.repo_exists(name).unwrap_or_else(|err| {
                    debug!("checking repository of {name} failed: {err}");
                    false
                });
                upstream
                    || sm.vendor_code_exists(name).unwrap_or_else(|err| {
                        debug!("checking vendored code of {name} failed: {err}");
                        false
                    })
            })
    }

    /// Listed versions, bare revisions removed, in queue order.
    pub(crate) fn versions(&mut self, id: &ProjectIdentifier) -> Cached<[Version]> {
        let (sm, downgrade) = (self.sm, self.downgrade);
        self.versions
            .entry(id.network_name.clone())
            .or_insert_with(|| {
                debug!("listing versions of {}", id.network_name);
                let mut listed = sm.list_versions(&id.network_name).map_err(message)?;
                listed.retain(|v| !v.is_revision());
                sort_for_queue(&mut listed, downgrade);
                Ok(listed.into())
            })
            .clone()
    }

    pub(crate) fn manifest(&mut self, id: &ProjectIdentifier, version: &Version) -> Cached<Manifest> {
        let sm = self.sm;
        self.manifests
            .entry((id.network_name.clone(), version.clone()))
            .or_insert_with(|| {
                debug!("reading manifest of {} at {version}", id.network_name);
                let (manifest, _lock) = sm
                    .get_project_info(&id.network_name, version)
                    .map_err(message)?;
                Ok(Rc::new(manifest))
            })
            .clone()
    }

    pub(crate) fn package_tree(
        &mut self,
        id: &ProjectIdentifier,
        version: &Version,
    ) -> Cached<PackageTree> {
        let sm = self.sm;
        self.trees
            .entry((id.network_name.clone(), version.clone()))
            .or_insert_with(|| {
                debug!("listing packages of {} at {version}", id.network_name);
                let tree = sm
                    .list_packages(&id.network_name, version)
                    .map_err(message)?;
                Ok(Rc::new(tree))
            })
            .clone()
    }

    /// Reach of a dependency's packages. Broken packages are left out rather
    /// than failing the whole project.
    pub(crate) fn reach(
        &mut self,
        id: &ProjectIdentifier,
        version: &Version,
    ) -> Cached<ExternalReach> {
        let key = (id.network_name.clone(), version.clone());
        if let Some(reach) = self.reaches.get(&key) {
            return Ok(reach.clone());
        }
        let tree = self.package_tree(id, version)?;
        let reach = Rc::new(
            tree.external_reach(ReachOptions::dependency(), self.ignore)
                .map_err(message)?,
        );
        self.reaches.insert(key, reach.clone());
        Ok(reach)
    }

    /// The root of the project providing `import_path`.
    pub(crate) fn deduce(&mut self, import_path: &str) -> Cached<str> {
        let sm = self.sm;
        self.roots
            .entry(import_path.to_string())
            .or_insert_with(|| {
                debug!("deducing project root of {import_path}");
                sm.deduce_project_root(import_path)
                    .map(Rc::from)
                    .map_err(message)
            })
            .clone()
    }

    pub(crate) fn revision_exists(&mut self, id: &ProjectIdentifier, rev: &Revision) -> bool {
        self.manifest(id, &Version::Revision(rev.clone())).is_ok()
    }

    /// How many candidates a queue for `id` would offer under `constraint`.
    pub(crate) fn viable_count(&mut self, id: &ProjectIdentifier, constraint: &Constraint) -> usize {
        let listed = self.versions(id).ok();
        let listed = listed.as_deref().unwrap_or_default();
        let matching = listed.iter().filter(|v| constraint.matches(v)).count();
        match constraint.as_revision() {
            Some(rev) if !listed.iter().any(|v| v.revision() == Some(rev)) => matching + 1,
            _ => matching,
        }
    }

    /// Whether any version of `id` could satisfy `constraint`.
    pub(crate) fn any_version_matches(
        &mut self,
        id: &ProjectIdentifier,
        constraint: &Constraint,
    ) -> bool {
        let listed = self.versions(id).ok();
        let listed = listed.as_deref().unwrap_or_default();
        if listed.iter().any(|v| constraint.matches(v)) {
            return true;
        }
        match constraint.as_revision() {
            Some(rev) => self.revision_exists(id, rev),
            None => false,
        }
    }

    /// Map external import paths onto the projects providing them.
    ///
    /// An import belongs to the declared dependency whose local name is its
    /// longest prefix. Imports no dependency claims are deduced and depended
    /// upon without constraint. Declared dependencies come first, in
    /// declaration order, then deduced ones in import order. Dependencies
    /// nothing imports are dropped.
    pub(crate) fn intersect_constraints_with_imports(
        &mut self,
        deps: &[ProjectDep],
        imports: &[String],
    ) -> Result<Vec<CompleteDep>, (String, Rc<str>)> {
        let mut declared: Vec<Vec<String>> = vec![Vec::new(); deps.len()];
        let mut deduced: FxIndexMap<Rc<str>, Vec<String>> = FxIndexMap::default();
        for path in imports {
            let owner = deps
                .iter()
                .enumerate()
                .filter(|(_, dep)| within(path, &dep.ident.local_name))
                .max_by_key(|(_, dep)| dep.ident.local_name.len());
            match owner {
                Some((idx, _)) => declared[idx].push(path.clone()),
                None => {
                    let root = self.deduce(path).map_err(|msg| (path.clone(), msg))?;
                    deduced.entry(root).or_default().push(path.clone());
                }
            }
        }

        let declared = deps
            .iter()
            .zip(declared)
            .filter(|(_, packages)| !packages.is_empty())
            .map(|(dep, packages)| CompleteDep {
                dep: dep.clone(),
                packages,
            });
        let deduced = deduced.into_iter().map(|(root, packages)| CompleteDep {
            dep: ProjectDep::new(ProjectIdentifier::new(root.as_ref()), Constraint::Any),
            packages,
        });
        Ok(declared.chain(deduced).collect())
    }

    /// Dependencies of the root project, with its test dependencies, and the
    /// number of its internal packages.
    pub(crate) fn root_deps(
        &mut self,
        manifest: &Manifest,
        tree: &PackageTree,
    ) -> Result<(Vec<CompleteDep>, usize), SolveError<SM>> {
        let imports = tree
            .list_external_imports(ReachOptions::root(), self.ignore)
            .map_err(|err| SolveError::RootPackage {
                package: err.package,
                message: err.message,
            })?;
        // The root honours errors, so every package not ignored was reached.
        let internal = tree
            .packages
            .keys()
            .filter(|path| !self.ignore.contains(*path))
            .count();

        let mut deps: Vec<ProjectDep> = manifest.dependencies.clone();
        for dep in &manifest.test_dependencies {
            if !deps.iter().any(|d| d.ident.local_name == dep.ident.local_name) {
                deps.push(dep.clone());
            }
        }
        let cdeps = self
            .intersect_constraints_with_imports(&deps, &imports)
            .map_err(|(path, message)| SolveError::RootImport {
                path,
                message: message.to_string(),
            })?;
        Ok((cdeps, internal))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::path::Path;

    use super::*;
    use crate::package_tree::Package;
    use crate::project::Lock;

    #[derive(Default)]
    struct Counting {
        listed: Cell<usize>,
        deduced: Cell<usize>,
    }

    impl SourceManager for Counting {
        type Err = Infallible;

        fn list_versions(&self, _: &str) -> Result<Vec<Version>, Infallible> {
            self.listed.set(self.listed.get() + 1);
            Ok(vec![
                Version::semver("1.0.0").unwrap(),
                Version::bare_revision("abc"),
                Version::semver("2.0.0").unwrap(),
            ])
        }

        fn get_project_info(&self, _: &str, _: &Version) -> Result<(Manifest, Lock), Infallible> {
            Ok(Default::default())
        }

        fn list_packages(&self, name: &str, _: &Version) -> Result<PackageTree, Infallible> {
            Ok(PackageTree::new(name))
        }

        fn repo_exists(&self, _: &str) -> Result<bool, Infallible> {
            Ok(true)
        }

        fn vendor_code_exists(&self, _: &str) -> Result<bool, Infallible> {
            Ok(false)
        }

        fn export_project(&self, _: &str, _: &Version, _: &Path) -> Result<(), Infallible> {
            Ok(())
        }

        fn deduce_project_root(&self, path: &str) -> Result<String, Infallible> {
            self.deduced.set(self.deduced.get() + 1);
            Ok(path.split('/').take(2).collect::<Vec<_>>().join("/"))
        }
    }

    #[test]
    fn versions_are_sorted_filtered_and_cached() {
        let sm = Counting::default();
        let ignore = Set::default();
        let mut bridge = SourceBridge::new(&sm, false, &ignore);
        let id = ProjectIdentifier::with_source("foo", "fork/foo");
        let listed = bridge.versions(&id).unwrap();
        assert_eq!(
            listed.as_ref(),
            &[
                Version::semver("2.0.0").unwrap(),
                Version::semver("1.0.0").unwrap()
            ]
        );
        bridge.versions(&id).unwrap();
        bridge.viable_count(&id, &Constraint::Any);
        assert_eq!(sm.listed.get(), 1);
        assert_eq!(bridge.viable_count(&id, &Constraint::revision("def")), 1);
    }

    #[test]
    fn imports_are_grouped_by_longest_prefix() {
        let sm = Counting::default();
        let ignore = Set::default();
        let mut bridge = SourceBridge::new(&sm, false, &ignore);
        let deps = vec![
            ProjectDep::new(ProjectIdentifier::new("a.org/x"), Constraint::Any),
            ProjectDep::new(ProjectIdentifier::new("a.org/x/sub"), Constraint::Any),
            ProjectDep::new(ProjectIdentifier::new("unused.org/y"), Constraint::Any),
        ];
        let imports: Vec<String> = ["a.org/x", "a.org/x/sub/p", "b.org/z/q", "b.org/z/r"]
            .map(String::from)
            .to_vec();
        let cdeps = bridge
            .intersect_constraints_with_imports(&deps, &imports)
            .unwrap();
        let summary: Vec<(&str, Vec<&str>)> = cdeps
            .iter()
            .map(|cd| {
                (
                    cd.ident().local_name.as_str(),
                    cd.packages.iter().map(String::as_str).collect(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a.org/x", vec!["a.org/x"]),
                ("a.org/x/sub", vec!["a.org/x/sub/p"]),
                ("b.org/z", vec!["b.org/z/q", "b.org/z/r"]),
            ]
        );
        assert_eq!(sm.deduced.get(), 2);
    }

    #[test]
    fn root_reach_includes_test_imports() {
        let sm = Counting::default();
        let ignore = Set::default();
        let mut bridge = SourceBridge::new(&sm, false, &ignore);
        let tree = PackageTree::new("root").with_package(
            Package::new("root")
                .imports(["dep.org/a"])
                .test_imports(["dev.org/b"]),
        );
        let manifest = Manifest::new([ProjectDep::new(
            ProjectIdentifier::new("dep.org/a"),
            Constraint::semver("^1.0.0").unwrap(),
        )]);
        let (cdeps, internal) = bridge.root_deps(&manifest, &tree).unwrap();
        assert_eq!(internal, 1);
        assert_eq!(cdeps.len(), 2);
        assert_eq!(cdeps[1].dep.constraint, Constraint::Any);
    }

    #[test]
    fn root_imports_skip_ignored_packages() {
        let sm = Counting::default();
        let ignore: Set<String> = ["root/skip".to_string()].into_iter().collect();
        let mut bridge = SourceBridge::new(&sm, false, &ignore);
        let tree = PackageTree::new("root")
            .with_package(Package::new("root").imports(["root/util", "dep.org/a"]))
            .with_package(Package::new("root/util").imports(["dep.org/a/sub", "dep.org/a"]))
            .with_package(Package::new("root/skip").imports(["gone.org/x"]));
        let manifest = Manifest::new([ProjectDep::new(
            ProjectIdentifier::new("dep.org/a"),
            Constraint::Any,
        )]);
        let (cdeps, internal) = bridge.root_deps(&manifest, &tree).unwrap();
        assert_eq!(internal, 2);
        assert_eq!(cdeps.len(), 1);
        assert_eq!(
            cdeps[0].packages.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["dep.org/a", "dep.org/a/sub"]
        );
    }
}
