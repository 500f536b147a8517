// SPDX-License-Identifier: MPL-2.0

//! Bimodal backtracking solver.
//!
//! The solver picks one version for every project the root transitively
//! imports, and within each project only the packages that are actually
//! imported. It works depth first over a stack of selections:
//!
//! 1. Among the projects with unselected versions or packages, pick the one
//!    with the fewest candidate versions left.
//! 2. Walk its version queue until a candidate satisfies every constraint on
//!    the project, provides every required package, and has dependencies
//!    that can still be met.
//! 3. Push the candidate and the dependencies its required packages import.
//!
//! When a queue runs out, the solver backjumps to the most recent selection
//! that contributed to one of the rejections, and moves that selection's
//! queue forward instead. Selections in between are undone without being
//! revisited.
//!
//! Given the same source manager answers, lock and direction, the result is
//! always the same.

use std::cmp::Reverse;
use std::hash::BuildHasherDefault;
use std::path::Path;

use log::{debug, info};
use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

use crate::bridge::SourceBridge;
use crate::error::{CandidateFailure, IdentityMismatch, NoSolution, Rejection, SolveError};
use crate::internal::{locked_candidate, Pending, SearchState, Selection, VersionQueue};
use crate::package_tree::PackageTree;
use crate::project::{
    Atom, AtomWithPackages, CompleteDep, Lock, LockedProject, Manifest, ProjectIdentifier,
};
use crate::provider::SourceManager;
use crate::report::{TraceEvent, Tracer};
use crate::type_aliases::{ExternalReach, FxIndexSet, Set};
use crate::version::Version;

/// Everything a solve starts from.
#[derive(Debug, Clone)]
pub struct SolveParameters {
    root: ProjectIdentifier,
    manifest: Manifest,
    package_tree: PackageTree,
    lock: Lock,
    downgrade: bool,
    change_all: bool,
    ignore: Set<String>,
    max_attempts: Option<usize>,
}

impl SolveParameters {
    /// Solve for the root project with this manifest and package tree. The
    /// tree must be rooted at the root's local name.
    pub fn new(root: ProjectIdentifier, manifest: Manifest, package_tree: PackageTree) -> Self {
        Self {
            root,
            manifest,
            package_tree,
            lock: Lock::default(),
            downgrade: false,
            change_all: false,
            ignore: Set::default(),
            max_attempts: None,
        }
    }

    /// Prefer the versions of a previous solve.
    pub fn lock(mut self, lock: Lock) -> Self {
        self.lock = lock;
        self
    }

    /// Prefer the lowest acceptable semver versions instead of the highest.
    pub fn downgrade(mut self, downgrade: bool) -> Self {
        self.downgrade = downgrade;
        self
    }

    /// Disregard the lock entirely.
    pub fn change_all(mut self, change_all: bool) -> Self {
        self.change_all = change_all;
        self
    }

    /// Import paths to leave out of every reach computation.
    pub fn ignore<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Give up once more than `max` attempts are needed.
    pub fn max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = Some(max);
        self
    }
}

/// A successful solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    projects: Vec<AtomWithPackages>,
    attempts: usize,
}

impl Solution {
    /// Selected projects, in selection order, the root excluded.
    pub fn projects(&self) -> &[AtomWithPackages] {
        &self.projects
    }

    /// How many times the search descended: one, plus one per backjump.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// The selection for a project, by local name.
    pub fn get(&self, local_name: &str) -> Option<&AtomWithPackages> {
        self.projects
            .iter()
            .find(|p| p.atom.ident.local_name == local_name)
    }

    /// The solution as a lock, to seed a later solve.
    pub fn to_lock(&self) -> Lock {
        Lock::new(self.projects.iter().map(|p| LockedProject {
            ident: p.atom.ident.clone(),
            version: p.atom.version.clone(),
            packages: p.packages.clone(),
        }))
    }

    /// Export every project into `dest/<local name>`.
    pub fn export<SM: SourceManager>(&self, sm: &SM, dest: &Path) -> Result<(), SM::Err> {
        for project in &self.projects {
            let ident = &project.atom.ident;
            let to = dest.join(&ident.local_name);
            info!("exporting {} to {}", project.atom, to.display());
            sm.export_project(&ident.network_name, &project.atom.version, &to)?;
        }
        Ok(())
    }
}

/// Main function of the library.
/// Finds one version, and the needed packages, of every project the root
/// transitively imports.
#[cold]
pub fn solve<SM: SourceManager>(
    source_manager: &SM,
    params: &SolveParameters,
) -> Result<Solution, SolveError<SM>> {
    solve_traced(source_manager, params, &mut ())
}

/// [solve], reporting progress to `tracer`.
#[cold]
pub fn solve_traced<SM: SourceManager>(
    source_manager: &SM,
    params: &SolveParameters,
    tracer: &mut dyn Tracer,
) -> Result<Solution, SolveError<SM>> {
    let mut solver = Solver {
        params,
        bridge: SourceBridge::new(source_manager, params.downgrade, &params.ignore),
        state: SearchState::new(params.root.clone(), Vec::new()),
        tracer,
        attempts: 1,
    };
    let result = solver.run();
    let event = match &result {
        Ok(solution) => {
            let packages = solution.projects.iter().map(|p| p.packages.len()).sum();
            info!(
                "found solution with {packages} packages from {} projects",
                solution.projects.len()
            );
            TraceEvent::Solved {
                packages,
                projects: solution.projects.len(),
                attempts: solution.attempts,
            }
        }
        Err(err) => {
            info!("solving failed: {err}");
            TraceEvent::Failed
        }
    };
    solver.tracer.trace(&event);
    result
}

type Candidate = (AtomWithPackages, Vec<CompleteDep>);

struct Solver<'a, 't, SM: SourceManager> {
    params: &'a SolveParameters,
    bridge: SourceBridge<'a, SM>,
    state: SearchState,
    tracer: &'t mut dyn Tracer,
    attempts: usize,
}

impl<SM: SourceManager> Solver<'_, '_, SM> {
    fn run(&mut self) -> Result<Solution, SolveError<SM>> {
        let params = self.params;
        if params.package_tree.import_root != params.root.local_name {
            return Err(SolveError::InvalidRoot(format!(
                "package tree is rooted at {:?}, not at {:?}",
                params.package_tree.import_root, params.root.local_name
            )));
        }

        let (root_deps, internal_packages) = self
            .bridge
            .root_deps(&params.manifest, &params.package_tree)?;
        info!(
            "root project {} imports {} projects",
            params.root,
            root_deps.len()
        );
        self.tracer.trace(&TraceEvent::RootSelected {
            root: params.root.clone(),
            internal_packages,
            external_packages: root_deps.iter().map(|cd| cd.packages.len()).sum(),
            projects: root_deps.len(),
        });
        self.state = SearchState::new(params.root.clone(), root_deps);

        loop {
            self.check_cancelled()?;

            let Some(next) = self.next_pending() else {
                return Ok(self.solution());
            };
            info!(
                "attempting {} with {} packages",
                next.ident,
                next.packages.len()
            );
            self.tracer.trace(&TraceEvent::Attempting {
                ident: next.ident.clone(),
                packages: next.packages.len(),
                depth: self.state.depth(),
                addition: next.addition,
            });

            if next.addition {
                self.add_packages(next)?;
            } else {
                self.select_project(next)?;
            }
        }
    }

    /// Pending work with the highest priority: package additions first, then
    /// the project with the fewest viable versions, then discovery order.
    fn next_pending(&mut self) -> Option<Pending> {
        let mut pending = self.state.pending();
        let mut prioritized: PriorityQueue<
            String,
            (bool, Reverse<usize>, Reverse<usize>),
            BuildHasherDefault<FxHasher>,
        > = PriorityQueue::default();
        for (discovery, (local, work)) in pending.iter().enumerate() {
            let viable = if work.addition {
                0
            } else {
                let constraint = self.state.constraint_on(local);
                self.bridge.viable_count(&work.ident, &constraint)
            };
            prioritized.push(
                local.clone(),
                (work.addition, Reverse(viable), Reverse(discovery)),
            );
        }
        let (local, _) = prioritized.pop()?;
        pending.swap_remove(&local)
    }

    fn select_project(&mut self, next: Pending) -> Result<(), SolveError<SM>> {
        let mut queue = self.build_queue(&next.ident);
        match self.find_valid_version(&mut queue, &next.packages)? {
            Some(candidate) => {
                self.commit(candidate, Some(queue));
                Ok(())
            }
            None => {
                debug_assert!(queue.is_exhausted());
                let mut culprits = queue.culprits.clone();
                culprits.extend(
                    self.state
                        .dependers(&next.ident.local_name)
                        .into_iter()
                        .map(|id| id.local_name),
                );
                self.backjump(vec![next.ident], culprits, queue.failures)
            }
        }
    }

    fn add_packages(&mut self, next: Pending) -> Result<(), SolveError<SM>> {
        let local = next.ident.local_name.clone();
        let version = self
            .state
            .selected_version(&local)
            .cloned()
            .expect("package additions only target selected projects");
        match self.check_candidate(&next.ident, &version, &next.packages)? {
            Ok(deps) => {
                let atom = AtomWithPackages {
                    atom: Atom {
                        ident: next.ident,
                        version,
                    },
                    packages: next.packages,
                };
                self.commit((atom, deps), None);
                Ok(())
            }
            Err(rejection) => {
                debug!("cannot add packages to {}: {rejection}", next.ident);
                self.trace_rejection(&next.ident, Some(&version), &rejection);
                let mut culprits: FxIndexSet<String> = FxIndexSet::default();
                culprits.insert(local.clone());
                culprits.extend(
                    self.requirers(&local, &next.packages)
                        .into_iter()
                        .map(|id| id.local_name),
                );
                culprits.extend(rejection.culprits().iter().map(|id| id.local_name.clone()));
                let failures = vec![CandidateFailure {
                    version: Some(version),
                    rejection,
                }];
                self.backjump(Vec::new(), culprits, failures)
            }
        }
    }

    fn build_queue(&mut self, ident: &ProjectIdentifier) -> VersionQueue {
        if !self.bridge.exists(ident) {
            debug!("{ident} could not be located");
            return VersionQueue::empty(ident.clone(), Rejection::Unlocatable);
        }
        let listed = match self.bridge.versions(ident) {
            Ok(listed) => listed,
            Err(msg) => {
                return VersionQueue::empty(ident.clone(), Rejection::Unavailable(msg.to_string()))
            }
        };
        let constraint = self.state.constraint_on(&ident.local_name);
        let locked = if self.params.change_all {
            None
        } else {
            self.params
                .lock
                .get(ident)
                .map(|lp| locked_candidate(lp, &listed, &constraint))
        };
        let injected = constraint
            .as_revision()
            .filter(|rev| !listed.iter().any(|v| v.revision() == Some(*rev)))
            .cloned();
        VersionQueue::new(ident.clone(), locked, injected, &listed)
    }

    fn find_valid_version(
        &mut self,
        queue: &mut VersionQueue,
        packages: &[String],
    ) -> Result<Option<Candidate>, SolveError<SM>> {
        while let Some(version) = queue.current().cloned() {
            self.check_cancelled()?;
            match self.check_candidate(&queue.ident, &version, packages)? {
                Ok(deps) => {
                    let atom = AtomWithPackages {
                        atom: Atom {
                            ident: queue.ident.clone(),
                            version,
                        },
                        packages: packages.to_vec(),
                    };
                    return Ok(Some((atom, deps)));
                }
                Err(rejection) => {
                    debug!("rejected {} at {version}: {rejection}", queue.ident);
                    self.trace_rejection(&queue.ident, Some(&version), &rejection);
                    queue.advance(Some(rejection));
                }
            }
        }
        Ok(None)
    }

    /// Decide whether `version` of `ident` can be selected with `packages`.
    ///
    /// On success returns the dependencies the packages bring in. Only an
    /// identity mismatch is fatal; everything else rejects the candidate.
    fn check_candidate(
        &mut self,
        ident: &ProjectIdentifier,
        version: &Version,
        packages: &[String],
    ) -> Result<Result<Vec<CompleteDep>, Rejection>, SolveError<SM>> {
        let local = ident.local_name.as_str();
        if let Some((depender, cd)) = self
            .state
            .dependencies_on(local)
            .find(|(_, cd)| !cd.dep.constraint.matches(version))
        {
            return Ok(Err(Rejection::ConstraintNotMet {
                depender: depender.clone(),
                constraint: cd.dep.constraint.clone(),
            }));
        }

        let manifest = match self.bridge.manifest(ident, version) {
            Ok(manifest) => manifest,
            Err(msg) => return Ok(Err(Rejection::Unavailable(msg.to_string()))),
        };
        let tree = match self.bridge.package_tree(ident, version) {
            Ok(tree) => tree,
            Err(msg) => return Ok(Err(Rejection::Unavailable(msg.to_string()))),
        };
        let reach = match self.bridge.reach(ident, version) {
            Ok(reach) => reach,
            Err(msg) => return Ok(Err(Rejection::Unavailable(msg.to_string()))),
        };
        if let Some(rejection) = self.check_packages(local, &tree, &reach, packages) {
            return Ok(Err(rejection));
        }

        let mut imports: Vec<String> = packages
            .iter()
            .filter_map(|p| reach.get(p))
            .flatten()
            .cloned()
            .collect();
        imports.sort();
        imports.dedup();
        let deps = match self
            .bridge
            .intersect_constraints_with_imports(&manifest.dependencies, &imports)
        {
            Ok(deps) => deps,
            Err((path, msg)) => {
                return Ok(Err(Rejection::UnknownImport {
                    path,
                    message: msg.to_string(),
                }))
            }
        };

        for cd in &deps {
            if let Some(rejection) = self.check_dep(ident, cd)? {
                return Ok(Err(rejection));
            }
        }
        Ok(Ok(deps))
    }

    /// Every required package must exist, be readable, and only import
    /// readable packages.
    fn check_packages(
        &self,
        local: &str,
        tree: &PackageTree,
        reach: &ExternalReach,
        packages: &[String],
    ) -> Option<Rejection> {
        for package in packages {
            let single = std::slice::from_ref(package);
            match tree.packages.get(package) {
                None => {
                    return Some(Rejection::MissingPackage {
                        package: package.clone(),
                        dependers: self.requirers(local, single),
                    })
                }
                Some(Err(err)) => {
                    return Some(Rejection::PackageError {
                        package: package.clone(),
                        message: err.message.clone(),
                        dependers: self.requirers(local, single),
                    })
                }
                Some(Ok(_)) if !reach.contains_key(package) => {
                    return Some(Rejection::PackageError {
                        package: package.clone(),
                        message: "imports a package that is missing or has errors".to_string(),
                        dependers: self.requirers(local, single),
                    })
                }
                Some(Ok(_)) => {}
            }
        }
        None
    }

    /// Check one dependency of a candidate against the current selections.
    fn check_dep(
        &mut self,
        depender: &ProjectIdentifier,
        cd: &CompleteDep,
    ) -> Result<Option<Rejection>, SolveError<SM>> {
        let dep = cd.ident();
        let local = dep.local_name.as_str();

        if local == self.state.root.local_name {
            if !dep.same_project(&self.state.root) {
                return Err(IdentityMismatch {
                    local_name: local.to_string(),
                    wanted: dep.network_name.clone(),
                    depender: depender.clone(),
                    existing: self.state.root.network_name.clone(),
                    existing_dependers: vec![self.state.root.clone()],
                }
                .into());
            }
            // The root has no version to test.
            return Ok(None);
        }

        if let Some((_, other)) = self
            .state
            .dependencies_on(local)
            .find(|(_, other)| !other.ident().same_project(dep))
        {
            let existing = other.ident().network_name.clone();
            let mut existing_dependers: Vec<ProjectIdentifier> = Vec::new();
            for (d, o) in self.state.dependencies_on(local) {
                if o.ident().network_name == existing && !existing_dependers.contains(d) {
                    existing_dependers.push(d.clone());
                }
            }
            return Err(IdentityMismatch {
                local_name: local.to_string(),
                wanted: dep.network_name.clone(),
                depender: depender.clone(),
                existing,
                existing_dependers,
            }
            .into());
        }

        let combined = self.state.constraint_on(local).intersect(&cd.dep.constraint);
        if combined.is_empty() {
            let mut dependers: Vec<ProjectIdentifier> = Vec::new();
            for (d, o) in self.state.dependencies_on(local) {
                if o.dep.constraint.intersect(&cd.dep.constraint).is_empty()
                    && !dependers.contains(d)
                {
                    dependers.push(d.clone());
                }
            }
            if dependers.is_empty() {
                dependers = self.state.dependers(local);
            }
            return Ok(Some(Rejection::DisjointConstraint {
                dep: dep.clone(),
                constraint: cd.dep.constraint.clone(),
                dependers,
            }));
        }

        if let Some(selected) = self.state.selected_version(local).cloned() {
            if !cd.dep.constraint.matches(&selected) {
                return Ok(Some(Rejection::SelectedVersionDisallowed {
                    dep: dep.clone(),
                    constraint: cd.dep.constraint.clone(),
                    selected,
                }));
            }
            let have = self.state.selected_packages(local);
            let missing: Vec<String> = cd
                .packages
                .iter()
                .filter(|p| !have.contains(p.as_str()))
                .cloned()
                .collect();
            if missing.is_empty() {
                return Ok(None);
            }
            // New packages of a selected project must exist at its version.
            let available = match (
                self.bridge.package_tree(dep, &selected),
                self.bridge.reach(dep, &selected),
            ) {
                (Ok(tree), Ok(reach)) => Some((tree, reach)),
                _ => None,
            };
            for package in missing {
                let present = available.as_ref().is_some_and(|(tree, reach)| {
                    matches!(tree.packages.get(&package), Some(Ok(_)))
                        && reach.contains_key(&package)
                });
                if !present {
                    return Ok(Some(Rejection::SelectedPackageMissing {
                        dep: dep.clone(),
                        package,
                        selected,
                    }));
                }
            }
            return Ok(None);
        }

        if !self.bridge.any_version_matches(dep, &combined) {
            return Ok(Some(Rejection::NoMatchingVersion {
                dep: dep.clone(),
                constraint: combined,
                dependers: self.state.dependers(local),
            }));
        }
        Ok(None)
    }

    /// Undo selections until one implicated in the failure can move to its
    /// next candidate.
    ///
    /// `culprits` are local names of the projects whose decisions led to the
    /// failure. The most recent of them on the stack is revised; if its
    /// queue runs out too, the failure cascades to its own culprits.
    fn backjump(
        &mut self,
        mut chain: Vec<ProjectIdentifier>,
        mut culprits: FxIndexSet<String>,
        failures: Vec<CandidateFailure>,
    ) -> Result<(), SolveError<SM>> {
        loop {
            self.check_cancelled()?;
            let Some(index) = self.state.backjump_target(&culprits) else {
                let root = culprits
                    .contains(&self.state.root.local_name)
                    .then(|| self.state.root.clone());
                return Err(NoSolution {
                    chain,
                    root,
                    failures,
                }
                .into());
            };

            let mut selection = self.state.unwind_to(index);
            let mut queue = selection
                .queue
                .take()
                .expect("backjump targets are project selections");
            let from = chain.last().unwrap_or(&queue.ident).clone();
            info!("backjumping from {from} to {}", queue.ident);
            self.tracer.trace(&TraceEvent::Backjump {
                from,
                to: queue.ident.clone(),
                depth: self.state.depth(),
            });
            chain.push(queue.ident.clone());

            queue.blame(culprits);
            queue.advance(None);
            let packages: Vec<String> = self
                .state
                .required_packages(&queue.ident.local_name)
                .into_iter()
                .collect();
            match self.find_valid_version(&mut queue, &packages)? {
                Some(candidate) => {
                    self.attempts += 1;
                    if self
                        .params
                        .max_attempts
                        .is_some_and(|max| self.attempts > max)
                    {
                        return Err(SolveError::AttemptsExceeded {
                            attempts: self.attempts,
                            chain,
                        });
                    }
                    self.commit(candidate, Some(queue));
                    return Ok(());
                }
                None => {
                    culprits = queue.culprits.clone();
                    culprits.extend(
                        self.state
                            .dependers(&queue.ident.local_name)
                            .into_iter()
                            .map(|id| id.local_name),
                    );
                }
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), SolveError<SM>> {
        self.bridge
            .source_manager()
            .should_cancel()
            .map_err(SolveError::Cancelled)
    }

    fn commit(&mut self, (atom, deps): Candidate, queue: Option<VersionQueue>) {
        info!("selecting {} with {} packages", atom.atom, atom.packages.len());
        let event = TraceEvent::Selected {
            atom: atom.atom.clone(),
            packages: atom.packages.len(),
            depth: self.state.depth() + usize::from(queue.is_some()),
        };
        self.state.push(Selection { atom, deps, queue });
        self.tracer.trace(&event);
    }

    /// Projects importing any of `packages` of `local`.
    fn requirers(&self, local: &str, packages: &[String]) -> Vec<ProjectIdentifier> {
        let mut out: Vec<ProjectIdentifier> = Vec::new();
        for (depender, cd) in self.state.dependencies_on(local) {
            if cd.packages.iter().any(|p| packages.contains(p)) && !out.contains(depender) {
                out.push(depender.clone());
            }
        }
        out
    }

    fn trace_rejection(
        &mut self,
        ident: &ProjectIdentifier,
        version: Option<&Version>,
        rejection: &Rejection,
    ) {
        self.tracer.trace(&TraceEvent::Rejected {
            ident: ident.clone(),
            version: version.cloned(),
            rejection: rejection.clone(),
            depth: self.state.depth(),
        });
    }

    fn solution(&self) -> Solution {
        let mut projects: Vec<AtomWithPackages> = Vec::new();
        for selection in &self.state.selections {
            match projects
                .iter_mut()
                .find(|p| p.atom.ident.local_name == selection.local_name())
            {
                Some(project) => project
                    .packages
                    .extend(selection.atom.packages.iter().cloned()),
                None => projects.push(selection.atom.clone()),
            }
        }
        for project in &mut projects {
            project.packages.sort();
            project.packages.dedup();
        }
        Solution {
            projects,
            attempts: self.attempts,
        }
    }
}
