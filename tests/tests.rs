// SPDX-License-Identifier: MPL-2.0

mod common;

use std::path::Path;

use bimodal::{
    solve, solve_traced, Manifest, PackageTree, ProjectIdentifier, SolveError, SolveParameters,
    TextTracer, TraceEvent,
};

use common::{versions, FixtureSM, Spec};

fn transitive() -> FixtureSM {
    FixtureSM::new(vec![
        Spec::new("root 0.0.0", &["foo *"]),
        Spec::new("foo 1.0.0", &["bar 1.0.0"]),
        Spec::new("foo 2.0.0", &["bar 2.0.0"]),
        Spec::new("foo 3.0.0", &["bar 3.0.0"]),
        Spec::new("bar 1.0.0", &["baz *"]),
        Spec::new("bar 2.0.0", &["baz 2.0.0"]),
        Spec::new("bar 3.0.0", &["baz 3.0.0"]),
        Spec::new("baz 1.0.0", &[]),
    ])
}

fn unsolvable() -> FixtureSM {
    FixtureSM::new(vec![
        Spec::new("root 0.0.0", &["a *", "b *"]),
        Spec::new("a 1.0.0", &["b 1.0.0"]),
        Spec::new("a 2.0.0", &["b 2.0.0"]),
        Spec::new("b 1.0.0", &["a 2.0.0"]),
        Spec::new("b 2.0.0", &["a 1.0.0"]),
    ])
}

#[test]
fn same_result_on_repeated_runs() {
    common::init_logging();
    let sm = transitive();
    let params = sm.params();
    let one = solve(&sm, &params).unwrap();
    for _ in 0..10 {
        assert_eq!(one, solve(&sm, &params).unwrap());
    }
}

#[test]
fn solution_is_stable_under_its_own_lock() {
    common::init_logging();
    let sm = transitive();
    let first = solve(&sm, &sm.params()).unwrap();
    let lock = first.to_lock();
    assert_eq!(lock.projects.len(), 3);

    let second = solve(&sm, &sm.params().lock(lock)).unwrap();
    assert_eq!(versions(&first), versions(&second));
    // Locked versions are tried first, so nothing needs revisiting.
    assert_eq!(second.attempts(), 1);
}

#[test]
fn source_manager_is_asked_once_per_question() {
    common::init_logging();
    for sm in [transitive(), unsolvable()] {
        let _ = solve(&sm, &sm.params());
        let calls = sm.calls.borrow();
        let mut unique = calls.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(calls.len(), unique.len(), "repeated queries: {calls:?}");
    }
}

#[test]
fn gives_up_after_max_attempts() {
    common::init_logging();
    let sm = transitive();
    match solve(&sm, &sm.params().max_attempts(2)) {
        Err(err @ SolveError::AttemptsExceeded { .. }) => {
            assert!(err.is_aborted());
            let SolveError::AttemptsExceeded { attempts, .. } = err else {
                unreachable!()
            };
            assert_eq!(attempts, 3);
        }
        other => panic!("expected the attempt bound to trip, got: {other:?}"),
    }
    assert!(solve(&sm, &sm.params().max_attempts(3)).is_ok());
}

#[test]
fn cancellation_stops_the_solve() {
    let mut sm = transitive();
    sm.cancel_after = Some(1);
    let err = solve(&sm, &sm.params()).unwrap_err();
    assert!(matches!(err, SolveError::Cancelled(_)));
    assert!(err.is_aborted());
}

#[test]
fn cancellation_is_checked_between_candidates() {
    let specs = || {
        vec![
            Spec::new("root 0.0.0", &["foo *"]),
            Spec::new("foo 3.0.0", &["bar 9.0.0"]),
            Spec::new("foo 2.0.0", &["bar 9.0.0"]),
            Spec::new("foo 1.0.0", &[]),
            Spec::new("bar 1.0.0", &[]),
        ]
    };
    let sm = FixtureSM::new(specs());
    assert!(solve(&sm, &sm.params()).is_ok());

    // Two steps would be enough to select foo and finish, but the scan over
    // foo's versions polls again before every candidate.
    let mut sm = FixtureSM::new(specs());
    sm.cancel_after = Some(2);
    assert!(matches!(
        solve(&sm, &sm.params()),
        Err(SolveError::Cancelled(_))
    ));
}

#[test]
fn root_must_match_its_package_tree() {
    let sm = transitive();
    let params = SolveParameters::new(
        ProjectIdentifier::new("root"),
        Manifest::default(),
        PackageTree::new("elsewhere"),
    );
    assert!(matches!(
        solve(&sm, &params),
        Err(SolveError::InvalidRoot(_))
    ));
}

#[test]
fn tracing_does_not_change_the_outcome() {
    common::init_logging();
    let sm = transitive();
    let params = sm.params();
    let plain = solve(&sm, &params).unwrap();

    let mut events: Vec<TraceEvent> = Vec::new();
    let traced = solve_traced(&sm, &params, &mut events).unwrap();
    assert_eq!(plain, traced);
    assert!(matches!(
        events.first(),
        Some(TraceEvent::RootSelected { projects: 1, .. })
    ));
    assert_eq!(
        events.last(),
        Some(&TraceEvent::Solved {
            packages: 3,
            projects: 3,
            attempts: 3,
        })
    );
    let backjumps = events
        .iter()
        .filter(|e| matches!(e, TraceEvent::Backjump { .. }))
        .count();
    assert_eq!(backjumps, 2);

    let mut text = TextTracer::new(String::new());
    let rendered = solve_traced(&sm, &params, &mut text).unwrap();
    assert_eq!(plain, rendered);
    let text = text.into_inner();
    assert!(text.contains("✓ select foo at 1.0.0"), "{text}");
    assert!(text.ends_with("✓ found solution with 3 packages from 3 projects\n"));
}

#[test]
fn failure_is_traced_and_explained() {
    common::init_logging();
    let sm = unsolvable();
    let mut events: Vec<TraceEvent> = Vec::new();
    let err = solve_traced(&sm, &sm.params(), &mut events).unwrap_err();
    assert_eq!(events.last(), Some(&TraceEvent::Failed));
    let SolveError::NoSolution(no_solution) = err else {
        panic!("expected no solution, got: {err:?}");
    };
    let message = no_solution.to_string();
    assert!(message.starts_with("no versions of b met constraints:"), "{message}");
    assert!(message.ends_with("\nimplicated projects: b, a\nrequired by the root project root"), "{message}");
    assert_eq!(no_solution.chain_names(), vec!["b", "a"]);
    assert_eq!(no_solution.failures.len(), 2);
}

#[test]
fn export_writes_every_project() {
    let sm = transitive();
    let solution = solve(&sm, &sm.params()).unwrap();
    solution.export(&sm, Path::new("out")).unwrap();
    let exports = sm.exports.borrow();
    let names: Vec<&str> = exports.iter().map(|(name, ..)| name.as_str()).collect();
    assert_eq!(names.len(), 3);
    for (name, version, path) in exports.iter() {
        assert_eq!(path, &Path::new("out").join(name));
        assert_eq!(Some(version), solution.get(name).map(|p| &p.atom.version));
    }
}
