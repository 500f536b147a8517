// SPDX-License-Identifier: MPL-2.0

//! Semantic version requirements as sets of versions.
//!
//! Requirement strings are parsed with the [semver] crate and every comparator
//! is turned into a [Ranges] of [semver::Version]. Ranges can be intersected,
//! which is what lets constraints from several dependers be combined on one
//! project.
//!
//! Upper bounds derived from `<`, `<=` on a partial version, `~`, `^` and
//! wildcards are placed on the `-0` pre-release of the bound, so that
//! `<2.0.0` excludes `2.0.0-beta` the same way it excludes `2.0.0`.
//! Pre-releases lying strictly inside a range are members of it.

use semver::{Comparator, Op, Prerelease, VersionReq};

use crate::error::ConstraintError;
use crate::Ranges;

/// The set of semantic versions.
pub type SemverRanges = Ranges<semver::Version>;

/// Parse a requirement such as `>=1.2.0, <2.0.0` into a set of versions.
pub fn parse_requirement(input: &str) -> Result<SemverRanges, ConstraintError> {
    let req = VersionReq::parse(input).map_err(|source| ConstraintError::Requirement {
        input: input.to_string(),
        source,
    })?;
    requirement_ranges(&req).ok_or_else(|| ConstraintError::UnsupportedOperator(input.to_string()))
}

/// Convert a parsed requirement. All comparators must hold, so the result is
/// their intersection. Returns `None` for operators this crate does not know.
pub fn requirement_ranges(req: &VersionReq) -> Option<SemverRanges> {
    req.comparators
        .iter()
        .try_fold(Ranges::full(), |acc, cmp| {
            comparator_ranges(cmp).map(|r| acc.intersection(&r))
        })
}

fn comparator_ranges(cmp: &Comparator) -> Option<SemverRanges> {
    let lower = || version(cmp.major, cmp.minor.unwrap_or(0), cmp.patch.unwrap_or(0), &cmp.pre);
    let ranges = match cmp.op {
        Op::Exact | Op::Wildcard => match (cmp.minor, cmp.patch) {
            (Some(_), Some(_)) => Ranges::singleton(lower()),
            (minor, _) => up_to(lower(), next_prefix(cmp.major, minor, None)),
        },
        Op::Greater => match (cmp.minor, cmp.patch) {
            (Some(_), Some(_)) => Ranges::strictly_higher_than(lower()),
            (minor, _) => match next_prefix(cmp.major, minor, None) {
                Some((major, minor, patch)) => Ranges::higher_than(release(major, minor, patch)),
                None => Ranges::empty(),
            },
        },
        Op::GreaterEq => Ranges::higher_than(lower()),
        Op::Less => {
            if cmp.pre.is_empty() {
                Ranges::strictly_lower_than(floor(
                    cmp.major,
                    cmp.minor.unwrap_or(0),
                    cmp.patch.unwrap_or(0),
                ))
            } else {
                Ranges::strictly_lower_than(lower())
            }
        }
        Op::LessEq => match (cmp.minor, cmp.patch) {
            (Some(_), Some(_)) => Ranges::lower_than(lower()),
            (minor, _) => match next_prefix(cmp.major, minor, None) {
                Some((major, minor, patch)) => {
                    Ranges::strictly_lower_than(floor(major, minor, patch))
                }
                None => Ranges::full(),
            },
        },
        Op::Tilde => up_to(lower(), next_prefix(cmp.major, cmp.minor, None)),
        Op::Caret => {
            let upper = match (cmp.major, cmp.minor, cmp.patch) {
                (0, Some(0), Some(patch)) => next_prefix(0, Some(0), Some(patch)),
                (0, Some(minor), _) => next_prefix(0, Some(minor), None),
                (major, _, _) => next_prefix(major, None, None),
            };
            up_to(lower(), upper)
        }
        _ => return None,
    };
    Some(ranges)
}

/// The first `major.minor.patch` after every version starting with the given
/// components, carrying into the next component on overflow. `None` when no
/// such version exists.
fn next_prefix(major: u64, minor: Option<u64>, patch: Option<u64>) -> Option<(u64, u64, u64)> {
    match (minor, patch) {
        (Some(minor), Some(patch)) => match patch.checked_add(1) {
            Some(patch) => Some((major, minor, patch)),
            None => next_prefix(major, Some(minor), None),
        },
        (Some(minor), None) => match minor.checked_add(1) {
            Some(minor) => Some((major, minor, 0)),
            None => next_prefix(major, None, None),
        },
        (None, _) => major.checked_add(1).map(|major| (major, 0, 0)),
    }
}

/// From `lower` up to the floor of `upper`, or without bound.
fn up_to(lower: semver::Version, upper: Option<(u64, u64, u64)>) -> SemverRanges {
    match upper {
        Some((major, minor, patch)) => Ranges::between(lower, floor(major, minor, patch)),
        None => Ranges::higher_than(lower),
    }
}

fn version(major: u64, minor: u64, patch: u64, pre: &Prerelease) -> semver::Version {
    semver::Version {
        major,
        minor,
        patch,
        pre: pre.clone(),
        build: semver::BuildMetadata::EMPTY,
    }
}

fn release(major: u64, minor: u64, patch: u64) -> semver::Version {
    semver::Version::new(major, minor, patch)
}

/// The lowest version sharing `major.minor.patch`.
fn floor(major: u64, minor: u64, patch: u64) -> semver::Version {
    version(
        major,
        minor,
        patch,
        &Prerelease::new("0").expect("`0` is a valid pre-release identifier"),
    )
}

// TESTS #######################################################################
