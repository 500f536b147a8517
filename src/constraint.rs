// SPDX-License-Identifier: MPL-2.0

//! Constraints restrict which versions of a project a depender accepts.

use std::fmt::{self, Display};

use crate::error::ConstraintError;
use crate::version::{PairedVersion, Revision, UnpairedVersion, Version};
use crate::version_set::{parse_requirement, SemverRanges};
use crate::Ranges;

/// A predicate over [Version]s.
///
/// Every constraint kind can be intersected with every other kind, so the
/// constraints of all dependers on one project always fold into a single
/// [Constraint].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constraint {
    /// Any version at all.
    Any,
    /// No version. Produced by intersecting disjoint constraints.
    Empty,
    /// Exactly this revision, whatever version names point at it.
    Revision(Revision),
    /// This branch.
    Branch(String),
    /// This non-semver tag.
    PlainTag(String),
    /// This version name or this revision.
    Paired(PairedVersion),
    /// A set of semantic versions.
    Semver(SemverRanges),
}

impl Constraint {
    /// Parse a semver requirement.
    ///
    /// A bare version (`1.0.0`) is an exact constraint, `*` and anything else
    /// covering every version is [Constraint::Any].
    pub fn semver(input: &str) -> Result<Self, ConstraintError> {
        let input = input.trim();
        if let Ok(version) = semver::Version::parse(input) {
            return Ok(Self::Semver(Ranges::singleton(version)));
        }
        let ranges = parse_requirement(input)?;
        Ok(if ranges == Ranges::full() {
            Self::Any
        } else if ranges.is_empty() {
            Self::Empty
        } else {
            Self::Semver(ranges)
        })
    }

    /// Exactly one revision.
    pub fn revision(rev: impl Into<Revision>) -> Self {
        Self::Revision(rev.into())
    }

    /// A branch.
    pub fn branch(name: impl Into<String>) -> Self {
        Self::Branch(name.into())
    }

    /// A non-semver tag.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::PlainTag(name.into())
    }

    /// Whether no version can satisfy this constraint.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The revision named by a revision constraint.
    pub fn as_revision(&self) -> Option<&Revision> {
        match self {
            Self::Revision(r) => Some(r),
            _ => None,
        }
    }

    /// Whether `version` satisfies the constraint.
    ///
    /// Paired versions satisfy a constraint through either half: a semver
    /// range through the version name, a revision through the revision.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Empty => false,
            Self::Revision(r) => version.revision() == Some(r),
            Self::Branch(b) => {
                matches!(version.unpaired(), Some(UnpairedVersion::Branch(name)) if name == b)
            }
            Self::PlainTag(t) => {
                matches!(version.unpaired(), Some(UnpairedVersion::PlainTag(name)) if name == t)
            }
            Self::Paired(p) => match version {
                Version::Unpaired(u) => u == p.unpaired(),
                Version::Paired(q) => q.revision() == p.revision() || q.unpaired() == p.unpaired(),
                Version::Revision(r) => r == p.revision(),
            },
            Self::Semver(ranges) => version.as_semver().is_some_and(|v| ranges.contains(v)),
        }
    }

    /// The constraint admitting exactly the versions both constraints admit.
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        match (self, other) {
            (Self::Any, c) | (c, Self::Any) => c.clone(),
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::Revision(a), Self::Revision(b)) if a == b => Self::Revision(a.clone()),
            (Self::Revision(r), Self::Paired(p)) | (Self::Paired(p), Self::Revision(r))
                if p.revision() == r =>
            {
                Self::Revision(r.clone())
            }
            (Self::Revision(_), _) | (_, Self::Revision(_)) => Self::Empty,
            (Self::Paired(a), Self::Paired(b)) => {
                if a.revision() == b.revision() {
                    Self::Revision(a.revision().clone())
                } else if a.unpaired() == b.unpaired() {
                    Self::Paired(a.clone())
                } else {
                    Self::Empty
                }
            }
            (Self::Paired(p), Self::Branch(b)) | (Self::Branch(b), Self::Paired(p)) => {
                match p.unpaired() {
                    UnpairedVersion::Branch(name) if name == b => Self::Paired(p.clone()),
                    _ => Self::Empty,
                }
            }
            (Self::Paired(p), Self::PlainTag(t)) | (Self::PlainTag(t), Self::Paired(p)) => {
                match p.unpaired() {
                    UnpairedVersion::PlainTag(name) if name == t => Self::Paired(p.clone()),
                    _ => Self::Empty,
                }
            }
            (Self::Paired(p), Self::Semver(ranges)) | (Self::Semver(ranges), Self::Paired(p)) => {
                match p.unpaired().as_semver() {
                    Some(v) if ranges.contains(v) => Self::Paired(p.clone()),
                    _ => Self::Empty,
                }
            }
            (Self::Branch(a), Self::Branch(b)) if a == b => Self::Branch(a.clone()),
            (Self::PlainTag(a), Self::PlainTag(b)) if a == b => Self::PlainTag(a.clone()),
            (Self::Semver(a), Self::Semver(b)) => {
                let both = a.intersection(b);
                if both.is_empty() {
                    Self::Empty
                } else {
                    Self::Semver(both)
                }
            }
            _ => Self::Empty,
        }
    }
}

impl From<Version> for Constraint {
    fn from(version: Version) -> Self {
        match version {
            Version::Unpaired(UnpairedVersion::Semver(v)) => Self::Semver(Ranges::singleton(v)),
            Version::Unpaired(UnpairedVersion::Branch(b)) => Self::Branch(b),
            Version::Unpaired(UnpairedVersion::PlainTag(t)) => Self::PlainTag(t),
            Version::Paired(p) => Self::Paired(p),
            Version::Revision(r) => Self::Revision(r),
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Empty => f.write_str("none"),
            Self::Revision(r) => write!(f, "{r}"),
            Self::Branch(name) | Self::PlainTag(name) => f.write_str(name),
            Self::Paired(p) => write!(f, "{p}"),
            Self::Semver(ranges) => write!(f, "{ranges}"),
        }
    }
}

// TESTS #######################################################################
