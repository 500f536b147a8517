// SPDX-License-Identifier: MPL-2.0

//! Versions as a source manager reports them.
//!
//! A version is either a name someone gave to a point in a repository's
//! history ([UnpairedVersion]: a semver tag, a branch or a plain tag),
//! the immutable identifier of such a point ([Revision]), or both at once
//! ([PairedVersion]). The set of kinds is closed, so every comparison in the
//! crate matches on them exhaustively.

use std::cmp::Ordering;
use std::fmt::{self, Display};

/// An immutable source revision, typically a commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Revision(String);

impl Revision {
    /// Wrap a revision identifier.
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// The raw revision identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Revision {
    fn from(rev: &str) -> Self {
        Self::new(rev)
    }
}

impl From<String> for Revision {
    fn from(rev: String) -> Self {
        Self(rev)
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A human-assigned version name that may move between revisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnpairedVersion {
    /// A tag that parses as a semantic version.
    Semver(semver::Version),
    /// A branch name.
    Branch(String),
    /// A tag that is not a semantic version.
    PlainTag(String),
}

impl UnpairedVersion {
    /// Parse a semantic version tag.
    pub fn semver(version: &str) -> Result<Self, semver::Error> {
        semver::Version::parse(version).map(Self::Semver)
    }

    /// A branch version.
    pub fn branch(name: impl Into<String>) -> Self {
        Self::Branch(name.into())
    }

    /// A non-semver tag.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::PlainTag(name.into())
    }

    /// Bind this version to the revision it currently resolves to.
    pub fn pair(self, revision: impl Into<Revision>) -> PairedVersion {
        PairedVersion {
            version: self,
            revision: revision.into(),
        }
    }

    /// The semantic version, for semver tags.
    pub fn as_semver(&self) -> Option<&semver::Version> {
        match self {
            Self::Semver(v) => Some(v),
            Self::Branch(_) | Self::PlainTag(_) => None,
        }
    }
}

impl Display for UnpairedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semver(v) => write!(f, "{v}"),
            Self::Branch(name) | Self::PlainTag(name) => f.write_str(name),
        }
    }
}

/// An [UnpairedVersion] together with the [Revision] it pointed at when it
/// was listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairedVersion {
    version: UnpairedVersion,
    revision: Revision,
}

impl PairedVersion {
    /// The version name half of the pair.
    pub fn unpaired(&self) -> &UnpairedVersion {
        &self.version
    }

    /// The revision half of the pair.
    pub fn revision(&self) -> &Revision {
        &self.revision
    }
}

impl Display for PairedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.revision)
    }
}

/// Any version a project can be checked out at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    /// A version name with no known revision.
    Unpaired(UnpairedVersion),
    /// A version name and the revision it resolves to.
    Paired(PairedVersion),
    /// A bare revision.
    Revision(Revision),
}

impl Version {
    /// Parse a semantic version tag.
    pub fn semver(version: &str) -> Result<Self, semver::Error> {
        UnpairedVersion::semver(version).map(Self::Unpaired)
    }

    /// A branch version.
    pub fn branch(name: impl Into<String>) -> Self {
        Self::Unpaired(UnpairedVersion::branch(name))
    }

    /// A non-semver tag.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::Unpaired(UnpairedVersion::plain(name))
    }

    /// A bare revision.
    pub fn bare_revision(rev: impl Into<Revision>) -> Self {
        Self::Revision(rev.into())
    }

    /// The version name, if this is not a bare revision.
    pub fn unpaired(&self) -> Option<&UnpairedVersion> {
        match self {
            Self::Unpaired(u) => Some(u),
            Self::Paired(p) => Some(&p.version),
            Self::Revision(_) => None,
        }
    }

    /// The underlying revision, if one is known.
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Self::Unpaired(_) => None,
            Self::Paired(p) => Some(&p.revision),
            Self::Revision(r) => Some(r),
        }
    }

    /// The semantic version behind this version, if any.
    pub fn as_semver(&self) -> Option<&semver::Version> {
        self.unpaired().and_then(UnpairedVersion::as_semver)
    }

    /// Whether this is a bare revision.
    pub fn is_revision(&self) -> bool {
        matches!(self, Self::Revision(_))
    }

    /// Whether two versions denote the same thing.
    ///
    /// Pairing is symmetric: a paired version matches its own version name,
    /// its own revision, and any other pair sharing either half.
    pub fn matches(&self, other: &Version) -> bool {
        match (self, other) {
            (Self::Revision(r), v) | (v, Self::Revision(r)) => v.revision() == Some(r),
            (Self::Paired(p1), Self::Paired(p2)) => {
                p1.revision == p2.revision || p1.version == p2.version
            }
            (a, b) => a.unpaired() == b.unpaired(),
        }
    }
}

impl From<UnpairedVersion> for Version {
    fn from(v: UnpairedVersion) -> Self {
        Self::Unpaired(v)
    }
}

impl From<PairedVersion> for Version {
    fn from(v: PairedVersion) -> Self {
        Self::Paired(v)
    }
}

impl From<Revision> for Version {
    fn from(r: Revision) -> Self {
        Self::Revision(r)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaired(u) => write!(f, "{u}"),
            Self::Paired(p) => write!(f, "{p}"),
            Self::Revision(r) => write!(f, "{r}"),
        }
    }
}

/// Ordering used to seed version queues.
///
/// Semver versions come first, releases ahead of pre-releases, by descending
/// precedence when upgrading and ascending when downgrading. Everything else
/// compares equal, so a stable sort keeps the source manager's listing order
/// for branches and plain tags.
pub(crate) fn queue_order(a: &Version, b: &Version, downgrade: bool) -> Ordering {
    match (a.as_semver(), b.as_semver()) {
        (Some(l), Some(r)) => match (l.pre.is_empty(), r.pre.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ if downgrade => l.cmp(r),
            _ => r.cmp(l),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub(crate) fn sort_for_queue(versions: &mut [Version], downgrade: bool) {
    versions.sort_by(|a, b| queue_order(a, b, downgrade));
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(v: &str) -> Version {
        Version::semver(v).unwrap()
    }

    fn paired(v: &str, rev: &str) -> Version {
        UnpairedVersion::semver(v).unwrap().pair(rev).into()
    }

    #[test]
    fn pairing_matches_either_half() {
        let p = paired("1.0.0", "abc");
        assert!(p.matches(&sv("1.0.0")));
        assert!(sv("1.0.0").matches(&p));
        assert!(p.matches(&Version::bare_revision("abc")));
        assert!(Version::bare_revision("abc").matches(&p));
        assert!(p.matches(&paired("2.0.0", "abc")));
        assert!(!p.matches(&sv("2.0.0")));
        assert!(!sv("1.0.0").matches(&Version::bare_revision("abc")));
    }

    #[test]
    fn branches_and_tags_are_distinct() {
        assert!(Version::branch("main").matches(&Version::branch("main")));
        assert!(!Version::branch("v1").matches(&Version::plain("v1")));
    }

    #[test]
    fn upgrade_order_puts_releases_first() {
        let mut versions = vec![
            Version::branch("main"),
            sv("1.0.0"),
            sv("2.0.0-beta.1"),
            Version::plain("stable"),
            sv("1.5.0"),
            Version::branch("dev"),
        ];
        sort_for_queue(&mut versions, false);
        assert_eq!(
            versions,
            vec![
                sv("1.5.0"),
                sv("1.0.0"),
                sv("2.0.0-beta.1"),
                Version::branch("main"),
                Version::plain("stable"),
                Version::branch("dev"),
            ]
        );
    }

    #[test]
    fn downgrade_order_is_ascending() {
        let mut versions = vec![sv("3.0.0"), paired("1.0.0", "x"), sv("2.0.0")];
        sort_for_queue(&mut versions, true);
        assert_eq!(versions, vec![paired("1.0.0", "x"), sv("2.0.0"), sv("3.0.0")]);
    }
}
