use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use warden_core::{AppError, AppResult, NonEmptyString};

/// Platform id of the member a restriction applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a validated subject id.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new(value)
            .map_err(|_| AppError::Validation("subject id is required".to_owned()))?;
        Ok(Self(value.as_str().trim().to_owned()))
    }

    /// Returns the underlying platform id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for SubjectId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

impl Display for SubjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Platform id of one group membership (a role in chat platforms).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MembershipId(String);

impl MembershipId {
    /// Creates a validated membership id.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new(value)
            .map_err(|_| AppError::Validation("membership id must not be empty".to_owned()))?;
        Ok(Self(value.as_str().trim().to_owned()))
    }

    /// Returns the underlying platform id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for MembershipId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MembershipId> for String {
    fn from(value: MembershipId) -> Self {
        value.0
    }
}

impl Display for MembershipId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Ordered memberships removed from a subject when a restriction was applied.
///
/// The snapshot never contains the sentinel membership and never contains the same
/// membership twice. Once persisted it is replayed verbatim on restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipSnapshot(Vec<MembershipId>);

impl MembershipSnapshot {
    /// Captures the memberships to remove from the subject's current memberships.
    #[must_use]
    pub fn capture(
        current: impl IntoIterator<Item = MembershipId>,
        sentinel: &MembershipId,
    ) -> Self {
        let mut seen = HashSet::new();
        let memberships = current
            .into_iter()
            .filter(|membership| membership != sentinel)
            .filter(|membership| seen.insert(membership.clone()))
            .collect();

        Self(memberships)
    }

    /// Rebuilds a snapshot exactly as it was stored.
    #[must_use]
    pub fn from_stored(memberships: Vec<MembershipId>) -> Self {
        Self(memberships)
    }

    /// Returns memberships in capture order.
    #[must_use]
    pub fn as_slice(&self) -> &[MembershipId] {
        self.0.as_slice()
    }

    /// Returns the number of captured memberships.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the subject held no other membership.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns membership ids as plain strings for storage and transport.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|membership| membership.as_str().to_owned())
            .collect()
    }
}

/// Rank table for every membership of a group. Higher ranks outrank lower ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyRanks {
    ranks: HashMap<MembershipId, i64>,
}

impl HierarchyRanks {
    /// Creates a rank table from `(membership, rank)` pairs.
    #[must_use]
    pub fn new(ranks: impl IntoIterator<Item = (MembershipId, i64)>) -> Self {
        Self {
            ranks: ranks.into_iter().collect(),
        }
    }

    /// Returns the rank of one membership, when the group knows it.
    #[must_use]
    pub fn rank_of(&self, membership: &MembershipId) -> Option<i64> {
        self.ranks.get(membership).copied()
    }

    /// Returns the highest rank among the given memberships.
    ///
    /// `None` means the holder has no ranked membership, which sits below every rank.
    #[must_use]
    pub fn highest_among(&self, memberships: &[MembershipId]) -> Option<i64> {
        memberships
            .iter()
            .filter_map(|membership| self.rank_of(membership))
            .max()
    }

    /// Returns whether `enforcer` memberships strictly outrank `target` memberships.
    #[must_use]
    pub fn outranks(&self, enforcer: &[MembershipId], target: &[MembershipId]) -> bool {
        self.highest_among(enforcer) > self.highest_among(target)
    }
}
