use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{AppError, AppResult, GroupId};

use crate::membership::{MembershipSnapshot, SubjectId};

/// Upper bound for one restriction, one year in minutes.
pub const MAX_RESTRICTION_MINUTES: u32 = 525_600;

/// Requested restriction length in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct RestrictionDuration(u32);

impl RestrictionDuration {
    /// Validates a transport value. Zero and negative durations are rejected.
    pub fn from_minutes(minutes: i64) -> AppResult<Self> {
        if minutes <= 0 {
            return Err(AppError::Validation(
                "duration_minutes must be greater than zero".to_owned(),
            ));
        }

        match u32::try_from(minutes) {
            Ok(value) if value <= MAX_RESTRICTION_MINUTES => Ok(Self(value)),
            _ => Err(AppError::Validation(format!(
                "duration_minutes must not exceed {MAX_RESTRICTION_MINUTES}"
            ))),
        }
    }

    /// Returns the duration in minutes.
    #[must_use]
    pub fn as_minutes(self) -> u32 {
        self.0
    }

    /// Returns the duration as a calendar delta.
    #[must_use]
    pub fn as_time_delta(self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.0))
    }

    /// Computes the end time for a restriction created at `created_at`.
    #[must_use]
    pub fn ends_at(self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + self.as_time_delta()
    }
}

impl TryFrom<i64> for RestrictionDuration {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_minutes(value)
    }
}

impl From<RestrictionDuration> for u32 {
    fn from(value: RestrictionDuration) -> Self {
        value.0
    }
}

/// Persisted restriction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionStatus {
    /// The subject currently holds only the sentinel membership.
    Active,
    /// Released by expiry or by a manual release.
    Completed,
    /// Ended early by an administrative override.
    Canceled,
}

impl RestrictionStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }

    /// Returns whether the status is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl FromStr for RestrictionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(AppError::Validation(format!(
                "unknown restriction status '{value}'"
            ))),
        }
    }
}

/// How an active restriction was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseTrigger {
    /// An actor released the subject before the end time.
    Manual,
    /// The expiry scheduler fired at the end time.
    Expiry,
    /// An administrator overrode the restriction.
    Override,
}

impl ReleaseTrigger {
    /// Returns a stable storage value for this trigger.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Expiry => "expiry",
            Self::Override => "override",
        }
    }

    /// Returns the terminal status a restore with this trigger produces.
    #[must_use]
    pub fn terminal_status(&self) -> RestrictionStatus {
        match self {
            Self::Manual | Self::Expiry => RestrictionStatus::Completed,
            Self::Override => RestrictionStatus::Canceled,
        }
    }
}

impl FromStr for ReleaseTrigger {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manual" => Ok(Self::Manual),
            "expiry" => Ok(Self::Expiry),
            "override" => Ok(Self::Override),
            _ => Err(AppError::Validation(format!(
                "unknown release trigger '{value}'"
            ))),
        }
    }
}

/// Identifies the (group, subject) pair a restriction applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RestrictionKey {
    /// Group the subject belongs to.
    pub group_id: GroupId,
    /// Restricted member.
    pub subject_id: SubjectId,
}

impl RestrictionKey {
    /// Creates a key for one subject in one group.
    #[must_use]
    pub fn new(group_id: GroupId, subject_id: SubjectId) -> Self {
        Self {
            group_id,
            subject_id,
        }
    }
}

impl std::fmt::Display for RestrictionKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.group_id, self.subject_id)
    }
}

/// One temporary restriction and its restore data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    /// Synthetic store id.
    pub restriction_id: i64,
    /// Group the restriction applies in.
    pub group_id: GroupId,
    /// Restricted member.
    pub subject_id: SubjectId,
    /// Member who issued the restriction.
    pub actor_id: String,
    /// Optional free-text reason.
    pub reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Scheduled end timestamp.
    pub ends_at: DateTime<Utc>,
    /// Requested duration.
    pub duration: RestrictionDuration,
    /// Memberships removed at apply time.
    pub snapshot: MembershipSnapshot,
    /// Lifecycle status.
    pub status: RestrictionStatus,
    /// Release timestamp, set on termination.
    pub released_at: Option<DateTime<Utc>>,
    /// How the restriction ended.
    pub release_trigger: Option<ReleaseTrigger>,
    /// Member or system identity that ended the restriction.
    pub released_by: Option<String>,
    /// Optional release reason.
    pub release_reason: Option<String>,
    /// Number of successful restore runs.
    pub restore_count: i32,
}

impl Restriction {
    /// Returns the (group, subject) key of this restriction.
    #[must_use]
    pub fn key(&self) -> RestrictionKey {
        RestrictionKey::new(self.group_id.clone(), self.subject_id.clone())
    }

    /// Returns whether the restriction is still in force.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RestrictionStatus::Active
    }

    /// Returns the time left until the end time, zero when overdue.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> TimeDelta {
        (self.ends_at - now).max(TimeDelta::zero())
    }
}
