use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::{AppResult, GroupId};
use warden_domain::{
    MembershipSnapshot, ReleaseTrigger, Restriction, RestrictionDuration, RestrictionKey,
    SubjectId,
};

/// Insert payload for a new active restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRestriction {
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
    /// Memberships removed from the subject.
    pub snapshot: MembershipSnapshot,
}

/// Terminal transition payload for an active restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalUpdate {
    /// How the restriction ended.
    pub trigger: ReleaseTrigger,
    /// Member or system identity that ended it.
    pub released_by: String,
    /// Optional release reason.
    pub reason: Option<String>,
    /// Release timestamp.
    pub released_at: DateTime<Utc>,
}

/// Repository port for restriction records.
#[async_trait]
pub trait RestrictionRepository: Send + Sync {
    /// Returns whether the subject has an active restriction in the group.
    async fn has_active(&self, key: &RestrictionKey) -> AppResult<bool>;

    /// Inserts a new active restriction.
    ///
    /// Returns `AppError::Conflict` when an active restriction already exists for the key.
    async fn create_active(&self, restriction: NewRestriction) -> AppResult<Restriction>;

    /// Returns the active restriction for the key, if any.
    async fn find_active(&self, key: &RestrictionKey) -> AppResult<Option<Restriction>>;

    /// Lists every active restriction across groups.
    async fn list_active(&self) -> AppResult<Vec<Restriction>>;

    /// Moves an active restriction to the trigger's terminal status.
    ///
    /// Returns `None` when the record was no longer active, which leaves it untouched.
    async fn mark_terminal(
        &self,
        restriction_id: i64,
        update: TerminalUpdate,
    ) -> AppResult<Option<Restriction>>;

    /// Deletes terminal restrictions that ended before `cutoff`. Returns rows removed.
    async fn purge_terminal_ended_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
