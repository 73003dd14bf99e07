use std::time::Duration;

use warden_domain::MembershipId;

/// Input payload for restricting a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRestrictionInput {
    /// Member to restrict.
    pub subject_id: String,
    /// Requested length in minutes.
    pub duration_minutes: i64,
    /// Optional free-text reason.
    pub reason: Option<String>,
}

/// Input payload for manual release and administrative override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRestrictionInput {
    /// Member to release.
    pub subject_id: String,
    /// Optional free-text reason.
    pub reason: Option<String>,
}

/// Deployment-level settings for the restriction lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionPolicy {
    /// Membership granted while a subject is restricted.
    pub sentinel_membership: MembershipId,
    /// Upper bound for every remote call.
    pub call_timeout: Duration,
}

impl RestrictionPolicy {
    /// Default upper bound for one remote call.
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a policy with the default call timeout.
    #[must_use]
    pub fn new(sentinel_membership: MembershipId) -> Self {
        Self {
            sentinel_membership,
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Overrides the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}
