use async_trait::async_trait;
use warden_core::{AppResult, GroupId};
use warden_domain::{Capability, HierarchyRanks, MembershipId, SubjectId};

/// Port to the platform that owns group memberships.
///
/// Every call is a remote operation and may fail independently. Callers bound each call
/// with their own timeout.
#[async_trait]
pub trait MembershipGateway: Send + Sync {
    /// Grants one membership to a member.
    async fn add_membership(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> AppResult<()>;

    /// Revokes one membership from a member.
    async fn remove_membership(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> AppResult<()>;

    /// Lists memberships currently held by a member.
    async fn list_memberships(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
    ) -> AppResult<Vec<MembershipId>>;

    /// Returns the rank of every membership in the group.
    async fn hierarchy_ranks(&self, group_id: &GroupId) -> AppResult<HierarchyRanks>;

    /// Returns the member id the service acts as.
    async fn enforcing_identity(&self) -> AppResult<SubjectId>;

    /// Returns capabilities an actor holds in the group.
    async fn actor_capabilities(
        &self,
        group_id: &GroupId,
        actor_id: &str,
    ) -> AppResult<Vec<Capability>>;
}
