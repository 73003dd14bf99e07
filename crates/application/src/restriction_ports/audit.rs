use async_trait::async_trait;
use warden_core::{AppResult, GroupId};
use warden_domain::AuditAction;

/// Immutable audit event payload emitted by restriction use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Group scope for the event.
    pub group_id: GroupId,
    /// Member or system identity that performed the action.
    pub actor_id: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional structured detail, encoded as JSON.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
