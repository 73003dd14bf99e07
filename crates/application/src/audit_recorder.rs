use std::sync::Arc;

use tracing::warn;

use crate::AuditRepository;
use crate::restriction_ports::AuditEvent;

/// Fire-and-forget audit writer.
///
/// Events are appended on a spawned task. A failed append is logged and never reaches the
/// restriction flow that produced it.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: Arc<dyn AuditRepository>,
}

impl AuditRecorder {
    /// Creates a recorder over an audit repository.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Schedules one audit event for persistence.
    pub fn record(&self, event: AuditEvent) {
        let repository = Arc::clone(&self.repository);
        tokio::spawn(async move {
            let action = event.action;
            let resource_id = event.resource_id.clone();
            if let Err(error) = repository.append_event(event).await {
                warn!(
                    action = action.as_str(),
                    resource_id = %resource_id,
                    error = %error,
                    "failed to append audit event"
                );
            }
        });
    }
}
