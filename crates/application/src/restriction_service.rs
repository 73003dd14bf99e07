//! Restriction lifecycle use-cases: apply, release, override, expiry and recovery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use warden_core::{ActorIdentity, AppError, AppResult};
use warden_domain::{
    AuditAction, MembershipSnapshot, ReleaseTrigger, Restriction, RestrictionDuration,
    RestrictionKey, SubjectId,
};

use crate::audit_recorder::AuditRecorder;
use crate::authorization_guard::{AuthorizationGuard, GuardedCommand};
use crate::call_budget::CallBudget;
use crate::expiry_scheduler::{ExpiryHandler, ExpiryOutcome, ExpiryScheduler};
use crate::membership_saga::{CompensationReport, MembershipSaga, MembershipStep};
use crate::subject_locks::SubjectLocks;
use crate::{
    ApplyRestrictionInput, AuditEvent, AuditRepository, MembershipGateway, NewRestriction,
    ReleaseRestrictionInput, RestrictionPolicy, RestrictionRepository, TerminalUpdate,
};

mod apply;
mod recovery;
mod release;

pub use recovery::RecoveryReport;

/// Identity recorded as the releasing actor for automatic expiry.
pub const EXPIRY_ACTOR_ID: &str = "system:expiry";

const REPAIR_NOTE: &str = "compensation incomplete, manual repair required";

/// Application service for the temporary restriction lifecycle.
#[derive(Clone)]
pub struct RestrictionService {
    gateway: Arc<dyn MembershipGateway>,
    repository: Arc<dyn RestrictionRepository>,
    guard: AuthorizationGuard,
    audit: AuditRecorder,
    scheduler: ExpiryScheduler,
    locks: SubjectLocks,
    policy: RestrictionPolicy,
    budget: CallBudget,
}

impl RestrictionService {
    /// Creates a restriction service.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn MembershipGateway>,
        repository: Arc<dyn RestrictionRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        scheduler: ExpiryScheduler,
        policy: RestrictionPolicy,
    ) -> Self {
        Self {
            guard: AuthorizationGuard::new(Arc::clone(&gateway), policy.call_timeout),
            gateway,
            repository,
            audit: AuditRecorder::new(audit_repository),
            scheduler,
            locks: SubjectLocks::new(),
            budget: CallBudget::new(policy.call_timeout),
            policy,
        }
    }

    /// Returns the number of armed expiry timers.
    pub async fn armed_expiry_count(&self) -> usize {
        self.scheduler.armed_count().await
    }

    fn expiry_handler(&self) -> Arc<dyn ExpiryHandler> {
        Arc::new(self.clone())
    }

    async fn load_active(&self, key: &RestrictionKey) -> AppResult<Option<Restriction>> {
        self.budget
            .store(
                "active restriction lookup",
                self.repository.find_active(key),
            )
            .await
    }

    /// Restore sequence shared by release, override and expiry. The caller holds the
    /// subject lock.
    async fn restore_locked(
        &self,
        active: Restriction,
        trigger: ReleaseTrigger,
        released_by: &str,
        reason: Option<String>,
    ) -> AppResult<Restriction> {
        let key = active.key();
        let saga = MembershipSaga::new(self.gateway.as_ref(), self.budget, &key);

        saga.run_single(MembershipStep::Revoke(
            self.policy.sentinel_membership.clone(),
        ))
        .await?;

        let regrant_failures = saga
            .run_best_effort(
                active
                    .snapshot
                    .as_slice()
                    .iter()
                    .cloned()
                    .map(MembershipStep::Grant),
            )
            .await;

        let update = TerminalUpdate {
            trigger,
            released_by: released_by.to_owned(),
            reason,
            released_at: Utc::now(),
        };
        let closed = self
            .budget
            .store(
                "restriction close",
                self.repository.mark_terminal(active.restriction_id, update),
            )
            .await?;
        self.scheduler.cancel(&key).await;

        let Some(closed) = closed else {
            debug!(
                subject = %key,
                restriction_id = active.restriction_id,
                "restriction was already closed by a concurrent restore"
            );
            return Err(nothing_to_restore(&key.subject_id));
        };

        if !regrant_failures.is_empty() {
            warn!(
                subject = %key,
                restriction_id = closed.restriction_id,
                failures = ?regrant_failures,
                "restriction closed with memberships that could not be re-granted"
            );
        }
        info!(
            subject = %key,
            restriction_id = closed.restriction_id,
            trigger = trigger.as_str(),
            status = closed.status.as_str(),
            "restriction ended"
        );

        let action = match trigger {
            ReleaseTrigger::Manual => AuditAction::RestrictionReleased,
            ReleaseTrigger::Expiry => AuditAction::RestrictionExpired,
            ReleaseTrigger::Override => AuditAction::RestrictionCanceled,
        };
        self.record(
            released_by,
            action,
            &closed,
            json!({
                "trigger": trigger.as_str(),
                "status": closed.status.as_str(),
                "restored_memberships": closed.snapshot.to_strings(),
                "regrant_failures": regrant_failures,
                "reason": closed.release_reason,
            }),
        );

        Ok(closed)
    }

    /// Logs a rolled-back transition and escalates when the rollback was incomplete.
    fn after_compensation(
        &self,
        actor: &ActorIdentity,
        key: &RestrictionKey,
        snapshot: &MembershipSnapshot,
        error: AppError,
        report: &CompensationReport,
    ) -> AppError {
        if report.is_clean() {
            warn!(
                subject = %key,
                undone = report.undone,
                error = %error,
                "restriction apply rolled back"
            );
            return error;
        }

        error!(
            subject = %key,
            snapshot = ?snapshot.to_strings(),
            failed_compensations = ?report.failures,
            error = %error,
            "restriction apply rollback incomplete, manual repair required"
        );
        self.audit.record(AuditEvent {
            group_id: key.group_id.clone(),
            actor_id: actor.actor_id().to_owned(),
            action: AuditAction::RestrictionCompensationFailed,
            resource_type: "restriction".to_owned(),
            resource_id: key.subject_id.to_string(),
            detail: Some(
                json!({
                    "snapshot": snapshot.to_strings(),
                    "failed_compensations": report.failures,
                    "error": error.to_string(),
                })
                .to_string(),
            ),
        });

        with_repair_note(error)
    }

    fn record(&self, actor_id: &str, action: AuditAction, restriction: &Restriction, detail: Value) {
        self.audit.record(AuditEvent {
            group_id: restriction.group_id.clone(),
            actor_id: actor_id.to_owned(),
            action,
            resource_type: "restriction".to_owned(),
            resource_id: restriction.restriction_id.to_string(),
            detail: Some(detail.to_string()),
        });
    }
}

#[async_trait]
impl ExpiryHandler for RestrictionService {
    async fn on_expiry(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
    ) -> AppResult<ExpiryOutcome> {
        self.expire_restriction(&key, restriction_id).await
    }
}

fn normalize_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn nothing_to_restore(subject_id: &SubjectId) -> AppError {
    AppError::NotFound(format!(
        "nothing to restore: subject '{subject_id}' has no active restriction"
    ))
}

fn with_repair_note(error: AppError) -> AppError {
    match error {
        AppError::Transition(message) => AppError::Transition(format!("{message}; {REPAIR_NOTE}")),
        AppError::Persistence(message) => {
            AppError::Persistence(format!("{message}; {REPAIR_NOTE}"))
        }
        AppError::Conflict(message) => AppError::Conflict(format!("{message}; {REPAIR_NOTE}")),
        other => AppError::Internal(format!("{other}; {REPAIR_NOTE}")),
    }
}
