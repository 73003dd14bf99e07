//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_recorder;
mod authorization_guard;
mod call_budget;
mod expiry_scheduler;
mod membership_saga;
mod restriction_ports;
mod restriction_service;
mod retention_janitor;
mod subject_locks;

#[cfg(test)]
mod test_support;

pub use audit_recorder::AuditRecorder;
pub use authorization_guard::{AuthorizationGuard, GuardedCommand};
pub use expiry_scheduler::{
    EXPIRY_RETRY_DELAY, ExpiryHandler, ExpiryOutcome, ExpiryScheduler, MAX_EXPIRY_ATTEMPTS,
};
pub use restriction_ports::{
    ApplyRestrictionInput, AuditEvent, AuditRepository, MembershipGateway, NewRestriction,
    ReleaseRestrictionInput, RestrictionPolicy, RestrictionRepository, TerminalUpdate,
};
pub use restriction_service::{EXPIRY_ACTOR_ID, RecoveryReport, RestrictionService};
pub use retention_janitor::{RetentionJanitor, RetentionSweep};
pub use subject_locks::SubjectLocks;
