//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod membership;
mod restriction;
mod retention;
mod security;

pub use membership::{HierarchyRanks, MembershipId, MembershipSnapshot, SubjectId};
pub use restriction::{
    MAX_RESTRICTION_MINUTES, ReleaseTrigger, Restriction, RestrictionDuration, RestrictionKey,
    RestrictionStatus,
};
pub use retention::{DEFAULT_RETENTION_DAYS, RetentionHorizon};
pub use security::{AuditAction, AuthorizationDenial, Capability};
