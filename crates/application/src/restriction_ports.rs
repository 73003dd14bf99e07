//! Ports consumed by restriction use-cases.

mod audit;
mod gateway;
mod inputs;
mod repository;

pub use audit::{AuditEvent, AuditRepository};
pub use gateway::MembershipGateway;
pub use inputs::{ApplyRestrictionInput, ReleaseRestrictionInput, RestrictionPolicy};
pub use repository::{NewRestriction, RestrictionRepository, TerminalUpdate};
