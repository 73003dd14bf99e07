//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_membership_gateway;
mod postgres_audit_repository;
mod postgres_restriction_repository;

pub use http_membership_gateway::HttpMembershipGateway;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_restriction_repository::PostgresRestrictionRepository;
