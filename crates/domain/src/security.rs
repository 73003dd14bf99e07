use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use warden_core::AppError;

/// Group-level capabilities that allow an actor to manage restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Full administrative control of the group.
    Administrator,
    /// Allows granting and revoking memberships of other members.
    ManageMemberships,
}

impl Capability {
    /// Returns a stable value for this capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::ManageMemberships => "manage_memberships",
        }
    }

    /// Returns whether the capability set allows applying and releasing restrictions.
    #[must_use]
    pub fn allows_restriction_management(capabilities: &[Self]) -> bool {
        capabilities
            .iter()
            .any(|capability| matches!(capability, Self::Administrator | Self::ManageMemberships))
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "administrator" => Ok(Self::Administrator),
            "manage_memberships" => Ok(Self::ManageMemberships),
            _ => Err(AppError::Validation(format!(
                "unknown capability value '{value}'"
            ))),
        }
    }
}

/// Specific reason an authorization check refused a restriction command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDenial {
    /// Actor holds neither administrator nor membership-management capability.
    InsufficientPrivilege,
    /// Override requires the administrator capability.
    AdministratorRequired,
    /// The enforcing identity does not strictly outrank the subject.
    SubjectNotOutranked,
    /// The enforcing identity does not strictly outrank the sentinel membership.
    SentinelNotOutranked,
    /// Hierarchy or capability data could not be resolved.
    LookupFailed(String),
}

impl Display for AuthorizationDenial {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientPrivilege => formatter
                .write_str("administrator or manage memberships capability is required"),
            Self::AdministratorRequired => {
                formatter.write_str("administrator capability is required")
            }
            Self::SubjectNotOutranked => formatter
                .write_str("enforcing identity does not outrank the subject in the hierarchy"),
            Self::SentinelNotOutranked => formatter.write_str(
                "sentinel membership ranks at or above the enforcing identity; move it lower",
            ),
            Self::LookupFailed(detail) => write!(formatter, "hierarchy lookup failed: {detail}"),
        }
    }
}

impl From<AuthorizationDenial> for AppError {
    fn from(value: AuthorizationDenial) -> Self {
        Self::Forbidden(value.to_string())
    }
}

/// Stable audit actions emitted by restriction use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A subject was restricted.
    RestrictionApplied,
    /// An actor released a subject.
    RestrictionReleased,
    /// The scheduler released a subject at the end time.
    RestrictionExpired,
    /// An administrator overrode a restriction.
    RestrictionCanceled,
    /// Compensation after a failed transition did not fully succeed.
    RestrictionCompensationFailed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RestrictionApplied => "restriction.applied",
            Self::RestrictionReleased => "restriction.released",
            Self::RestrictionExpired => "restriction.expired",
            Self::RestrictionCanceled => "restriction.canceled",
            Self::RestrictionCompensationFailed => "restriction.compensation_failed",
        }
    }
}
