use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use warden_core::{ActorIdentity, AppResult};
use warden_domain::{AuthorizationDenial, Capability, MembershipId, SubjectId};

use crate::MembershipGateway;
use crate::call_budget::CallBudget;

/// Restriction command that needs authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedCommand<'a> {
    /// Restrict `subject_id` by granting `sentinel`.
    Apply {
        /// Member to restrict.
        subject_id: &'a SubjectId,
        /// Sentinel membership that will be granted.
        sentinel: &'a MembershipId,
    },
    /// Release `subject_id` early.
    Release {
        /// Member to release.
        subject_id: &'a SubjectId,
    },
    /// Administratively cancel the restriction on `subject_id`.
    Override {
        /// Member to release.
        subject_id: &'a SubjectId,
    },
    /// Read the active restriction of a member.
    Inspect,
}

impl<'a> GuardedCommand<'a> {
    fn name(self) -> &'static str {
        match self {
            Self::Apply { .. } => "apply",
            Self::Release { .. } => "release",
            Self::Override { .. } => "override",
            Self::Inspect => "inspect",
        }
    }

    fn subject_id(self) -> Option<&'a SubjectId> {
        match self {
            Self::Apply { subject_id, .. }
            | Self::Release { subject_id }
            | Self::Override { subject_id } => Some(subject_id),
            Self::Inspect => None,
        }
    }
}

/// Capability and hierarchy checks for restriction commands.
#[derive(Clone)]
pub struct AuthorizationGuard {
    gateway: Arc<dyn MembershipGateway>,
    budget: CallBudget,
}

impl AuthorizationGuard {
    /// Creates a guard that reads capabilities and ranks from the membership platform.
    #[must_use]
    pub fn new(gateway: Arc<dyn MembershipGateway>, call_timeout: Duration) -> Self {
        Self {
            gateway,
            budget: CallBudget::new(call_timeout),
        }
    }

    /// Authorizes a command, mapping a denial to `AppError::Forbidden`.
    pub async fn authorize(
        &self,
        actor: &ActorIdentity,
        command: GuardedCommand<'_>,
    ) -> AppResult<()> {
        self.evaluate(actor, command).await.map_err(|denial| {
            info!(
                actor_id = actor.actor_id(),
                group_id = %actor.group_id(),
                command = command.name(),
                reason = %denial,
                "restriction command denied"
            );
            denial.into()
        })
    }

    /// Evaluates a command and returns the specific denial reason.
    pub async fn evaluate(
        &self,
        actor: &ActorIdentity,
        command: GuardedCommand<'_>,
    ) -> Result<(), AuthorizationDenial> {
        let group_id = actor.group_id();
        let capabilities = self
            .lookup(
                "capability lookup",
                self.gateway.actor_capabilities(group_id, actor.actor_id()),
            )
            .await?;

        match command {
            GuardedCommand::Override { .. } => {
                if !capabilities.contains(&Capability::Administrator) {
                    return Err(AuthorizationDenial::AdministratorRequired);
                }
            }
            _ => {
                if !Capability::allows_restriction_management(&capabilities) {
                    return Err(AuthorizationDenial::InsufficientPrivilege);
                }
            }
        }

        let Some(subject_id) = command.subject_id() else {
            return Ok(());
        };

        let enforcer = self
            .lookup("enforcing identity lookup", self.gateway.enforcing_identity())
            .await?;
        let ranks = self
            .lookup("hierarchy lookup", self.gateway.hierarchy_ranks(group_id))
            .await?;
        let enforcer_memberships = self
            .lookup(
                "enforcing identity memberships lookup",
                self.gateway.list_memberships(group_id, &enforcer),
            )
            .await?;
        let subject_memberships = self
            .lookup(
                "subject memberships lookup",
                self.gateway.list_memberships(group_id, subject_id),
            )
            .await?;

        if !ranks.outranks(&enforcer_memberships, &subject_memberships) {
            return Err(AuthorizationDenial::SubjectNotOutranked);
        }

        if let GuardedCommand::Apply { sentinel, .. } = command {
            let Some(sentinel_rank) = ranks.rank_of(sentinel) else {
                return Err(AuthorizationDenial::LookupFailed(format!(
                    "sentinel membership '{sentinel}' is not part of the group"
                )));
            };
            if ranks.highest_among(&enforcer_memberships) <= Some(sentinel_rank) {
                return Err(AuthorizationDenial::SentinelNotOutranked);
            }
        }

        Ok(())
    }

    async fn lookup<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = AppResult<T>>,
    ) -> Result<T, AuthorizationDenial> {
        self.budget
            .membership(operation, call)
            .await
            .map_err(|error| AuthorizationDenial::LookupFailed(format!("{operation}: {error}")))
    }
}

#[cfg(test)]
mod tests;
