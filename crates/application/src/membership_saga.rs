use std::fmt::{Display, Formatter};

use tracing::warn;
use warden_core::{AppError, AppResult};
use warden_domain::{MembershipId, RestrictionKey};

use crate::MembershipGateway;
use crate::call_budget::CallBudget;

/// One membership mutation performed against the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MembershipStep {
    Revoke(MembershipId),
    Grant(MembershipId),
}

impl MembershipStep {
    fn compensation(&self) -> Self {
        match self {
            Self::Revoke(membership) => Self::Grant(membership.clone()),
            Self::Grant(membership) => Self::Revoke(membership.clone()),
        }
    }
}

impl Display for MembershipStep {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revoke(membership) => write!(formatter, "removing membership '{membership}'"),
            Self::Grant(membership) => write!(formatter, "adding membership '{membership}'"),
        }
    }
}

/// Outcome of undoing completed steps.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CompensationReport {
    pub(crate) undone: usize,
    pub(crate) failures: Vec<String>,
}

impl CompensationReport {
    pub(crate) fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A forward step failed and completed steps were undone.
#[derive(Debug)]
pub(crate) struct SagaFailure {
    pub(crate) error: AppError,
    pub(crate) compensation: CompensationReport,
}

/// Ordered membership mutations for one subject with reverse-order compensation.
pub(crate) struct MembershipSaga<'a> {
    gateway: &'a dyn MembershipGateway,
    budget: CallBudget,
    key: &'a RestrictionKey,
    journal: Vec<MembershipStep>,
}

impl<'a> MembershipSaga<'a> {
    pub(crate) fn new(
        gateway: &'a dyn MembershipGateway,
        budget: CallBudget,
        key: &'a RestrictionKey,
    ) -> Self {
        Self {
            gateway,
            budget,
            key,
            journal: Vec::new(),
        }
    }

    /// Runs every step in order. The first failure undoes the steps completed so far.
    pub(crate) async fn run(
        &mut self,
        steps: impl IntoIterator<Item = MembershipStep>,
    ) -> Result<(), SagaFailure> {
        for step in steps {
            if let Err(error) = self.execute(&step).await {
                let compensation = self.compensate().await;
                return Err(SagaFailure {
                    error: AppError::Transition(format!("{step} failed: {error}")),
                    compensation,
                });
            }
            self.journal.push(step);
        }

        Ok(())
    }

    /// Runs one step without journaling it. Used where a failure must abort the caller.
    pub(crate) async fn run_single(&self, step: MembershipStep) -> AppResult<()> {
        self.execute(&step)
            .await
            .map_err(|error| AppError::Transition(format!("{step} failed: {error}")))
    }

    /// Runs every step regardless of failures and returns the failed ones.
    pub(crate) async fn run_best_effort(
        &self,
        steps: impl IntoIterator<Item = MembershipStep>,
    ) -> Vec<String> {
        let mut failures = Vec::new();
        for step in steps {
            if let Err(error) = self.execute(&step).await {
                warn!(
                    subject = %self.key,
                    step = %step,
                    error = %error,
                    "membership step failed, continuing"
                );
                failures.push(format!("{step}: {error}"));
            }
        }

        failures
    }

    /// Undoes journaled steps in reverse order, attempting every one of them.
    pub(crate) async fn compensate(&mut self) -> CompensationReport {
        let mut report = CompensationReport::default();
        while let Some(step) = self.journal.pop() {
            let undo = step.compensation();
            match self.execute(&undo).await {
                Ok(()) => report.undone += 1,
                Err(error) => report.failures.push(format!("{undo}: {error}")),
            }
        }

        report
    }

    async fn execute(&self, step: &MembershipStep) -> AppResult<()> {
        let group_id = &self.key.group_id;
        let subject_id = &self.key.subject_id;
        match step {
            MembershipStep::Revoke(membership) => {
                self.budget
                    .membership(
                        "membership removal",
                        self.gateway
                            .remove_membership(group_id, subject_id, membership),
                    )
                    .await
            }
            MembershipStep::Grant(membership) => {
                self.budget
                    .membership(
                        "membership grant",
                        self.gateway.add_membership(group_id, subject_id, membership),
                    )
                    .await
            }
        }
    }
}
