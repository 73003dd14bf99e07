use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use warden_core::AppResult;
use warden_domain::RetentionHorizon;

use crate::call_budget::CallBudget;
use crate::{RestrictionPolicy, RestrictionRepository};

/// Result of one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweep {
    /// Terminal records that ended before this instant were deleted.
    pub cutoff: DateTime<Utc>,
    /// Number of records deleted.
    pub removed: u64,
}

/// Deletes terminal restrictions older than the retention horizon.
#[derive(Clone)]
pub struct RetentionJanitor {
    repository: Arc<dyn RestrictionRepository>,
    horizon: RetentionHorizon,
    budget: CallBudget,
}

impl RetentionJanitor {
    /// Creates a janitor over the restriction store.
    #[must_use]
    pub fn new(repository: Arc<dyn RestrictionRepository>, horizon: RetentionHorizon) -> Self {
        Self {
            repository,
            horizon,
            budget: CallBudget::new(RestrictionPolicy::DEFAULT_CALL_TIMEOUT),
        }
    }

    /// Overrides the deadline for each purge call.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.budget = CallBudget::new(call_timeout);
        self
    }

    /// Runs one sweep relative to the current time.
    pub async fn run_once(&self) -> AppResult<RetentionSweep> {
        self.run_at(Utc::now()).await
    }

    /// Runs one sweep relative to `now`. Active records are never deleted.
    pub async fn run_at(&self, now: DateTime<Utc>) -> AppResult<RetentionSweep> {
        let cutoff = self.horizon.cutoff(now);
        let removed = self
            .budget
            .store(
                "retention purge",
                self.repository.purge_terminal_ended_before(cutoff),
            )
            .await?;

        info!(
            removed,
            cutoff = %cutoff,
            retention_days = self.horizon.days(),
            "restriction retention sweep completed"
        );
        Ok(RetentionSweep { cutoff, removed })
    }

    /// Sweeps immediately and then once per `period`. A failed sweep is logged and the
    /// next tick retries.
    pub async fn run_periodically(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(error) = self.run_once().await {
                warn!(error = %error, "restriction retention sweep failed");
            }
        }
    }
}
