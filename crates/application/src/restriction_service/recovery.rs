use super::*;

/// Result of re-arming expiry timers after a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Timers armed from active records.
    pub rearmed: usize,
    /// Records whose end time had already passed. These fire immediately.
    pub overdue: usize,
}

impl RestrictionService {
    /// Re-arms an expiry timer for every active restriction in the store.
    ///
    /// Timers live in process memory only, so this runs once at startup.
    pub async fn recover_expiries(&self) -> AppResult<RecoveryReport> {
        let active = self
            .budget
            .store(
                "active restriction listing",
                self.repository.list_active(),
            )
            .await?;

        let now = Utc::now();
        let mut report = RecoveryReport::default();
        for restriction in active {
            if restriction.ends_at <= now {
                report.overdue += 1;
            }
            self.scheduler
                .arm(
                    restriction.key(),
                    restriction.restriction_id,
                    restriction.ends_at,
                    self.expiry_handler(),
                )
                .await;
            report.rearmed += 1;
        }

        info!(
            rearmed = report.rearmed,
            overdue = report.overdue,
            "expiry timers recovered"
        );
        Ok(report)
    }
}
