use chrono::{DateTime, TimeDelta, Utc};

/// Default number of days terminal restrictions are kept.
pub const DEFAULT_RETENTION_DAYS: u16 = 30;

/// How long terminal restrictions are kept before the janitor deletes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionHorizon {
    days: u16,
}

impl RetentionHorizon {
    /// Creates a horizon, clamping values below one day up to one day.
    #[must_use]
    pub fn from_days(days: i64) -> Self {
        let days = u16::try_from(days.max(1)).unwrap_or(u16::MAX);
        Self { days }
    }

    /// Returns the horizon in days.
    #[must_use]
    pub fn days(&self) -> u16 {
        self.days
    }

    /// Returns the cutoff before which terminal records are purged.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::days(i64::from(self.days))
    }
}

impl Default for RetentionHorizon {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}
