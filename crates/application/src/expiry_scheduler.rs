//! In-process expiry timers for active restrictions.
//!
//! Each (group, subject) key holds at most one armed timer. Arming a key again replaces
//! the previous timer, and a fired timer only acts if it still owns its table entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use warden_core::AppResult;
use warden_domain::RestrictionKey;

/// Delay between attempts after a failed expiry.
pub const EXPIRY_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Attempts made for one expiry before it is left for manual action.
pub const MAX_EXPIRY_ATTEMPTS: u32 = 5;

/// Result of handling one fired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The restriction was restored and closed.
    Restored,
    /// The armed restriction was no longer active when the timer fired.
    AlreadyReleased,
}

/// Callback invoked when an armed timer fires.
#[async_trait]
pub trait ExpiryHandler: Send + Sync {
    /// Ends the armed restriction if it is still active.
    async fn on_expiry(&self, key: RestrictionKey, restriction_id: i64)
    -> AppResult<ExpiryOutcome>;
}

/// Timer slot currently owned by one key.
struct ArmedExpiry {
    generation: u64,
    restriction_id: i64,
    task: JoinHandle<()>,
}

struct SchedulerState {
    handles: Mutex<HashMap<RestrictionKey, ArmedExpiry>>,
    next_generation: AtomicU64,
    retry_delay: Duration,
    max_attempts: u32,
}

/// Handle table of armed expiry timers.
#[derive(Clone)]
pub struct ExpiryScheduler {
    state: Arc<SchedulerState>,
}

impl Default for ExpiryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiryScheduler {
    /// Creates a scheduler with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retry_policy(EXPIRY_RETRY_DELAY, MAX_EXPIRY_ATTEMPTS)
    }

    /// Creates a scheduler with a custom retry delay and attempt limit.
    #[must_use]
    pub fn with_retry_policy(retry_delay: Duration, max_attempts: u32) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                handles: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                retry_delay,
                max_attempts: max_attempts.max(1),
            }),
        }
    }

    /// Arms a timer for `key` that fires at `ends_at`, replacing any armed timer.
    ///
    /// A deadline in the past fires immediately.
    pub async fn arm(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
        ends_at: DateTime<Utc>,
        handler: Arc<dyn ExpiryHandler>,
    ) {
        let delay = (ends_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.arm_after(key, restriction_id, delay, 1, handler).await;
    }

    /// Cancels the armed timer for `key`. Returns whether one was armed.
    pub async fn cancel(&self, key: &RestrictionKey) -> bool {
        let removed = self.state.handles.lock().await.remove(key);
        match removed {
            Some(armed) => {
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    /// Returns the restriction id armed for `key`, if any.
    pub async fn armed_restriction(&self, key: &RestrictionKey) -> Option<i64> {
        self.state
            .handles
            .lock()
            .await
            .get(key)
            .map(|armed| armed.restriction_id)
    }

    /// Returns the number of armed timers.
    pub async fn armed_count(&self) -> usize {
        self.state.handles.lock().await.len()
    }

    async fn arm_after(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
        delay: Duration,
        attempt: u32,
        handler: Arc<dyn ExpiryHandler>,
    ) {
        self.install(key, restriction_id, delay, attempt, handler, true)
            .await;
    }

    /// Re-arms a failed expiry unless the key was armed again after the failed timer
    /// claimed its entry. Returns whether the retry was armed.
    async fn rearm_if_unarmed(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
        attempt: u32,
        handler: Arc<dyn ExpiryHandler>,
    ) -> bool {
        self.install(
            key,
            restriction_id,
            self.state.retry_delay,
            attempt,
            handler,
            false,
        )
        .await
    }

    /// Inserts a timer for `key`. The occupancy check and the insert share one lock
    /// guard, so a retry can never displace a timer armed for a newer restriction.
    async fn install(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
        delay: Duration,
        attempt: u32,
        handler: Arc<dyn ExpiryHandler>,
        replace_armed: bool,
    ) -> bool {
        let mut handles = self.state.handles.lock().await;
        if !replace_armed && handles.contains_key(&key) {
            return false;
        }

        let generation = self.state.next_generation.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;
        let task = self.spawn_timer(
            key.clone(),
            restriction_id,
            generation,
            deadline,
            attempt,
            handler,
        );

        if let Some(previous) = handles.insert(
            key,
            ArmedExpiry {
                generation,
                restriction_id,
                task,
            },
        ) {
            previous.task.abort();
        }
        true
    }

    fn spawn_timer(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
        generation: u64,
        deadline: Instant,
        attempt: u32,
        handler: Arc<dyn ExpiryHandler>,
    ) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            scheduler
                .fire(key, restriction_id, generation, attempt, handler)
                .await;
        })
    }

    /// Removes the table entry if `generation` still owns it.
    async fn claim(&self, key: &RestrictionKey, generation: u64) -> bool {
        let mut handles = self.state.handles.lock().await;
        match handles.get(key) {
            Some(armed) if armed.generation == generation => {
                handles.remove(key);
                true
            }
            _ => false,
        }
    }

    async fn fire(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
        generation: u64,
        attempt: u32,
        handler: Arc<dyn ExpiryHandler>,
    ) {
        if !self.claim(&key, generation).await {
            return;
        }

        match handler.on_expiry(key.clone(), restriction_id).await {
            Ok(ExpiryOutcome::Restored) => {
                info!(subject = %key, restriction_id, "restriction expired");
            }
            Ok(ExpiryOutcome::AlreadyReleased) => {
                debug!(
                    subject = %key,
                    restriction_id,
                    "expiry fired for restriction that is no longer active"
                );
            }
            Err(error) if attempt < self.state.max_attempts => {
                warn!(
                    subject = %key,
                    restriction_id,
                    attempt,
                    error = %error,
                    "expiry failed, retrying"
                );
                let retry_key = key.clone();
                if !self
                    .rearm_if_unarmed(key, restriction_id, attempt + 1, handler)
                    .await
                {
                    debug!(
                        subject = %retry_key,
                        restriction_id,
                        "expiry retry dropped, key was armed for a newer restriction"
                    );
                }
            }
            Err(error) => {
                error!(
                    subject = %key,
                    restriction_id,
                    attempts = attempt,
                    error = %error,
                    "expiry failed permanently, release the subject manually"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
