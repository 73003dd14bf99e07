use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;
use warden_core::{AppError, AppResult, GroupId};
use warden_domain::{RestrictionKey, SubjectId};

use super::{ExpiryHandler, ExpiryOutcome, ExpiryScheduler};

#[derive(Default)]
struct CountingHandler {
    fired: Mutex<Vec<(RestrictionKey, i64)>>,
    failures_left: AtomicU32,
}

impl CountingHandler {
    fn failing(times: u32) -> Self {
        Self {
            fired: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(times),
        }
    }

    async fn fired_ids(&self) -> Vec<i64> {
        self.fired
            .lock()
            .await
            .iter()
            .map(|(_, restriction_id)| *restriction_id)
            .collect()
    }
}

#[async_trait]
impl ExpiryHandler for CountingHandler {
    async fn on_expiry(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
    ) -> AppResult<ExpiryOutcome> {
        self.fired.lock().await.push((key, restriction_id));
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Transition("platform unavailable".to_owned()));
        }
        Ok(ExpiryOutcome::Restored)
    }
}

fn key(subject: &str) -> RestrictionKey {
    let (Ok(group_id), Ok(subject_id)) = (GroupId::new("group"), SubjectId::new(subject)) else {
        panic!("valid key");
    };
    RestrictionKey::new(group_id, subject_id)
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value * 60)
}

#[tokio::test(start_paused = true)]
async fn timer_fires_at_end_time() {
    let scheduler = ExpiryScheduler::new();
    let handler = Arc::new(CountingHandler::default());

    scheduler
        .arm(key("alice"), 7, Utc::now() + TimeDelta::minutes(10), handler.clone())
        .await;
    assert_eq!(scheduler.armed_restriction(&key("alice")).await, Some(7));

    tokio::time::sleep(minutes(9)).await;
    assert!(handler.fired_ids().await.is_empty());

    tokio::time::sleep(minutes(2)).await;
    assert_eq!(handler.fired_ids().await, vec![7]);
    assert_eq!(scheduler.armed_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn arming_again_replaces_previous_timer() {
    let scheduler = ExpiryScheduler::new();
    let handler = Arc::new(CountingHandler::default());

    scheduler
        .arm(key("alice"), 1, Utc::now() + TimeDelta::minutes(10), handler.clone())
        .await;
    scheduler
        .arm(key("alice"), 2, Utc::now() + TimeDelta::minutes(20), handler.clone())
        .await;
    assert_eq!(scheduler.armed_count().await, 1);

    tokio::time::sleep(minutes(15)).await;
    assert!(handler.fired_ids().await.is_empty());

    tokio::time::sleep(minutes(10)).await;
    assert_eq!(handler.fired_ids().await, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_never_fires() {
    let scheduler = ExpiryScheduler::new();
    let handler = Arc::new(CountingHandler::default());

    scheduler
        .arm(key("alice"), 3, Utc::now() + TimeDelta::minutes(1), handler.clone())
        .await;
    assert!(scheduler.cancel(&key("alice")).await);
    assert!(!scheduler.cancel(&key("alice")).await);

    tokio::time::sleep(minutes(5)).await;
    assert!(handler.fired_ids().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn overdue_timer_fires_immediately() {
    let scheduler = ExpiryScheduler::new();
    let handler = Arc::new(CountingHandler::default());

    scheduler
        .arm(key("alice"), 4, Utc::now() - TimeDelta::hours(3), handler.clone())
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(handler.fired_ids().await, vec![4]);
}

#[tokio::test(start_paused = true)]
async fn failed_expiry_is_retried_until_it_succeeds() {
    let scheduler = ExpiryScheduler::with_retry_policy(Duration::from_secs(60), 5);
    let handler = Arc::new(CountingHandler::failing(2));

    scheduler
        .arm(key("alice"), 5, Utc::now(), handler.clone())
        .await;
    tokio::time::sleep(minutes(10)).await;

    assert_eq!(handler.fired_ids().await, vec![5, 5, 5]);
    assert_eq!(scheduler.armed_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_attempt_limit() {
    let scheduler = ExpiryScheduler::with_retry_policy(Duration::from_secs(60), 3);
    let handler = Arc::new(CountingHandler::failing(u32::MAX));

    scheduler
        .arm(key("alice"), 6, Utc::now(), handler.clone())
        .await;
    tokio::time::sleep(minutes(30)).await;

    assert_eq!(handler.fired_ids().await.len(), 3);
    assert_eq!(scheduler.armed_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn timers_for_different_subjects_are_independent() {
    let scheduler = ExpiryScheduler::new();
    let handler = Arc::new(CountingHandler::default());

    scheduler
        .arm(key("alice"), 8, Utc::now() + TimeDelta::minutes(5), handler.clone())
        .await;
    scheduler
        .arm(key("bob"), 9, Utc::now() + TimeDelta::minutes(5), handler.clone())
        .await;
    scheduler.cancel(&key("alice")).await;

    tokio::time::sleep(minutes(6)).await;
    assert_eq!(handler.fired_ids().await, vec![9]);
}

#[tokio::test(start_paused = true)]
async fn retry_never_displaces_newer_timer_for_same_key() {
    let scheduler = ExpiryScheduler::new();
    let handler = Arc::new(CountingHandler::default());

    scheduler
        .arm(key("alice"), 2, Utc::now() + TimeDelta::minutes(10), handler.clone())
        .await;
    let armed = scheduler
        .rearm_if_unarmed(key("alice"), 1, 2, handler.clone())
        .await;

    assert!(!armed);
    assert_eq!(scheduler.armed_restriction(&key("alice")).await, Some(2));

    tokio::time::sleep(minutes(15)).await;
    assert_eq!(handler.fired_ids().await, vec![2]);
}

/// Fails its first expiry after arming a fresh restriction on the same key, the way a
/// moderator re-applying mid-expiry would.
struct ReapplyingHandler {
    scheduler: ExpiryScheduler,
    inner: Arc<CountingHandler>,
}

#[async_trait]
impl ExpiryHandler for ReapplyingHandler {
    async fn on_expiry(
        &self,
        key: RestrictionKey,
        restriction_id: i64,
    ) -> AppResult<ExpiryOutcome> {
        if restriction_id == 1 {
            self.inner.fired.lock().await.push((key.clone(), restriction_id));
            self.scheduler
                .arm(
                    key,
                    2,
                    Utc::now() + TimeDelta::minutes(30),
                    self.inner.clone(),
                )
                .await;
            return Err(AppError::Transition("platform unavailable".to_owned()));
        }
        self.inner.on_expiry(key, restriction_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn failed_expiry_yields_to_restriction_armed_while_it_ran() {
    let scheduler = ExpiryScheduler::with_retry_policy(Duration::from_secs(60), 5);
    let counting = Arc::new(CountingHandler::default());
    let handler = Arc::new(ReapplyingHandler {
        scheduler: scheduler.clone(),
        inner: counting.clone(),
    });

    scheduler
        .arm(key("alice"), 1, Utc::now(), handler)
        .await;
    tokio::time::sleep(minutes(5)).await;

    assert_eq!(counting.fired_ids().await, vec![1]);
    assert_eq!(scheduler.armed_restriction(&key("alice")).await, Some(2));

    tokio::time::sleep(minutes(30)).await;
    assert_eq!(counting.fired_ids().await, vec![1, 2]);
    assert_eq!(scheduler.armed_count().await, 0);
}
