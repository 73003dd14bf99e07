use std::sync::Arc;
use std::time::Duration;

use warden_core::AppError;
use warden_domain::AuthorizationDenial;

use super::{AuthorizationGuard, GuardedCommand};
use crate::test_support::{ADMIN, FakePlatform, MODERATOR, SENTINEL, actor, membership, subject};

fn guard(platform: Arc<FakePlatform>) -> AuthorizationGuard {
    AuthorizationGuard::new(platform, Duration::from_secs(5))
}

#[tokio::test]
async fn moderator_may_restrict_lower_ranked_subject() {
    let platform = Arc::new(FakePlatform::new());
    platform.give("alice", &["a", "c"]).await;
    let subject_id = subject("alice");
    let sentinel = membership(SENTINEL);

    let decision = guard(platform)
        .evaluate(
            &actor(MODERATOR),
            GuardedCommand::Apply {
                subject_id: &subject_id,
                sentinel: &sentinel,
            },
        )
        .await;

    assert_eq!(decision, Ok(()));
}

#[tokio::test]
async fn actor_without_capability_is_denied() {
    let platform = Arc::new(FakePlatform::new());
    platform.give("alice", &["a"]).await;
    let subject_id = subject("alice");

    let decision = guard(platform)
        .evaluate(
            &actor("random-member"),
            GuardedCommand::Release {
                subject_id: &subject_id,
            },
        )
        .await;

    assert_eq!(decision, Err(AuthorizationDenial::InsufficientPrivilege));
}

#[tokio::test]
async fn subject_ranked_at_enforcer_level_is_denied() {
    let platform = Arc::new(FakePlatform::new());
    platform.give("peer", &["bot-role"]).await;
    let subject_id = subject("peer");
    let sentinel = membership(SENTINEL);

    let decision = guard(platform)
        .evaluate(
            &actor(MODERATOR),
            GuardedCommand::Apply {
                subject_id: &subject_id,
                sentinel: &sentinel,
            },
        )
        .await;

    assert_eq!(decision, Err(AuthorizationDenial::SubjectNotOutranked));
}

#[tokio::test]
async fn sentinel_above_enforcer_is_denied_on_apply_only() {
    let platform = Arc::new(FakePlatform::new());
    platform.give("alice", &["a"]).await;
    platform.set_rank(SENTINEL, 150).await;
    let guard = guard(platform);
    let subject_id = subject("alice");
    let sentinel = membership(SENTINEL);

    let apply = guard
        .evaluate(
            &actor(MODERATOR),
            GuardedCommand::Apply {
                subject_id: &subject_id,
                sentinel: &sentinel,
            },
        )
        .await;
    let release = guard
        .evaluate(
            &actor(MODERATOR),
            GuardedCommand::Release {
                subject_id: &subject_id,
            },
        )
        .await;

    assert_eq!(apply, Err(AuthorizationDenial::SentinelNotOutranked));
    assert_eq!(release, Ok(()));
}

#[tokio::test]
async fn sentinel_missing_from_hierarchy_is_lookup_failure() {
    let platform = Arc::new(FakePlatform::new());
    platform.give("alice", &["a"]).await;
    let subject_id = subject("alice");
    let sentinel = membership("deleted-role");

    let decision = guard(platform)
        .evaluate(
            &actor(MODERATOR),
            GuardedCommand::Apply {
                subject_id: &subject_id,
                sentinel: &sentinel,
            },
        )
        .await;

    assert!(matches!(decision, Err(AuthorizationDenial::LookupFailed(detail)) if detail.contains("deleted-role")));
}

#[tokio::test]
async fn lookup_error_denies_instead_of_allowing() {
    let platform = Arc::new(FakePlatform::new());
    platform.fail_lookups();
    let subject_id = subject("alice");

    let result = guard(platform)
        .authorize(
            &actor(ADMIN),
            GuardedCommand::Override {
                subject_id: &subject_id,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(message)) if message.contains("lookup failed")));
}

#[tokio::test]
async fn override_requires_administrator() {
    let platform = Arc::new(FakePlatform::new());
    platform.give("alice", &["a"]).await;
    let guard = guard(platform);
    let subject_id = subject("alice");

    let moderator = guard
        .evaluate(
            &actor(MODERATOR),
            GuardedCommand::Override {
                subject_id: &subject_id,
            },
        )
        .await;
    let admin = guard
        .evaluate(
            &actor(ADMIN),
            GuardedCommand::Override {
                subject_id: &subject_id,
            },
        )
        .await;

    assert_eq!(moderator, Err(AuthorizationDenial::AdministratorRequired));
    assert_eq!(admin, Ok(()));
}

#[tokio::test]
async fn inspect_only_checks_capability() {
    let platform = Arc::new(FakePlatform::new());

    let decision = guard(platform)
        .evaluate(&actor(MODERATOR), GuardedCommand::Inspect)
        .await;

    assert_eq!(decision, Ok(()));
}
