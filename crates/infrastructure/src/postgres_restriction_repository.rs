use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use warden_application::{NewRestriction, RestrictionRepository, TerminalUpdate};
use warden_core::{AppError, AppResult, GroupId};
use warden_domain::{
    MembershipId, MembershipSnapshot, ReleaseTrigger, Restriction, RestrictionDuration,
    RestrictionKey, RestrictionStatus, SubjectId,
};

/// PostgreSQL-backed restriction record store.
#[derive(Clone)]
pub struct PostgresRestrictionRepository {
    pool: PgPool,
}

impl PostgresRestrictionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RestrictionRow {
    id: i64,
    group_id: String,
    subject_id: String,
    actor_id: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    duration_minutes: i32,
    memberships_removed: Json<Vec<String>>,
    status: String,
    released_at: Option<DateTime<Utc>>,
    release_trigger: Option<String>,
    released_by: Option<String>,
    release_reason: Option<String>,
    restore_count: i32,
}

impl TryFrom<RestrictionRow> for Restriction {
    type Error = AppError;

    fn try_from(row: RestrictionRow) -> Result<Self, Self::Error> {
        let snapshot = row
            .memberships_removed
            .0
            .into_iter()
            .map(MembershipId::new)
            .collect::<AppResult<Vec<_>>>()
            .map_err(|error| corrupt_row(row.id, error))?;

        Ok(Self {
            restriction_id: row.id,
            group_id: GroupId::new(row.group_id).map_err(|error| corrupt_row(row.id, error))?,
            subject_id: SubjectId::new(row.subject_id)
                .map_err(|error| corrupt_row(row.id, error))?,
            actor_id: row.actor_id,
            reason: row.reason,
            created_at: row.created_at,
            ends_at: row.ends_at,
            duration: RestrictionDuration::from_minutes(i64::from(row.duration_minutes))
                .map_err(|error| corrupt_row(row.id, error))?,
            snapshot: MembershipSnapshot::from_stored(snapshot),
            status: row
                .status
                .parse::<RestrictionStatus>()
                .map_err(|error| corrupt_row(row.id, error))?,
            released_at: row.released_at,
            release_trigger: row
                .release_trigger
                .as_deref()
                .map(str::parse::<ReleaseTrigger>)
                .transpose()
                .map_err(|error| corrupt_row(row.id, error))?,
            released_by: row.released_by,
            release_reason: row.release_reason,
            restore_count: row.restore_count,
        })
    }
}

fn corrupt_row(restriction_id: i64, error: AppError) -> AppError {
    AppError::Internal(format!(
        "stored restriction {restriction_id} is invalid: {error}"
    ))
}

fn collect_restrictions(rows: Vec<RestrictionRow>) -> AppResult<Vec<Restriction>> {
    rows.into_iter().map(Restriction::try_from).collect()
}

#[async_trait]
impl RestrictionRepository for PostgresRestrictionRepository {
    async fn has_active(&self, key: &RestrictionKey) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM restrictions
                WHERE group_id = $1 AND subject_id = $2 AND status = 'active'
            )
            "#,
        )
        .bind(key.group_id.as_str())
        .bind(key.subject_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to check active restriction for '{key}': {error}"
            ))
        })
    }

    async fn create_active(&self, restriction: NewRestriction) -> AppResult<Restriction> {
        let duration_minutes = i32::try_from(restriction.duration.as_minutes()).map_err(|_| {
            AppError::Validation("restriction duration does not fit storage".to_owned())
        })?;

        let row = sqlx::query_as::<_, RestrictionRow>(
            r#"
            INSERT INTO restrictions (
                group_id,
                subject_id,
                actor_id,
                reason,
                created_at,
                ends_at,
                duration_minutes,
                memberships_removed,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active')
            RETURNING
                id, group_id, subject_id, actor_id, reason, created_at, ends_at,
                duration_minutes, memberships_removed, status, released_at,
                release_trigger, released_by, release_reason, restore_count
            "#,
        )
        .bind(restriction.group_id.as_str())
        .bind(restriction.subject_id.as_str())
        .bind(restriction.actor_id.as_str())
        .bind(restriction.reason.as_deref())
        .bind(restriction.created_at)
        .bind(restriction.ends_at)
        .bind(duration_minutes)
        .bind(Json(restriction.snapshot.to_strings()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23505")
            {
                return AppError::Conflict(format!(
                    "subject '{}' already has an active restriction in group '{}'",
                    restriction.subject_id, restriction.group_id
                ));
            }

            AppError::Persistence(format!("failed to insert restriction: {error}"))
        })?;

        Restriction::try_from(row)
    }

    async fn find_active(&self, key: &RestrictionKey) -> AppResult<Option<Restriction>> {
        let row = sqlx::query_as::<_, RestrictionRow>(
            r#"
            SELECT
                id, group_id, subject_id, actor_id, reason, created_at, ends_at,
                duration_minutes, memberships_removed, status, released_at,
                release_trigger, released_by, release_reason, restore_count
            FROM restrictions
            WHERE group_id = $1 AND subject_id = $2 AND status = 'active'
            "#,
        )
        .bind(key.group_id.as_str())
        .bind(key.subject_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to load active restriction for '{key}': {error}"
            ))
        })?;

        row.map(Restriction::try_from).transpose()
    }

    async fn list_active(&self) -> AppResult<Vec<Restriction>> {
        let rows = sqlx::query_as::<_, RestrictionRow>(
            r#"
            SELECT
                id, group_id, subject_id, actor_id, reason, created_at, ends_at,
                duration_minutes, memberships_removed, status, released_at,
                release_trigger, released_by, release_reason, restore_count
            FROM restrictions
            WHERE status = 'active'
            ORDER BY ends_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to list active restrictions: {error}"))
        })?;

        collect_restrictions(rows)
    }

    async fn mark_terminal(
        &self,
        restriction_id: i64,
        update: TerminalUpdate,
    ) -> AppResult<Option<Restriction>> {
        let row = sqlx::query_as::<_, RestrictionRow>(
            r#"
            UPDATE restrictions
            SET
                status = $2,
                released_at = $3,
                release_trigger = $4,
                released_by = $5,
                release_reason = $6,
                restore_count = restore_count + 1
            WHERE id = $1 AND status = 'active'
            RETURNING
                id, group_id, subject_id, actor_id, reason, created_at, ends_at,
                duration_minutes, memberships_removed, status, released_at,
                release_trigger, released_by, release_reason, restore_count
            "#,
        )
        .bind(restriction_id)
        .bind(update.trigger.terminal_status().as_str())
        .bind(update.released_at)
        .bind(update.trigger.as_str())
        .bind(update.released_by.as_str())
        .bind(update.reason.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to close restriction {restriction_id}: {error}"
            ))
        })?;

        row.map(Restriction::try_from).transpose()
    }

    async fn purge_terminal_ended_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM restrictions
            WHERE status <> 'active' AND ends_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to purge ended restrictions: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
