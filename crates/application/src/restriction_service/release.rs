use super::*;

impl RestrictionService {
    /// Releases a member early and restores the memberships removed at apply time.
    pub async fn release_restriction(
        &self,
        actor: &ActorIdentity,
        input: ReleaseRestrictionInput,
    ) -> AppResult<Restriction> {
        self.end_restriction(actor, input, ReleaseTrigger::Manual)
            .await
    }

    /// Administratively cancels a restriction. The record ends as `canceled`.
    pub async fn cancel_restriction(
        &self,
        actor: &ActorIdentity,
        input: ReleaseRestrictionInput,
    ) -> AppResult<Restriction> {
        self.end_restriction(actor, input, ReleaseTrigger::Override)
            .await
    }

    /// Returns the active restriction of a member.
    pub async fn get_active_restriction(
        &self,
        actor: &ActorIdentity,
        subject_id: &str,
    ) -> AppResult<Restriction> {
        let subject_id = SubjectId::new(subject_id)?;
        self.guard
            .authorize(actor, GuardedCommand::Inspect)
            .await?;

        let key = RestrictionKey::new(actor.group_id().clone(), subject_id);
        self.load_active(&key).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "subject '{}' has no active restriction",
                key.subject_id
            ))
        })
    }

    /// Ends restriction `restriction_id` at its end time if it is still the active one.
    pub async fn expire_restriction(
        &self,
        key: &RestrictionKey,
        restriction_id: i64,
    ) -> AppResult<ExpiryOutcome> {
        let _subject_guard = self.locks.acquire(key).await;

        let active = self
            .load_active(key)
            .await?
            .filter(|restriction| restriction.restriction_id == restriction_id);
        let Some(active) = active else {
            return Ok(ExpiryOutcome::AlreadyReleased);
        };

        match self
            .restore_locked(active, ReleaseTrigger::Expiry, EXPIRY_ACTOR_ID, None)
            .await
        {
            Ok(_) => Ok(ExpiryOutcome::Restored),
            Err(AppError::NotFound(_)) => Ok(ExpiryOutcome::AlreadyReleased),
            Err(error) => Err(error),
        }
    }

    async fn end_restriction(
        &self,
        actor: &ActorIdentity,
        input: ReleaseRestrictionInput,
        trigger: ReleaseTrigger,
    ) -> AppResult<Restriction> {
        let subject_id = SubjectId::new(input.subject_id)?;
        let command = match trigger {
            ReleaseTrigger::Override => GuardedCommand::Override {
                subject_id: &subject_id,
            },
            ReleaseTrigger::Manual | ReleaseTrigger::Expiry => GuardedCommand::Release {
                subject_id: &subject_id,
            },
        };
        self.guard.authorize(actor, command).await?;

        let key = RestrictionKey::new(actor.group_id().clone(), subject_id);
        let _subject_guard = self.locks.acquire(&key).await;

        let Some(active) = self.load_active(&key).await? else {
            return Err(nothing_to_restore(&key.subject_id));
        };

        self.restore_locked(
            active,
            trigger,
            actor.actor_id(),
            normalize_reason(input.reason),
        )
        .await
    }
}
