use super::*;

impl RestrictionService {
    /// Restricts a member by swapping every membership for the sentinel membership.
    ///
    /// Membership changes are undone if any later step fails, including persisting the
    /// restriction record.
    pub async fn apply_restriction(
        &self,
        actor: &ActorIdentity,
        input: ApplyRestrictionInput,
    ) -> AppResult<Restriction> {
        let subject_id = SubjectId::new(input.subject_id)?;
        let duration = RestrictionDuration::from_minutes(input.duration_minutes)?;
        let reason = normalize_reason(input.reason);
        let sentinel = &self.policy.sentinel_membership;

        self.guard
            .authorize(
                actor,
                GuardedCommand::Apply {
                    subject_id: &subject_id,
                    sentinel,
                },
            )
            .await?;

        let key = RestrictionKey::new(actor.group_id().clone(), subject_id);
        let _subject_guard = self.locks.acquire(&key).await;

        let already_active = self
            .budget
            .store("active restriction lookup", self.repository.has_active(&key))
            .await?;
        if already_active {
            return Err(AppError::Conflict(format!(
                "subject '{}' already has an active restriction",
                key.subject_id
            )));
        }

        let current = self
            .budget
            .membership(
                "membership listing",
                self.gateway.list_memberships(&key.group_id, &key.subject_id),
            )
            .await
            .map_err(|error| AppError::Transition(format!("listing memberships failed: {error}")))?;
        let snapshot = MembershipSnapshot::capture(current, sentinel);

        let mut saga = MembershipSaga::new(self.gateway.as_ref(), self.budget, &key);
        let steps = snapshot
            .as_slice()
            .iter()
            .cloned()
            .map(MembershipStep::Revoke)
            .chain(std::iter::once(MembershipStep::Grant(sentinel.clone())));
        if let Err(failure) = saga.run(steps).await {
            return Err(self.after_compensation(
                actor,
                &key,
                &snapshot,
                failure.error,
                &failure.compensation,
            ));
        }

        let created_at = Utc::now();
        let new_restriction = NewRestriction {
            group_id: key.group_id.clone(),
            subject_id: key.subject_id.clone(),
            actor_id: actor.actor_id().to_owned(),
            reason,
            created_at,
            ends_at: duration.ends_at(created_at),
            duration,
            snapshot: snapshot.clone(),
        };
        let restriction = match self
            .budget
            .store(
                "restriction insert",
                self.repository.create_active(new_restriction),
            )
            .await
        {
            Ok(restriction) => restriction,
            Err(error) => {
                let compensation = saga.compensate().await;
                let error = match error {
                    AppError::Conflict(_) | AppError::Persistence(_) => error,
                    other => AppError::Persistence(format!("restriction insert failed: {other}")),
                };
                return Err(self.after_compensation(
                    actor,
                    &key,
                    &snapshot,
                    error,
                    &compensation,
                ));
            }
        };

        self.scheduler
            .arm(
                key.clone(),
                restriction.restriction_id,
                restriction.ends_at,
                self.expiry_handler(),
            )
            .await;

        info!(
            subject = %key,
            restriction_id = restriction.restriction_id,
            actor_id = actor.actor_id(),
            duration_minutes = duration.as_minutes(),
            removed = snapshot.len(),
            ends_at = %restriction.ends_at,
            "restriction applied"
        );
        self.record(
            actor.actor_id(),
            AuditAction::RestrictionApplied,
            &restriction,
            json!({
                "subject_id": restriction.subject_id.as_str(),
                "duration_minutes": duration.as_minutes(),
                "ends_at": restriction.ends_at.to_rfc3339(),
                "removed_memberships": snapshot.to_strings(),
                "reason": restriction.reason,
            }),
        );

        Ok(restriction)
    }
}
