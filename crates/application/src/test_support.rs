use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use warden_core::{ActorIdentity, AppError, AppResult, GroupId};
use warden_domain::{
    Capability, HierarchyRanks, MembershipId, Restriction, RestrictionKey, RestrictionStatus,
    SubjectId,
};

use crate::{
    AuditEvent, AuditRepository, MembershipGateway, NewRestriction, RestrictionRepository,
    TerminalUpdate,
};

pub(crate) const GROUP: &str = "guild-1";
pub(crate) const ENFORCER: &str = "bot";
pub(crate) const SENTINEL: &str = "muted";
pub(crate) const MODERATOR: &str = "moderator";
pub(crate) const ADMIN: &str = "admin";

pub(crate) fn group_id() -> GroupId {
    match GroupId::new(GROUP) {
        Ok(group_id) => group_id,
        Err(error) => panic!("invalid group id: {error}"),
    }
}

pub(crate) fn subject(value: &str) -> SubjectId {
    match SubjectId::new(value) {
        Ok(subject_id) => subject_id,
        Err(error) => panic!("invalid subject id: {error}"),
    }
}

pub(crate) fn membership(value: &str) -> MembershipId {
    match MembershipId::new(value) {
        Ok(membership) => membership,
        Err(error) => panic!("invalid membership id: {error}"),
    }
}

pub(crate) fn key(value: &str) -> RestrictionKey {
    RestrictionKey::new(group_id(), subject(value))
}

pub(crate) fn actor(actor_id: &str) -> ActorIdentity {
    ActorIdentity::new(actor_id, group_id())
}

/// In-memory membership platform with failure injection.
pub(crate) struct FakePlatform {
    holdings: Mutex<HashMap<String, Vec<String>>>,
    ranks: Mutex<HashMap<String, i64>>,
    capabilities: Mutex<HashMap<String, Vec<Capability>>>,
    failing_grants: Mutex<HashSet<String>>,
    failing_removals: Mutex<HashSet<String>>,
    fail_lookups: AtomicBool,
    slow_grants: Mutex<Option<Duration>>,
    mutations: Mutex<Vec<String>>,
}

impl FakePlatform {
    /// Group with ranks `bot-role` 100, `senior` 60, `muted` 50, `c` 30, `b` 20, `a` 10.
    pub(crate) fn new() -> Self {
        let ranks = [
            ("bot-role", 100),
            ("senior", 60),
            ("muted", 50),
            ("c", 30),
            ("b", 20),
            ("a", 10),
        ]
        .into_iter()
        .map(|(membership, rank)| (membership.to_owned(), rank))
        .collect();
        let capabilities = HashMap::from([
            (MODERATOR.to_owned(), vec![Capability::ManageMemberships]),
            (ADMIN.to_owned(), vec![Capability::Administrator]),
        ]);
        let holdings = HashMap::from([(ENFORCER.to_owned(), vec!["bot-role".to_owned()])]);

        Self {
            holdings: Mutex::new(holdings),
            ranks: Mutex::new(ranks),
            capabilities: Mutex::new(capabilities),
            failing_grants: Mutex::new(HashSet::new()),
            failing_removals: Mutex::new(HashSet::new()),
            fail_lookups: AtomicBool::new(false),
            slow_grants: Mutex::new(None),
            mutations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn give(&self, subject: &str, memberships: &[&str]) {
        self.holdings.lock().await.insert(
            subject.to_owned(),
            memberships.iter().map(|value| (*value).to_owned()).collect(),
        );
    }

    pub(crate) async fn holdings_of(&self, subject: &str) -> Vec<String> {
        let mut held = self
            .holdings
            .lock()
            .await
            .get(subject)
            .cloned()
            .unwrap_or_default();
        held.sort();
        held
    }

    pub(crate) async fn set_rank(&self, membership: &str, rank: i64) {
        self.ranks.lock().await.insert(membership.to_owned(), rank);
    }

    pub(crate) async fn fail_grant_of(&self, membership: &str) {
        self.failing_grants
            .lock()
            .await
            .insert(membership.to_owned());
    }

    pub(crate) async fn fail_removal_of(&self, membership: &str) {
        self.failing_removals
            .lock()
            .await
            .insert(membership.to_owned());
    }

    pub(crate) async fn heal(&self) {
        self.failing_grants.lock().await.clear();
        self.failing_removals.lock().await.clear();
        self.fail_lookups.store(false, Ordering::SeqCst);
    }

    pub(crate) fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn slow_down_grants(&self, delay: Duration) {
        *self.slow_grants.lock().await = Some(delay);
    }

    pub(crate) async fn mutation_count(&self) -> usize {
        self.mutations.lock().await.len()
    }

    fn lookup_guard(&self) -> AppResult<()> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(AppError::Internal("platform lookup unavailable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipGateway for FakePlatform {
    async fn add_membership(
        &self,
        _group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> AppResult<()> {
        let delay = *self.slow_grants.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.mutations
            .lock()
            .await
            .push(format!("add:{subject_id}:{membership_id}"));
        if self
            .failing_grants
            .lock()
            .await
            .contains(membership_id.as_str())
        {
            return Err(AppError::Internal(format!(
                "platform rejected grant of '{membership_id}'"
            )));
        }

        let mut holdings = self.holdings.lock().await;
        let held = holdings.entry(subject_id.as_str().to_owned()).or_default();
        if !held.iter().any(|value| value == membership_id.as_str()) {
            held.push(membership_id.as_str().to_owned());
        }
        Ok(())
    }

    async fn remove_membership(
        &self,
        _group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> AppResult<()> {
        self.mutations
            .lock()
            .await
            .push(format!("remove:{subject_id}:{membership_id}"));
        if self
            .failing_removals
            .lock()
            .await
            .contains(membership_id.as_str())
        {
            return Err(AppError::Internal(format!(
                "platform rejected removal of '{membership_id}'"
            )));
        }

        if let Some(held) = self.holdings.lock().await.get_mut(subject_id.as_str()) {
            held.retain(|value| value != membership_id.as_str());
        }
        Ok(())
    }

    async fn list_memberships(
        &self,
        _group_id: &GroupId,
        subject_id: &SubjectId,
    ) -> AppResult<Vec<MembershipId>> {
        self.lookup_guard()?;
        self.holdings
            .lock()
            .await
            .get(subject_id.as_str())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(MembershipId::new)
            .collect()
    }

    async fn hierarchy_ranks(&self, _group_id: &GroupId) -> AppResult<HierarchyRanks> {
        self.lookup_guard()?;
        let ranks = self.ranks.lock().await.clone();
        let mut entries = Vec::with_capacity(ranks.len());
        for (membership, rank) in ranks {
            entries.push((MembershipId::new(membership)?, rank));
        }
        Ok(HierarchyRanks::new(entries))
    }

    async fn enforcing_identity(&self) -> AppResult<SubjectId> {
        SubjectId::new(ENFORCER)
    }

    async fn actor_capabilities(
        &self,
        _group_id: &GroupId,
        actor_id: &str,
    ) -> AppResult<Vec<Capability>> {
        self.lookup_guard()?;
        Ok(self
            .capabilities
            .lock()
            .await
            .get(actor_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory restriction store that enforces one active record per key.
#[derive(Default)]
pub(crate) struct FakeRestrictionRepository {
    records: Mutex<Vec<Restriction>>,
    next_id: AtomicI64,
    fail_inserts: AtomicBool,
    conflict_on_insert: AtomicBool,
    fail_updates: AtomicBool,
    slow_purges: Mutex<Option<Duration>>,
}

impl FakeRestrictionRepository {
    pub(crate) fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    /// Rejects inserts with a uniqueness conflict while `has_active` still reports the
    /// key as free, like a concurrent writer winning the partial unique index.
    pub(crate) fn conflict_on_insert(&self) {
        self.conflict_on_insert.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn slow_down_purges(&self, delay: Duration) {
        *self.slow_purges.lock().await = Some(delay);
    }

    pub(crate) fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub(crate) async fn all(&self) -> Vec<Restriction> {
        self.records.lock().await.clone()
    }

    pub(crate) async fn active_count(&self) -> usize {
        self.records
            .lock()
            .await
            .iter()
            .filter(|record| record.is_active())
            .count()
    }

    pub(crate) async fn seed(&self, restriction: Restriction) -> Restriction {
        let mut restriction = restriction;
        restriction.restriction_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().await.push(restriction.clone());
        restriction
    }
}

#[async_trait]
impl RestrictionRepository for FakeRestrictionRepository {
    async fn has_active(&self, key: &RestrictionKey) -> AppResult<bool> {
        Ok(self.find_active(key).await?.is_some())
    }

    async fn create_active(&self, restriction: NewRestriction) -> AppResult<Restriction> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("insert rejected".to_owned()));
        }
        if self.conflict_on_insert.load(Ordering::SeqCst) {
            return Err(AppError::Conflict(format!(
                "subject '{}' already has an active restriction",
                restriction.subject_id
            )));
        }

        let mut records = self.records.lock().await;
        if records.iter().any(|record| {
            record.is_active()
                && record.group_id == restriction.group_id
                && record.subject_id == restriction.subject_id
        }) {
            return Err(AppError::Conflict(format!(
                "subject '{}' already has an active restriction",
                restriction.subject_id
            )));
        }

        let stored = Restriction {
            restriction_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            group_id: restriction.group_id,
            subject_id: restriction.subject_id,
            actor_id: restriction.actor_id,
            reason: restriction.reason,
            created_at: restriction.created_at,
            ends_at: restriction.ends_at,
            duration: restriction.duration,
            snapshot: restriction.snapshot,
            status: RestrictionStatus::Active,
            released_at: None,
            release_trigger: None,
            released_by: None,
            release_reason: None,
            restore_count: 0,
        };
        records.push(stored.clone());
        Ok(stored)
    }

    async fn find_active(&self, key: &RestrictionKey) -> AppResult<Option<Restriction>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|record| {
                record.is_active()
                    && record.group_id == key.group_id
                    && record.subject_id == key.subject_id
            })
            .cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<Restriction>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| record.is_active())
            .cloned()
            .collect())
    }

    async fn mark_terminal(
        &self,
        restriction_id: i64,
        update: TerminalUpdate,
    ) -> AppResult<Option<Restriction>> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("update rejected".to_owned()));
        }

        let mut records = self.records.lock().await;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.restriction_id == restriction_id && record.is_active())
        else {
            return Ok(None);
        };

        record.status = update.trigger.terminal_status();
        record.released_at = Some(update.released_at);
        record.release_trigger = Some(update.trigger);
        record.released_by = Some(update.released_by);
        record.release_reason = update.reason;
        record.restore_count += 1;
        Ok(Some(record.clone()))
    }

    async fn purge_terminal_ended_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let delay = *self.slow_purges.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| record.is_active() || record.ends_at >= cutoff);
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }
}

/// Audit repository that keeps events in memory.
#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    events: Mutex<Vec<AuditEvent>>,
}

impl FakeAuditRepository {
    pub(crate) async fn actions(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .await
            .iter()
            .map(|event| event.action.as_str())
            .collect()
    }
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Gives spawned audit and timer tasks a chance to run.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
