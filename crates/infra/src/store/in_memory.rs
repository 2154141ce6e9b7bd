use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use trustscore_core::{JobId, UserId, UserSnapshot, WorkerId};
use trustscore_scoring::ScoreResult;

use crate::jobs::{JobState, JobStats, RecomputeJob};

use super::r#trait::{AuditEntry, JobStore, ScoreStore, StoreError, TrustScoreRecord, UserStore};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserSnapshot>,
    scores: HashMap<UserId, TrustScoreRecord>,
    audit: Vec<AuditEntry>,
    jobs: BTreeMap<JobId, RecomputeJob>,
    last_job_id: i64,
    last_audit_id: i64,
}

impl State {
    fn pending_job_for(&self, user_id: &UserId) -> Option<JobId> {
        self.jobs
            .values()
            .find(|job| &job.user_id == user_id && job.state() == JobState::Pending)
            .map(|job| job.id)
    }

    fn enqueue(&mut self, user_id: &UserId, at: DateTime<Utc>) -> Option<JobId> {
        if self.pending_job_for(user_id).is_some() {
            return None;
        }
        self.last_job_id += 1;
        let id = JobId::from_raw(self.last_job_id);
        self.jobs
            .insert(id, RecomputeJob::new(id, user_id.clone(), at));
        Some(id)
    }

    fn job_mut(&mut self, job_id: JobId) -> Result<&mut RecomputeJob, StoreError> {
        self.jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound(job_id))
    }
}

/// In-memory pipeline store.
///
/// Intended for tests/dev. One lock guards every table, so multi-table writes
/// are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }
}

impl UserStore for InMemoryStore {
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserSnapshot>, StoreError> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    fn upsert_user(&self, user: &UserSnapshot) -> Result<Option<JobId>, StoreError> {
        let mut state = self.write()?;
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(state.enqueue(&user.user_id, Utc::now()))
    }

    fn delete_user(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.users.remove(user_id).is_none() {
            return Ok(false);
        }
        state.scores.remove(user_id);
        state.audit.retain(|entry| &entry.user_id != user_id);
        Ok(true)
    }
}

impl ScoreStore for InMemoryStore {
    fn record_score(
        &self,
        result: &ScoreResult,
        computed_at: DateTime<Utc>,
    ) -> Result<AuditEntry, StoreError> {
        let breakdown = serde_json::to_value(&result.breakdown)?;

        let mut state = self.write()?;
        if !state.users.contains_key(&result.user_id) {
            return Err(StoreError::Storage(format!(
                "user {} no longer exists",
                result.user_id
            )));
        }

        state.scores.insert(
            result.user_id.clone(),
            TrustScoreRecord {
                user_id: result.user_id.clone(),
                score: result.final_score,
                updated_at: computed_at,
            },
        );

        state.last_audit_id += 1;
        let entry = AuditEntry {
            id: state.last_audit_id,
            user_id: result.user_id.clone(),
            score: result.final_score,
            breakdown,
            computed_at,
        };
        state.audit.push(entry.clone());
        Ok(entry)
    }

    fn get_score(&self, user_id: &UserId) -> Result<Option<TrustScoreRecord>, StoreError> {
        Ok(self.read()?.scores.get(user_id).cloned())
    }

    fn audit_history(&self, user_id: &UserId) -> Result<Vec<AuditEntry>, StoreError> {
        let mut history: Vec<AuditEntry> = self
            .read()?
            .audit
            .iter()
            .filter(|entry| &entry.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by_key(|entry| (entry.computed_at, entry.id));
        Ok(history)
    }
}

impl JobStore for InMemoryStore {
    fn enqueue(&self, user_id: &UserId) -> Result<Option<JobId>, StoreError> {
        Ok(self.write()?.enqueue(user_id, Utc::now()))
    }

    fn claim_next(&self, worker: &WorkerId) -> Result<Option<RecomputeJob>, StoreError> {
        let mut state = self.write()?;

        let next = state
            .jobs
            .values()
            .filter(|job| job.state() == JobState::Pending)
            .min_by_key(|job| (job.enqueued_at, job.id))
            .map(|job| job.id);

        let Some(id) = next else {
            return Ok(None);
        };

        let job = state.job_mut(id)?;
        job.mark_claimed(worker, Utc::now())?;
        Ok(Some(job.clone()))
    }

    fn mark_done(&self, job_id: JobId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.job_mut(job_id)?.mark_done(Utc::now())?;
        Ok(())
    }

    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.job_mut(job_id)?.mark_failed(error, Utc::now())?;
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<Option<RecomputeJob>, StoreError> {
        Ok(self.read()?.jobs.get(&job_id).cloned())
    }

    fn latest_for_user(&self, user_id: &UserId) -> Result<Option<RecomputeJob>, StoreError> {
        Ok(self
            .read()?
            .jobs
            .values()
            .filter(|job| &job.user_id == user_id)
            .max_by_key(|job| (job.enqueued_at, job.id))
            .cloned())
    }

    fn expire_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut state = self.write()?;
        let now = Utc::now();

        let stale: Vec<(JobId, UserId)> = state
            .jobs
            .values()
            .filter(|job| job.state() == JobState::Claimed)
            .filter(|job| job.claimed_at.is_some_and(|at| at < claimed_before))
            .map(|job| (job.id, job.user_id.clone()))
            .collect();

        for (job_id, user_id) in &stale {
            let job = state.job_mut(*job_id)?;
            let error = stale_claim_error(job.processor.as_ref());
            job.mark_failed(error, now)?;
            state.enqueue(user_id, now);
        }

        Ok(stale.into_iter().map(|(job_id, _)| job_id).collect())
    }

    fn stats(&self) -> Result<JobStats, StoreError> {
        let state = self.read()?;
        let mut stats = JobStats::default();
        for job in state.jobs.values() {
            stats.record(job.state());
        }
        Ok(stats)
    }
}

fn stale_claim_error(processor: Option<&WorkerId>) -> String {
    match processor {
        Some(worker) => format!("claim expired (held by {worker})"),
        None => "claim expired".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use trustscore_scoring::compute_score;

    fn user(id: &str) -> UserSnapshot {
        UserSnapshot {
            photos: 4,
            selfie_verified: true,
            ..UserSnapshot::new(UserId::new(id).unwrap())
        }
    }

    fn worker(id: &str) -> WorkerId {
        WorkerId::new(id).unwrap()
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 24, 9, 30, 0).unwrap()
    }

    #[test]
    fn upsert_enqueues_and_collapses_duplicates() {
        let store = InMemoryStore::new();
        let first = store.upsert_user(&user("u1")).unwrap();
        let second = store.upsert_user(&user("u1")).unwrap();

        assert!(first.is_some());
        assert_eq!(second, None);
        assert_eq!(store.stats().unwrap().pending, 1);
    }

    #[test]
    fn claimed_job_does_not_block_new_enqueue() {
        let store = InMemoryStore::new();
        store.upsert_user(&user("u1")).unwrap();
        store.claim_next(&worker("w1")).unwrap().unwrap();

        assert!(store.enqueue(&UserId::new("u1").unwrap()).unwrap().is_some());
    }

    #[test]
    fn claims_oldest_first_and_only_once() {
        let store = InMemoryStore::new();
        let a = store.upsert_user(&user("a")).unwrap().unwrap();
        let b = store.upsert_user(&user("b")).unwrap().unwrap();

        let first = store.claim_next(&worker("w1")).unwrap().unwrap();
        let second = store.claim_next(&worker("w2")).unwrap().unwrap();
        assert_eq!(first.id, a);
        assert_eq!(second.id, b);
        assert_eq!(second.processor, Some(worker("w2")));
        assert!(store.claim_next(&worker("w3")).unwrap().is_none());
    }

    #[test]
    fn completion_is_guarded() {
        let store = InMemoryStore::new();
        let id = store.upsert_user(&user("u1")).unwrap().unwrap();

        assert!(matches!(
            store.mark_done(id),
            Err(StoreError::InvalidTransition(_))
        ));

        store.claim_next(&worker("w1")).unwrap();
        store.mark_done(id).unwrap();
        assert!(matches!(
            store.mark_failed(id, "late"),
            Err(StoreError::InvalidTransition(_))
        ));
        assert!(matches!(
            store.mark_done(JobId::from_raw(999)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn record_score_updates_current_and_appends_audit() {
        let store = InMemoryStore::new();
        let u = user("u1");
        store.upsert_user(&u).unwrap();

        let result = compute_score(&u, reference());
        let first = store.record_score(&result, reference()).unwrap();
        let second = store
            .record_score(&result, reference() + Duration::minutes(1))
            .unwrap();

        assert!(second.id > first.id);
        let current = store.get_score(&u.user_id).unwrap().unwrap();
        assert_eq!(current.score, result.final_score);
        assert_eq!(current.updated_at, reference() + Duration::minutes(1));
        assert_eq!(store.audit_history(&u.user_id).unwrap().len(), 2);
    }

    #[test]
    fn record_score_for_deleted_user_writes_nothing() {
        let store = InMemoryStore::new();
        let u = user("gone");
        let result = compute_score(&u, reference());

        assert!(store.record_score(&result, reference()).is_err());
        assert!(store.get_score(&u.user_id).unwrap().is_none());
        assert!(store.audit_history(&u.user_id).unwrap().is_empty());
    }

    #[test]
    fn delete_cascades_to_scores_but_keeps_jobs() {
        let store = InMemoryStore::new();
        let u = user("u1");
        let id = store.upsert_user(&u).unwrap().unwrap();
        store
            .record_score(&compute_score(&u, reference()), reference())
            .unwrap();

        assert!(store.delete_user(&u.user_id).unwrap());
        assert!(!store.delete_user(&u.user_id).unwrap());
        assert!(store.get_score(&u.user_id).unwrap().is_none());
        assert!(store.audit_history(&u.user_id).unwrap().is_empty());
        assert!(store.get(id).unwrap().is_some());
    }

    #[test]
    fn stale_claims_fail_and_requeue() {
        let store = InMemoryStore::new();
        let id = store.upsert_user(&user("u1")).unwrap().unwrap();
        store.claim_next(&worker("w1")).unwrap();

        let expired = store
            .expire_stale_claims(Utc::now() + Duration::seconds(1))
            .unwrap();
        assert_eq!(expired, vec![id]);

        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("claim expired (held by w1)"));

        let latest = store.latest_for_user(&job.user_id).unwrap().unwrap();
        assert_ne!(latest.id, id);
        assert_eq!(latest.state(), JobState::Pending);
    }

    #[test]
    fn fresh_claims_survive_the_sweep() {
        let store = InMemoryStore::new();
        store.upsert_user(&user("u1")).unwrap();
        store.claim_next(&worker("w1")).unwrap();

        let expired = store
            .expire_stale_claims(Utc::now() - Duration::minutes(5))
            .unwrap();
        assert!(expired.is_empty());
        assert_eq!(store.stats().unwrap().processing, 1);
    }
}
