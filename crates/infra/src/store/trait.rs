use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use trustscore_core::{JobId, UserId, UserSnapshot, WorkerId};
use trustscore_scoring::ScoreResult;

use crate::jobs::{JobState, JobStats, RecomputeJob, TransitionError};

/// Latest computed score for a user.
///
/// Exactly one row per user, overwritten on every successful recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreRecord {
    pub user_id: UserId,
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

/// One append-only audit row.
///
/// ## Breakdown
///
/// `breakdown` is the serialized [`trustscore_scoring::ScoreBreakdown`] as it
/// was written. It is kept as raw JSON so that entries written by older
/// scoring versions stay readable after the breakdown shape evolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic per store; later computations get larger ids.
    pub id: i64,
    pub user_id: UserId,
    pub score: f64,
    pub breakdown: JsonValue,
    pub computed_at: DateTime<Utc>,
}

/// Storage failure.
///
/// ## Classification
///
/// - `Contention`: the backend is busy (lock held past the timeout). Retry later.
/// - `NotFound` / `InvalidTransition`: the caller asked for something the queue
///   state does not allow. Not retryable as-is.
/// - `Serialization` / `Storage`: the operation failed; the backend is healthy.
/// - `Unavailable` / `SchemaMissing`: the backend cannot serve any request.
///   Workers stop on these.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage busy: {0}")]
    Contention(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("invalid job transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("schema missing: {0}")]
    SchemaMissing(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }

    /// The backend cannot serve further requests.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::SchemaMissing(_))
    }

    pub(crate) fn transition(job_id: JobId, from: JobState, to: JobState) -> Self {
        StoreError::InvalidTransition(TransitionError { job_id, from, to })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// User snapshots, the input side of the pipeline.
pub trait UserStore: Send + Sync {
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserSnapshot>, StoreError>;

    /// Insert or replace a snapshot and enqueue a recompute in the same unit of
    /// work.
    ///
    /// Returns the new job id, or `None` when a pending job for the user
    /// already existed (the request collapsed into it).
    fn upsert_user(&self, user: &UserSnapshot) -> Result<Option<JobId>, StoreError>;

    /// Delete a user with its score and audit history.
    ///
    /// Jobs are left in place; a later claim finds the user missing and
    /// completes without scoring. Returns `false` if the user did not exist.
    fn delete_user(&self, user_id: &UserId) -> Result<bool, StoreError>;
}

/// Current scores and the audit trail.
pub trait ScoreStore: Send + Sync {
    /// Overwrite the user's current score and append one audit entry, atomically.
    ///
    /// Either both writes land or neither does. Fails if the user no longer
    /// exists.
    fn record_score(
        &self,
        result: &ScoreResult,
        computed_at: DateTime<Utc>,
    ) -> Result<AuditEntry, StoreError>;

    fn get_score(&self, user_id: &UserId) -> Result<Option<TrustScoreRecord>, StoreError>;

    /// All audit entries for a user, oldest first.
    fn audit_history(&self, user_id: &UserId) -> Result<Vec<AuditEntry>, StoreError>;
}

/// The durable recompute queue.
pub trait JobStore: Send + Sync {
    /// Request a recompute. Collapses into an existing pending job for the
    /// same user and returns `None` in that case.
    fn enqueue(&self, user_id: &UserId) -> Result<Option<JobId>, StoreError>;

    /// Atomically claim the oldest pending job.
    ///
    /// Under any number of concurrent callers a given job is handed to at most
    /// one of them. Returns `None` when nothing is claimable.
    fn claim_next(&self, worker: &WorkerId) -> Result<Option<RecomputeJob>, StoreError>;

    /// Claimed -> done.
    fn mark_done(&self, job_id: JobId) -> Result<(), StoreError>;

    /// Claimed -> failed, recording `error`.
    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError>;

    fn get(&self, job_id: JobId) -> Result<Option<RecomputeJob>, StoreError>;

    /// Most recently enqueued job for a user.
    fn latest_for_user(&self, user_id: &UserId) -> Result<Option<RecomputeJob>, StoreError>;

    /// Fail every job claimed before `claimed_before` and still unfinished,
    /// enqueueing a fresh job for each affected user.
    ///
    /// Returns the ids of the expired jobs.
    fn expire_stale_claims(&self, claimed_before: DateTime<Utc>)
    -> Result<Vec<JobId>, StoreError>;

    fn stats(&self) -> Result<JobStats, StoreError>;
}

/// Everything the recompute worker needs from a backend.
pub trait RecomputeStore: UserStore + ScoreStore + JobStore {}

impl<T> RecomputeStore for T where T: UserStore + ScoreStore + JobStore + ?Sized {}

impl<T: UserStore + ?Sized> UserStore for Arc<T> {
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserSnapshot>, StoreError> {
        (**self).get_user(user_id)
    }

    fn upsert_user(&self, user: &UserSnapshot) -> Result<Option<JobId>, StoreError> {
        (**self).upsert_user(user)
    }

    fn delete_user(&self, user_id: &UserId) -> Result<bool, StoreError> {
        (**self).delete_user(user_id)
    }
}

impl<T: ScoreStore + ?Sized> ScoreStore for Arc<T> {
    fn record_score(
        &self,
        result: &ScoreResult,
        computed_at: DateTime<Utc>,
    ) -> Result<AuditEntry, StoreError> {
        (**self).record_score(result, computed_at)
    }

    fn get_score(&self, user_id: &UserId) -> Result<Option<TrustScoreRecord>, StoreError> {
        (**self).get_score(user_id)
    }

    fn audit_history(&self, user_id: &UserId) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).audit_history(user_id)
    }
}

impl<T: JobStore + ?Sized> JobStore for Arc<T> {
    fn enqueue(&self, user_id: &UserId) -> Result<Option<JobId>, StoreError> {
        (**self).enqueue(user_id)
    }

    fn claim_next(&self, worker: &WorkerId) -> Result<Option<RecomputeJob>, StoreError> {
        (**self).claim_next(worker)
    }

    fn mark_done(&self, job_id: JobId) -> Result<(), StoreError> {
        (**self).mark_done(job_id)
    }

    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        (**self).mark_failed(job_id, error)
    }

    fn get(&self, job_id: JobId) -> Result<Option<RecomputeJob>, StoreError> {
        (**self).get(job_id)
    }

    fn latest_for_user(&self, user_id: &UserId) -> Result<Option<RecomputeJob>, StoreError> {
        (**self).latest_for_user(user_id)
    }

    fn expire_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError> {
        (**self).expire_stale_claims(claimed_before)
    }

    fn stats(&self) -> Result<JobStats, StoreError> {
        (**self).stats()
    }
}
