//! Core job types and state transitions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trustscore_core::{JobId, UserId, WorkerId};

/// The `processed` column: a tri-state that only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Processed {
    Pending,
    Done,
    Failed,
}

impl Processed {
    pub fn code(self) -> i64 {
        match self {
            Processed::Pending => 0,
            Processed::Done => 1,
            Processed::Failed => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Processed::Pending),
            1 => Some(Processed::Done),
            2 => Some(Processed::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Processed::Pending)
    }
}

/// Lifecycle state derived from `(processing, processed)`.
///
/// `Pending --claim--> Claimed --ok--> Done`, `Claimed --error--> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Claimed,
    Done,
    Failed,
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Claimed => "claimed",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// A unit of queued recompute work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeJob {
    pub id: JobId,
    pub user_id: UserId,
    /// `true` while a worker owns the job.
    pub processing: bool,
    pub processed: Processed,
    /// Number of times the job has been claimed.
    pub attempts: u32,
    /// Worker that claimed the job most recently.
    pub processor: Option<WorkerId>,
    pub enqueued_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RecomputeJob {
    /// A fresh pending job.
    pub fn new(id: JobId, user_id: UserId, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            processing: false,
            processed: Processed::Pending,
            attempts: 0,
            processor: None,
            enqueued_at,
            claimed_at: None,
            processed_at: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> JobState {
        match (self.processing, self.processed) {
            (_, Processed::Done) => JobState::Done,
            (_, Processed::Failed) => JobState::Failed,
            (true, Processed::Pending) => JobState::Claimed,
            (false, Processed::Pending) => JobState::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.processed.is_terminal()
    }

    /// Pending -> Claimed.
    pub fn mark_claimed(
        &mut self,
        worker: &WorkerId,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_state(JobState::Pending, JobState::Claimed)?;
        self.processing = true;
        self.processor = Some(worker.clone());
        self.attempts += 1;
        self.claimed_at = Some(at);
        Ok(())
    }

    /// Claimed -> Done.
    pub fn mark_done(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.expect_state(JobState::Claimed, JobState::Done)?;
        self.processing = false;
        self.processed = Processed::Done;
        self.processed_at = Some(at);
        Ok(())
    }

    /// Claimed -> Failed, recording the error text.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_state(JobState::Claimed, JobState::Failed)?;
        self.processing = false;
        self.processed = Processed::Failed;
        self.processed_at = Some(at);
        self.last_error = Some(error.into());
        Ok(())
    }

    fn expect_state(&self, expected: JobState, to: JobState) -> Result<(), TransitionError> {
        let from = self.state();
        if from != expected {
            return Err(TransitionError {
                job_id: self.id,
                from,
                to,
            });
        }
        Ok(())
    }
}

/// Queue depth by state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
}

impl JobStats {
    pub fn record(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Claimed => self.processing += 1,
            JobState::Done => self.done += 1,
            JobState::Failed => self.failed += 1,
        }
    }
}

/// Bounded exponential backoff for retrying a contended store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first try (0 = no retries).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Delay before retry `attempt` (1-indexed); doubles each time up to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> RecomputeJob {
        RecomputeJob::new(JobId::from_raw(1), UserId::new("u1").unwrap(), Utc::now())
    }

    fn worker() -> WorkerId {
        WorkerId::new("w1").unwrap()
    }

    #[test]
    fn job_lifecycle() {
        let mut job = job();
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.attempts, 0);

        job.mark_claimed(&worker(), Utc::now()).unwrap();
        assert_eq!(job.state(), JobState::Claimed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.processor, Some(worker()));

        job.mark_done(Utc::now()).unwrap();
        assert_eq!(job.state(), JobState::Done);
        assert!(!job.processing);
        assert!(job.processed_at.is_some());
    }

    #[test]
    fn failure_records_error_and_is_terminal() {
        let mut job = job();
        job.mark_claimed(&worker(), Utc::now()).unwrap();
        job.mark_failed("database is locked", Utc::now()).unwrap();

        assert_eq!(job.state(), JobState::Failed);
        assert!(job.is_terminal());
        assert_eq!(job.last_error.as_deref(), Some("database is locked"));
    }

    #[test]
    fn terminal_jobs_never_move() {
        let mut job = job();
        job.mark_claimed(&worker(), Utc::now()).unwrap();
        job.mark_done(Utc::now()).unwrap();

        let err = job.mark_claimed(&worker(), Utc::now()).unwrap_err();
        assert_eq!(err.from, JobState::Done);
        assert!(job.mark_failed("late", Utc::now()).is_err());
        assert_eq!(job.processed, Processed::Done);
        assert_eq!(job.attempts, 1);
    }

    #[test]
    fn pending_job_cannot_complete_without_claim() {
        let mut job = job();
        assert!(job.mark_done(Utc::now()).is_err());
        assert_eq!(job.state(), JobState::Pending);
    }

    #[test]
    fn processed_codes_round_trip() {
        for p in [Processed::Pending, Processed::Done, Processed::Failed] {
            assert_eq!(Processed::from_code(p.code()), Some(p));
        }
        assert_eq!(Processed::from_code(7), None);
    }

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(300),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(300));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(300));

        assert!(policy.should_retry(9));
        assert!(!policy.should_retry(10));
        assert!(!RetryPolicy::no_retry().should_retry(0));
    }
}
