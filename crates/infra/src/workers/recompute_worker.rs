//! The recompute worker: claim, score, persist, complete.

use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use trustscore_core::{JobId, UserId, WorkerId};
use trustscore_scoring::{Badge, compute_score};

use crate::jobs::{RecomputeJob, RetryPolicy};
use crate::store::{RecomputeStore, StoreError};

/// Source of the scoring reference time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Only fatal storage failures and thread management errors leave the loop.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("fatal storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("worker thread {0} panicked")]
    Panicked(String),
}

/// How a claimed job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Score and audit entry written, job done.
    Scored {
        score: f64,
        badges: Vec<Badge>,
        audit_id: i64,
    },
    /// The user was deleted after the job was enqueued; job done, nothing written.
    UserMissing,
    /// Processing failed; the job is marked failed with `error`.
    Failed { error: String },
    /// The terminal transition kept failing. The job stays claimed until the
    /// stale-claim sweep expires it.
    Unfinalized { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub user_id: UserId,
    pub disposition: Disposition,
}

/// Result of one [`RecomputeWorker::run_once`] cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Cycle {
    Processed(JobOutcome),
    /// Nothing claimable. Counts the stale claims expired by the sweep, if enabled.
    Idle { expired_claims: usize },
    /// The claim lost a lock race or timed out waiting for it.
    Contended,
    /// The claim failed for a non-fatal reason.
    ClaimFailed(String),
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub claimed: u64,
    pub scored: u64,
    pub skipped_missing_user: u64,
    pub failed: u64,
    pub unfinalized: u64,
    pub idle_polls: u64,
    pub contention: u64,
    pub claim_errors: u64,
    pub stale_expired: u64,
    pub uptime_secs: u64,
}

/// Handle to control a running worker.
///
/// Dropping the handle without calling [`WorkerHandle::shutdown`] also stops
/// the worker at its next poll.
#[derive(Debug)]
pub struct WorkerHandle {
    worker_id: WorkerId,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<Result<(), WorkerError>>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Request graceful shutdown and wait for the loop to exit.
    ///
    /// A job in flight is finished first. On a clean exit returns the final
    /// stats, including that job.
    pub fn shutdown(mut self) -> Result<WorkerStats, WorkerError> {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| WorkerError::Panicked(self.worker_id.to_string()))??;
        }
        Ok(self.stats())
    }

    /// `true` once the loop has exited (shutdown or fatal error).
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|join| join.is_finished())
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

/// Polls the job queue and recomputes scores.
///
/// Each cycle claims at most one job. The claimed user's snapshot is scored
/// against the clock's current time, the score and audit entry are written
/// atomically, and only then is the job marked done. Any failure along the
/// way marks the job failed instead; the loop keeps going unless the store
/// reports itself unusable.
pub struct RecomputeWorker<S> {
    store: S,
    worker_id: WorkerId,
    clock: Clock,
    stale_claim_timeout: Option<Duration>,
    finalize_retry: RetryPolicy,
}

impl<S: RecomputeStore> RecomputeWorker<S> {
    pub fn new(store: S, worker_id: WorkerId) -> Self {
        Self {
            store,
            worker_id,
            clock: Arc::new(Utc::now),
            stale_claim_timeout: None,
            finalize_retry: RetryPolicy::default(),
        }
    }

    /// Replace the scoring reference clock.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Expire claims older than `timeout` whenever the queue is idle.
    pub fn with_stale_claim_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stale_claim_timeout = timeout;
        self
    }

    /// Backoff for retrying a contended `mark_done`/`mark_failed`.
    pub fn with_finalize_retry(mut self, policy: RetryPolicy) -> Self {
        self.finalize_retry = policy;
        self
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one claim-process cycle on the calling thread.
    pub fn run_once(&self) -> Result<Cycle, WorkerError> {
        match self.store.claim_next(&self.worker_id) {
            Ok(Some(job)) => {
                info!(
                    worker = %self.worker_id,
                    job_id = %job.id,
                    user_id = %job.user_id,
                    attempts = job.attempts,
                    "claimed job"
                );
                self.process(&job).map(Cycle::Processed)
            }
            Ok(None) => Ok(Cycle::Idle {
                expired_claims: self.sweep_stale_claims()?,
            }),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) if e.is_retryable() => {
                debug!(worker = %self.worker_id, error = %e, "claim contended");
                Ok(Cycle::Contended)
            }
            Err(e) => {
                warn!(worker = %self.worker_id, error = %e, "failed to claim job");
                Ok(Cycle::ClaimFailed(e.to_string()))
            }
        }
    }

    /// Process a job this worker has claimed.
    ///
    /// A fatal store error still marks the job failed when possible, then
    /// stops the caller instead of moving on to the next job.
    pub fn process(&self, job: &RecomputeJob) -> Result<JobOutcome, WorkerError> {
        let disposition = match self.score(job) {
            Ok(disposition) => match self.finalize(job, || self.store.mark_done(job.id))? {
                None => disposition,
                Some(error) => Disposition::Unfinalized { error },
            },
            Err(e) => {
                let error = e.to_string();
                warn!(
                    worker = %self.worker_id,
                    job_id = %job.id,
                    user_id = %job.user_id,
                    error = %error,
                    "job failed"
                );
                let unfinalized = self.finalize(job, || self.store.mark_failed(job.id, &error))?;
                if e.is_fatal() {
                    return Err(e.into());
                }
                match unfinalized {
                    None => Disposition::Failed { error },
                    Some(error) => Disposition::Unfinalized { error },
                }
            }
        };

        Ok(JobOutcome {
            job_id: job.id,
            user_id: job.user_id.clone(),
            disposition,
        })
    }

    fn score(&self, job: &RecomputeJob) -> Result<Disposition, StoreError> {
        let Some(user) = self.store.get_user(&job.user_id)? else {
            info!(
                worker = %self.worker_id,
                job_id = %job.id,
                user_id = %job.user_id,
                "user no longer exists; completing without score"
            );
            return Ok(Disposition::UserMissing);
        };

        let reference = (self.clock)();
        let result = compute_score(&user, reference);
        let audit = self.store.record_score(&result, reference)?;

        info!(
            worker = %self.worker_id,
            job_id = %job.id,
            user_id = %job.user_id,
            score = result.final_score,
            badges = result.badges.len(),
            "scored user"
        );

        Ok(Disposition::Scored {
            score: result.final_score,
            badges: result.badges,
            audit_id: audit.id,
        })
    }

    /// Run a terminal transition, retrying contention with backoff.
    ///
    /// Returns the last error text if the job is still claimed afterwards.
    fn finalize<F>(&self, job: &RecomputeJob, transition: F) -> Result<Option<String>, WorkerError>
    where
        F: Fn() -> Result<(), StoreError>,
    {
        let mut attempt = 0;
        loop {
            match transition() {
                Ok(()) => return Ok(None),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) if e.is_retryable() && self.finalize_retry.should_retry(attempt) => {
                    attempt += 1;
                    let delay = self.finalize_retry.delay_for_attempt(attempt);
                    debug!(
                        worker = %self.worker_id,
                        job_id = %job.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying job finalization"
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    warn!(
                        worker = %self.worker_id,
                        job_id = %job.id,
                        attempts = attempt + 1,
                        error = %e,
                        "could not finalize job"
                    );
                    return Ok(Some(e.to_string()));
                }
            }
        }
    }

    /// Claim timestamps are wall-clock, so the cutoff is too.
    fn sweep_stale_claims(&self) -> Result<usize, WorkerError> {
        let Some(timeout) = self.stale_claim_timeout else {
            return Ok(0);
        };
        let Some(cutoff) = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        match self.store.expire_stale_claims(cutoff) {
            Ok(expired) => {
                if !expired.is_empty() {
                    warn!(
                        worker = %self.worker_id,
                        expired = expired.len(),
                        "expired stale claims"
                    );
                }
                Ok(expired.len())
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                debug!(worker = %self.worker_id, error = %e, "stale claim sweep skipped");
                Ok(0)
            }
        }
    }
}

impl<S: RecomputeStore + 'static> RecomputeWorker<S> {
    /// Run the loop on a named background thread.
    ///
    /// After a processed job the next claim follows immediately; idle,
    /// contended and failed claims wait `poll_interval` first.
    pub fn spawn(self, poll_interval: Duration) -> Result<WorkerHandle, WorkerError> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let loop_stats = Arc::clone(&stats);
        let worker_id = self.worker_id.clone();

        let join = thread::Builder::new()
            .name(worker_id.to_string())
            .spawn(move || worker_loop(self, poll_interval, shutdown_rx, loop_stats))
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        Ok(WorkerHandle {
            worker_id,
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn worker_loop<S: RecomputeStore>(
    worker: RecomputeWorker<S>,
    poll_interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<WorkerStats>>,
) -> Result<(), WorkerError> {
    info!(
        worker = %worker.worker_id,
        poll_interval_ms = poll_interval.as_millis() as u64,
        stale_claim_timeout = ?worker.stale_claim_timeout,
        "recompute worker started"
    );
    let started = Instant::now();

    let result = loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break Ok(()),
            Err(TryRecvError::Empty) => {}
        }

        let cycle = match worker.run_once() {
            Ok(cycle) => cycle,
            Err(e) => {
                error!(worker = %worker.worker_id, error = %e, "stopping worker");
                break Err(e);
            }
        };
        record(&stats, started, &cycle);

        if matches!(cycle, Cycle::Processed(_)) {
            continue;
        }

        match shutdown_rx.recv_timeout(poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break Ok(()),
            Err(RecvTimeoutError::Timeout) => {}
        }
    };

    info!(worker = %worker.worker_id, "recompute worker stopped");
    result
}

fn record(stats: &Mutex<WorkerStats>, started: Instant, cycle: &Cycle) {
    let Ok(mut s) = stats.lock() else {
        return;
    };
    s.uptime_secs = started.elapsed().as_secs();

    match cycle {
        Cycle::Processed(outcome) => {
            s.claimed += 1;
            match outcome.disposition {
                Disposition::Scored { .. } => s.scored += 1,
                Disposition::UserMissing => s.skipped_missing_user += 1,
                Disposition::Failed { .. } => s.failed += 1,
                Disposition::Unfinalized { .. } => s.unfinalized += 1,
            }
        }
        Cycle::Idle { expired_claims } => {
            s.idle_polls += 1;
            s.stale_expired += *expired_claims as u64;
        }
        Cycle::Contended => s.contention += 1,
        Cycle::ClaimFailed(_) => s.claim_errors += 1,
    }
}
