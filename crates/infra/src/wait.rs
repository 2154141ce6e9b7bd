//! Write a user snapshot and wait for the recompute it triggers.

use std::thread;
use std::time::{Duration, Instant};

use trustscore_core::UserSnapshot;

use crate::jobs::RecomputeJob;
use crate::store::{AuditEntry, RecomputeStore, StoreError, TrustScoreRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// What the store looked like when the wait ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeStatus {
    /// The job tracked by the wait.
    pub job: Option<RecomputeJob>,
    pub score: Option<TrustScoreRecord>,
    pub audit: Vec<AuditEntry>,
    /// The job was still pending or claimed at the deadline.
    pub timed_out: bool,
}

/// Upsert `user`, then poll until the recompute job finishes or `timeout`
/// elapses. A timeout too large to represent means no deadline.
///
/// When the write collapsed into an existing pending job, that job (the
/// user's latest) is the one waited on. Scoring itself is left to whatever
/// workers are running.
pub fn upsert_and_wait<S>(
    store: &S,
    user: &UserSnapshot,
    options: WaitOptions,
) -> Result<RecomputeStatus, StoreError>
where
    S: RecomputeStore + ?Sized,
{
    let enqueued = store.upsert_user(user)?;
    let deadline = Instant::now().checked_add(options.timeout);

    loop {
        let job = match enqueued {
            Some(job_id) => store.get(job_id)?,
            None => store.latest_for_user(&user.user_id)?,
        };
        let settled = job.as_ref().is_none_or(RecomputeJob::is_terminal);

        let now = Instant::now();
        if settled || deadline.is_some_and(|deadline| now >= deadline) {
            return Ok(RecomputeStatus {
                job,
                score: store.get_score(&user.user_id)?,
                audit: store.audit_history(&user.user_id)?,
                timed_out: !settled,
            });
        }

        let remaining = deadline.map_or(options.poll_interval, |deadline| deadline - now);
        thread::sleep(options.poll_interval.min(remaining));
    }
}
