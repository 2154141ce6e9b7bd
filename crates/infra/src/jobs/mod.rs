//! Recompute job queue.
//!
//! ## Design
//!
//! - One job row per requested recomputation, keyed by user
//! - At most one pending job per user (duplicates collapse at enqueue)
//! - A job is claimed by exactly one worker inside an exclusive transaction
//! - `processed` only ever moves forward: pending -> done | failed
//! - Failed jobs are never retried in place; recovery is a fresh enqueue
//!
//! Persistence lives behind [`crate::store::JobStore`].

pub mod types;

pub use types::{JobState, JobStats, Processed, RecomputeJob, RetryPolicy, TransitionError};
