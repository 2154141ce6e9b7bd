//! Infrastructure for the trust score pipeline: storage backends, the durable
//! recompute queue, the worker loop and configuration.

pub mod config;
pub mod jobs;
pub mod store;
pub mod wait;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError, StoreConfig, WorkerConfig};
pub use jobs::{JobState, JobStats, Processed, RecomputeJob, RetryPolicy};
pub use store::{
    AuditEntry, InMemoryStore, JobStore, RecomputeStore, ScoreStore, SqliteStore, StoreError,
    TrustScoreRecord, UserStore,
};
pub use wait::{RecomputeStatus, WaitOptions, upsert_and_wait};
pub use workers::{Cycle, Disposition, JobOutcome, RecomputeWorker, WorkerError, WorkerHandle, WorkerStats};
