//! Background workers.

pub mod recompute_worker;

pub use recompute_worker::{
    Clock, Cycle, Disposition, JobOutcome, RecomputeWorker, WorkerError, WorkerHandle,
    WorkerStats,
};
