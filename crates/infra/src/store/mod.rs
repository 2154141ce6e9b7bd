//! Storage boundary for the recompute pipeline.
//!
//! Three traits split the concerns: [`UserStore`] holds input snapshots,
//! [`ScoreStore`] holds current scores plus the audit trail, and [`JobStore`]
//! is the durable queue. Backends implement all three; [`RecomputeStore`] is
//! the combined bound the worker needs.

pub mod in_memory;
mod schema;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use r#trait::{
    AuditEntry, JobStore, RecomputeStore, ScoreStore, StoreError, TrustScoreRecord, UserStore,
};
