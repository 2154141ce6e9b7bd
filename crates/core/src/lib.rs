//! Shared building blocks for the trust score pipeline.
//!
//! This crate contains **pure** primitives (no storage, no clocks): identifiers,
//! the user snapshot consumed by the scoring engine, and normalization of
//! loosely-typed profile payloads into that snapshot.

pub mod error;
pub mod id;
pub mod input;
pub mod snapshot;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, UserId, WorkerId};
pub use input::{BioInput, InterestsInput, UserInput};
pub use snapshot::UserSnapshot;
