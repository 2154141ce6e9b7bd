//! Trust score computation: the single place scores come from.
//!
//! [`compute_score`] is a pure, total function of a [`UserSnapshot`] and a
//! reference time. It performs no I/O and never fails: malformed inputs are
//! clamped or treated as absent.
//!
//! Pipeline:
//!
//! 1. component scores (profile 0..=30, verification 0..=40, activity -8..=30)
//! 2. raw total, clamped to 0..=100
//! 3. inactivity decay (5 points per full inactive week)
//! 4. badges, evaluated against the final score
//!
//! Every stage is rounded to two decimal places.
//!
//! [`UserSnapshot`]: trustscore_core::UserSnapshot

pub mod badges;
pub mod components;
pub mod decay;
pub mod engine;
pub mod policy;

pub use badges::{Badge, assign_badges};
pub use components::{
    ActivityBreakdown, ProfileBreakdown, VerificationBreakdown, activity_score, profile_score,
    verification_score,
};
pub use decay::{DecayBreakdown, days_inactive, inactivity_decay, parse_last_active};
pub use engine::{ScoreBreakdown, ScoreResult, compute_score};

/// Round to two decimal places (half away from zero).
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
