//! The user attributes the scoring engine consumes.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Point-in-time view of a user's scoring inputs.
///
/// Owned by the user store; the pipeline only reads it. Numeric fields are kept
/// as signed integers so that out-of-range values coming from storage can be
/// clamped by the engine instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub photos: i64,
    pub bio_present: bool,
    /// Interest magnitude. Scoring only looks at presence (`> 0`).
    pub interests_count: i64,
    pub selfie_verified: bool,
    pub id_verified: bool,
    pub login_streak_days: i64,
    /// Percentage, nominally 0..=100.
    pub response_rate_pct: i64,
    pub reports_received: i64,
    /// Raw last-activity timestamp as written by the user store.
    pub last_active_at: Option<String>,
}

impl UserSnapshot {
    /// An empty profile: every count zero, every flag false, never active.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            photos: 0,
            bio_present: false,
            interests_count: 0,
            selfie_verified: false,
            id_verified: false,
            login_streak_days: 0,
            response_rate_pct: 0,
            reports_received: 0,
            last_active_at: None,
        }
    }

    pub fn has_interests(&self) -> bool {
        self.interests_count > 0
    }
}
