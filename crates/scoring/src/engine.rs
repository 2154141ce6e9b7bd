//! Score orchestration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trustscore_core::{UserId, UserSnapshot};

use crate::badges::{Badge, assign_badges};
use crate::components::{
    ActivityBreakdown, ProfileBreakdown, VerificationBreakdown, activity_score, profile_score,
    verification_score,
};
use crate::decay::{DecayBreakdown, inactivity_decay};
use crate::policy::MAX_SCORE;
use crate::round2;

/// Everything needed to reconstruct an audit entry for one computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub reference_time: DateTime<Utc>,
    pub profile: ProfileBreakdown,
    pub verification: VerificationBreakdown,
    pub activity: ActivityBreakdown,
    pub raw_total: f64,
    pub decay: DecayBreakdown,
    pub final_score: f64,
    pub badges: Vec<Badge>,
    /// The snapshot the score was computed from.
    pub inputs: UserSnapshot,
}

impl ScoreBreakdown {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Result of [`compute_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub user_id: UserId,
    pub profile_score: f64,
    pub verification_score: f64,
    pub activity_score: f64,
    pub raw_total: f64,
    pub decay_applied: f64,
    pub final_score: f64,
    pub badges: Vec<Badge>,
    pub breakdown: ScoreBreakdown,
}

/// Compute a user's trust score as of `reference`.
///
/// Pure and total: identical inputs always produce identical output.
pub fn compute_score(user: &UserSnapshot, reference: DateTime<Utc>) -> ScoreResult {
    let profile = profile_score(user);
    let verification = verification_score(user);
    let activity = activity_score(user);

    let raw_total =
        round2((profile.total + verification.total + activity.total).clamp(0.0, MAX_SCORE));

    let decay = inactivity_decay(user.last_active_at.as_deref(), reference);
    let final_score = round2((raw_total - decay.applied).clamp(0.0, MAX_SCORE));

    let badges = assign_badges(user, final_score, decay.days_inactive);

    ScoreResult {
        user_id: user.user_id.clone(),
        profile_score: profile.total,
        verification_score: verification.total,
        activity_score: activity.total,
        raw_total,
        decay_applied: decay.applied,
        final_score,
        badges: badges.clone(),
        breakdown: ScoreBreakdown {
            reference_time: reference,
            profile,
            verification,
            activity,
            raw_total,
            decay,
            final_score,
            badges,
            inputs: user.clone(),
        },
    }
}
