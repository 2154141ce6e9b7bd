//! Component calculators: profile, verification, activity.

use serde::{Deserialize, Serialize};

use trustscore_core::UserSnapshot;

use crate::policy::*;
use crate::round2;

/// Profile completeness points (0..=30).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileBreakdown {
    pub photos_points: f64,
    pub bio_points: f64,
    pub interests_points: f64,
    pub total: f64,
}

/// Verification points (0..=40).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationBreakdown {
    pub selfie_points: f64,
    pub id_points: f64,
    pub total: f64,
}

/// Activity points (-8..=30). The penalty is stored as a non-positive number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityBreakdown {
    pub streak_score: f64,
    pub response_score: f64,
    pub reports_penalty: f64,
    pub total: f64,
}

/// Photos scale linearly up to the cap; bio and interests are flat.
///
/// Interests only count by presence: any positive count earns the flat points.
pub fn profile_score(user: &UserSnapshot) -> ProfileBreakdown {
    let photos = user.photos.clamp(0, PHOTOS_CAP) as f64;
    let photos_points = photos / PHOTOS_CAP as f64 * PHOTOS_MAX_POINTS;
    let bio_points = if user.bio_present { BIO_POINTS } else { 0.0 };
    let interests_points = if user.has_interests() {
        INTERESTS_POINTS
    } else {
        0.0
    };

    let total = (photos_points + bio_points + interests_points).clamp(0.0, PROFILE_MAX);

    ProfileBreakdown {
        photos_points: round2(photos_points),
        bio_points,
        interests_points,
        total: round2(total),
    }
}

pub fn verification_score(user: &UserSnapshot) -> VerificationBreakdown {
    let selfie_points = if user.selfie_verified { SELFIE_POINTS } else { 0.0 };
    let id_points = if user.id_verified { ID_POINTS } else { 0.0 };

    VerificationBreakdown {
        selfie_points,
        id_points,
        total: round2((selfie_points + id_points).clamp(0.0, VERIFICATION_MAX)),
    }
}

/// Login streak (capped at 30 days) and response rate add, reports subtract.
///
/// The lower bound lets this component go negative on its own; the raw total
/// is clamped again by the engine.
pub fn activity_score(user: &UserSnapshot) -> ActivityBreakdown {
    let streak_days = user.login_streak_days.clamp(0, STREAK_CAP_DAYS) as f64;
    let streak_score = streak_days / STREAK_CAP_DAYS as f64 * STREAK_MAX_POINTS;

    let response = user.response_rate_pct.clamp(0, 100) as f64;
    let response_score = response / 100.0 * RESPONSE_MAX_POINTS;

    let reports = user.reports_received.clamp(0, REPORTS_CAP) as f64;
    let reports_penalty = -(reports / REPORTS_CAP as f64) * ACTIVITY_REPORTS_PENALTY_MAX;

    let total = (streak_score + response_score + reports_penalty).clamp(ACTIVITY_MIN, ACTIVITY_MAX);

    ActivityBreakdown {
        streak_score: round2(streak_score),
        response_score: round2(response_score),
        reports_penalty: round2(reports_penalty),
        total: round2(total),
    }
}
