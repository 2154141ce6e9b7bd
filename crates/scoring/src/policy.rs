//! Scoring weights, caps and thresholds.

pub const MAX_SCORE: f64 = 100.0;

// Component caps.
pub const PROFILE_MAX: f64 = 30.0;
pub const VERIFICATION_MAX: f64 = 40.0;
pub const ACTIVITY_MAX: f64 = 30.0;
/// Lower bound of the activity component (all penalty, no activity).
pub const ACTIVITY_MIN: f64 = -ACTIVITY_REPORTS_PENALTY_MAX;

// Profile.
pub const PHOTOS_CAP: i64 = 6;
pub const PHOTOS_MAX_POINTS: f64 = 20.0;
pub const BIO_POINTS: f64 = 5.0;
pub const INTERESTS_POINTS: f64 = 5.0;

// Verification.
pub const SELFIE_POINTS: f64 = 20.0;
pub const ID_POINTS: f64 = 20.0;

// Activity.
pub const STREAK_CAP_DAYS: i64 = 30;
pub const STREAK_MAX_POINTS: f64 = 20.0;
pub const RESPONSE_MAX_POINTS: f64 = 10.0;
pub const REPORTS_CAP: i64 = 5;
pub const ACTIVITY_REPORTS_PENALTY_MAX: f64 = 8.0;

// Decay.
pub const DECAY_PER_WEEK: f64 = 5.0;
pub const DAYS_PER_WEEK: i64 = 7;

// Badges.
pub const VERIFIED_USER_MIN_SCORE: f64 = 85.0;
pub const TRUSTED_MEMBER_MIN_SCORE: f64 = 70.0;
pub const ACTIVE_DATER_MIN_SCORE: f64 = 60.0;
pub const ACTIVE_DATER_RECENT_DAYS: i64 = 7;
