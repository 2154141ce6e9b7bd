//! Inactivity decay.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{DAYS_PER_WEEK, DECAY_PER_WEEK};

/// How the decay was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayBreakdown {
    /// Normalized (UTC) last-activity time, when one could be parsed.
    pub last_active_at: Option<DateTime<Utc>>,
    /// A timestamp was present but could not be parsed; treated as absent.
    pub last_active_unparseable: bool,
    /// Whole days between last activity and the reference time (never negative).
    pub days_inactive: Option<i64>,
    pub weeks_inactive: i64,
    pub applied: f64,
}

/// Parse a last-activity timestamp into UTC.
///
/// Accepted shapes: RFC 3339 (`Z` or numeric offset), naive date-times with
/// `T` or space separators (taken as UTC), and bare `YYYY-MM-DD` dates
/// (midnight UTC). Returns `None` for anything else.
pub fn parse_last_active(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days elapsed since `last_active`. Future timestamps count as zero.
pub fn days_inactive(last_active: DateTime<Utc>, reference: DateTime<Utc>) -> i64 {
    (reference - last_active).num_days().max(0)
}

/// Decay for a raw last-activity value.
///
/// Unknown recency is not penalized: an absent or unparseable timestamp yields
/// zero decay.
pub fn inactivity_decay(last_active_raw: Option<&str>, reference: DateTime<Utc>) -> DecayBreakdown {
    let raw = last_active_raw.map(str::trim).filter(|raw| !raw.is_empty());
    let parsed = raw.and_then(parse_last_active);

    let days = parsed.map(|at| days_inactive(at, reference));
    let weeks = days.map_or(0, |d| d / DAYS_PER_WEEK);

    DecayBreakdown {
        last_active_at: parsed,
        last_active_unparseable: raw.is_some() && parsed.is_none(),
        days_inactive: days,
        weeks_inactive: weeks,
        applied: weeks as f64 * DECAY_PER_WEEK,
    }
}
