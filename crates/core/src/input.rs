//! Normalization of loosely-typed profile payloads.
//!
//! Profile writers are not consistent about field names or types: `interests`
//! may be a flag or a count, `bio` may be a flag or the bio text itself, and
//! numeric fields may be missing, `null`, fractional (`4.0`) or quoted
//! (`"4"`). [`UserInput`] accepts all of those
//! shapes and [`UserInput::into_snapshot`] produces a canonical [`UserSnapshot`].

use serde::{Deserialize, Deserializer, de};

use crate::error::DomainResult;
use crate::id::UserId;
use crate::snapshot::UserSnapshot;

/// Interest count assumed when a writer only sends `interests: true`.
pub const INTERESTS_FLAG_COUNT: i64 = 5;

/// `interests` as sent by writers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InterestsInput {
    Flag(bool),
    Count(i64),
}

impl InterestsInput {
    /// Magnitude preserved for storage; negative counts collapse to zero.
    pub fn count(&self) -> i64 {
        match self {
            InterestsInput::Flag(true) => INTERESTS_FLAG_COUNT,
            InterestsInput::Flag(false) => 0,
            InterestsInput::Count(n) => (*n).max(0),
        }
    }
}

/// `bio` as sent by writers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BioInput {
    Flag(bool),
    Filled(i64),
    Text(String),
}

impl BioInput {
    pub fn is_present(&self) -> bool {
        match self {
            BioInput::Flag(flag) => *flag,
            BioInput::Filled(n) => *n != 0,
            BioInput::Text(text) => !text.trim().is_empty(),
        }
    }
}

/// A counter as sent by writers. Fractions are truncated toward zero.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LooseInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseInt {
    fn to_i64(&self) -> Option<i64> {
        match self {
            LooseInt::Int(n) => Some(*n),
            LooseInt::Float(f) => truncate(*f),
            LooseInt::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(truncate))
            }
        }
    }
}

fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

fn loose_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LooseInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => raw
            .to_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected a whole number, got {raw:?}"))),
    }
}

/// A profile write as received from upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    pub user_id: String,
    #[serde(default, deserialize_with = "loose_count")]
    pub photos: Option<i64>,
    #[serde(default, alias = "bio_filled")]
    pub bio: Option<BioInput>,
    #[serde(default, alias = "interests_count")]
    pub interests: Option<InterestsInput>,
    #[serde(default)]
    pub selfie_verified: Option<bool>,
    #[serde(default)]
    pub id_verified: Option<bool>,
    #[serde(default, alias = "login_streak", deserialize_with = "loose_count")]
    pub login_streak_days: Option<i64>,
    #[serde(default, alias = "response_rate", deserialize_with = "loose_count")]
    pub response_rate_pct: Option<i64>,
    #[serde(default, alias = "reports_count", deserialize_with = "loose_count")]
    pub reports_received: Option<i64>,
    #[serde(default)]
    pub last_active_at: Option<String>,
}

impl UserInput {
    /// Parse a JSON payload.
    pub fn from_json(value: serde_json::Value) -> DomainResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| crate::error::DomainError::validation(format!("user payload: {e}")))
    }

    /// Normalize into the canonical snapshot. Fails only on a blank user id.
    pub fn into_snapshot(self) -> DomainResult<UserSnapshot> {
        let user_id = UserId::new(self.user_id)?;
        let last_active_at = self
            .last_active_at
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());

        Ok(UserSnapshot {
            user_id,
            photos: self.photos.unwrap_or(0),
            bio_present: self.bio.as_ref().is_some_and(BioInput::is_present),
            interests_count: self.interests.as_ref().map_or(0, InterestsInput::count),
            selfie_verified: self.selfie_verified.unwrap_or(false),
            id_verified: self.id_verified.unwrap_or(false),
            login_streak_days: self.login_streak_days.unwrap_or(0),
            response_rate_pct: self.response_rate_pct.unwrap_or(0),
            reports_received: self.reports_received.unwrap_or(0),
            last_active_at,
        })
    }
}
