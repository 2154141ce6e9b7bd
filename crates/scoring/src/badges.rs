//! Badge assignment.

use serde::{Deserialize, Serialize};

use trustscore_core::UserSnapshot;

use crate::policy::{
    ACTIVE_DATER_MIN_SCORE, ACTIVE_DATER_RECENT_DAYS, TRUSTED_MEMBER_MIN_SCORE,
    VERIFIED_USER_MIN_SCORE,
};

/// Qualitative labels derived from the final score and raw attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Badge {
    #[serde(rename = "Verified User")]
    VerifiedUser,
    #[serde(rename = "Trusted Member")]
    TrustedMember,
    #[serde(rename = "Active Dater")]
    ActiveDater,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::VerifiedUser => "Verified User",
            Badge::TrustedMember => "Trusted Member",
            Badge::ActiveDater => "Active Dater",
        }
    }
}

impl core::fmt::Display for Badge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Evaluate every badge independently against the final score.
///
/// `days_inactive` is `None` when recency is unknown, which rules out
/// "Active Dater".
pub fn assign_badges(
    user: &UserSnapshot,
    final_score: f64,
    days_inactive: Option<i64>,
) -> Vec<Badge> {
    let mut badges = Vec::new();

    if user.id_verified && final_score >= VERIFIED_USER_MIN_SCORE {
        badges.push(Badge::VerifiedUser);
    }

    if final_score >= TRUSTED_MEMBER_MIN_SCORE {
        badges.push(Badge::TrustedMember);
    }

    let recent = days_inactive.is_some_and(|days| days <= ACTIVE_DATER_RECENT_DAYS);
    if final_score >= ACTIVE_DATER_MIN_SCORE && recent {
        badges.push(Badge::ActiveDater);
    }

    badges
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustscore_core::UserId;

    fn user(id_verified: bool) -> UserSnapshot {
        UserSnapshot {
            id_verified,
            ..UserSnapshot::new(UserId::new("u").unwrap())
        }
    }

    #[test]
    fn verified_user_needs_id_verification() {
        assert!(!assign_badges(&user(false), 99.0, Some(0)).contains(&Badge::VerifiedUser));
        assert!(assign_badges(&user(true), 85.0, Some(0)).contains(&Badge::VerifiedUser));
        assert!(!assign_badges(&user(true), 84.99, Some(0)).contains(&Badge::VerifiedUser));
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(assign_badges(&user(false), 70.0, None), vec![Badge::TrustedMember]);
        assert_eq!(assign_badges(&user(false), 60.0, Some(7)), vec![Badge::ActiveDater]);
        assert!(assign_badges(&user(false), 59.99, Some(0)).is_empty());
    }

    #[test]
    fn active_dater_requires_known_recent_activity() {
        assert!(assign_badges(&user(false), 65.0, None).is_empty());
        assert!(assign_badges(&user(false), 65.0, Some(8)).is_empty());
    }

    #[test]
    fn badges_serialize_as_labels() {
        let json = serde_json::to_string(&[Badge::VerifiedUser, Badge::ActiveDater]).unwrap();
        assert_eq!(json, r#"["Verified User","Active Dater"]"#);
    }
}
