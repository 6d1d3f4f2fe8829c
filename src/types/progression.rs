//! Achievement and rank types
//!
//! Both are derived data: the progression calculator rebuilds them from the
//! ledger and the wallet on every pass. Completion and tier are therefore
//! computed from their inputs, never stored on their own.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::wallet::UserId;

/// Rank tiers in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Progress of one user towards one catalog title
#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub user: UserId,
    pub title: String,
    pub description: String,
    pub icon: String,
    /// May exceed `max_progress`; the maximum is a completion threshold, not a cap
    pub progress: Decimal,
    pub max_progress: Decimal,
}

impl Achievement {
    pub fn is_completed(&self) -> bool {
        self.progress >= self.max_progress
    }
}

impl Serialize for Achievement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Achievement", 7)?;
        state.serialize_field("user", &self.user)?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("icon", &self.icon)?;
        state.serialize_field("progress", &self.progress)?;
        state.serialize_field("max_progress", &self.max_progress)?;
        state.serialize_field("is_completed", &self.is_completed())?;
        state.end()
    }
}

/// Rank of a user
///
/// Only [`crate::core::catalog::RankThresholds::rank_for`] builds one, so
/// `tier` and `next_tier_points` always agree with `points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRank {
    user: UserId,
    tier: RankTier,
    points: u64,
    /// Upper bound of the current bracket; `None` at the top tier
    next_tier_points: Option<u64>,
}

impl UserRank {
    pub(crate) fn new(
        user: &str,
        tier: RankTier,
        points: u64,
        next_tier_points: Option<u64>,
    ) -> Self {
        UserRank {
            user: user.to_string(),
            tier,
            points,
            next_tier_points,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn tier(&self) -> RankTier {
        self.tier
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn next_tier_points(&self) -> Option<u64> {
        self.next_tier_points
    }
}

/// Everything the calculator derives for one user in one pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progression {
    pub user: UserId,
    pub achievements: Vec<Achievement>,
    pub rank: UserRank,
    /// Ledger revision of the user the snapshot was derived from
    pub revision: u64,
    pub computed_at: DateTime<Utc>,
}

impl Progression {
    pub fn achievement(&self, title: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.title == title)
    }

    pub fn completed_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.is_completed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    fn achievement(progress: Decimal, max_progress: Decimal) -> Achievement {
        Achievement {
            user: "alice".to_string(),
            title: "Early Bird".to_string(),
            description: "Complete 10 transactions before 9 AM".to_string(),
            icon: "zap".to_string(),
            progress,
            max_progress,
        }
    }

    #[test]
    fn test_completion_follows_progress() {
        assert!(!achievement(dec!(9), dec!(10)).is_completed());
        assert!(achievement(dec!(10), dec!(10)).is_completed());
        assert!(achievement(dec!(11), dec!(10)).is_completed());
    }

    #[test]
    fn test_serialized_achievement_carries_completion() {
        let json = serde_json::to_value(achievement(dec!(11), dec!(10))).unwrap();

        assert_eq!(json["is_completed"], true);
        assert_eq!(json["title"], "Early Bird");
    }

    #[test]
    fn test_tiers_are_ordered() {
        assert!(RankTier::Bronze < RankTier::Silver);
        assert!(RankTier::Platinum < RankTier::Diamond);
    }
}
