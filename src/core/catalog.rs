//! Static progression tables
//!
//! The achievement catalog, the rank thresholds and the points policy are
//! plain values handed to the calculator at construction. The `Default`
//! impls hold the production tables; tests build alternate ones.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::{RankTier, UserRank};

pub const FIRST_TRANSACTION: &str = "First Transaction";
pub const BIG_SPENDER: &str = "Big Spender";
pub const SAVINGS_MASTER: &str = "Savings Master";
pub const EARLY_BIRD: &str = "Early Bird";

/// How an achievement's progress is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementRule {
    /// 1 if any completed purchase exists, else 0
    FirstPurchase,
    /// Sum of completed purchase amounts
    TotalSpent,
    /// Current wallet balance; can go down
    CurrentBalance,
    /// Completed purchases whose local time is before `before_hour`
    EarlyPurchases { before_hour: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AchievementDefinition {
    pub title: String,
    pub description: String,
    pub icon: String,
    pub max_progress: Decimal,
    pub rule: AchievementRule,
}

impl AchievementDefinition {
    pub fn new(
        title: &str,
        description: &str,
        icon: &str,
        max_progress: Decimal,
        rule: AchievementRule,
    ) -> Self {
        AchievementDefinition {
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            max_progress,
            rule,
        }
    }
}

/// Ordered set of achievement definitions
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
}

impl AchievementCatalog {
    pub fn new(definitions: Vec<AchievementDefinition>) -> Self {
        AchievementCatalog { definitions }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AchievementDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for AchievementCatalog {
    fn default() -> Self {
        AchievementCatalog::new(vec![
            AchievementDefinition::new(
                FIRST_TRANSACTION,
                "Complete your first transaction",
                "credit-card",
                Decimal::ONE,
                AchievementRule::FirstPurchase,
            ),
            AchievementDefinition::new(
                BIG_SPENDER,
                "Spend over 10,000 Taka",
                "wallet",
                Decimal::from(10_000),
                AchievementRule::TotalSpent,
            ),
            AchievementDefinition::new(
                SAVINGS_MASTER,
                "Maintain a wallet balance of 50,000 Taka",
                "star",
                Decimal::from(50_000),
                AchievementRule::CurrentBalance,
            ),
            AchievementDefinition::new(
                EARLY_BIRD,
                "Complete 10 transactions before 9 AM",
                "zap",
                Decimal::from(10),
                AchievementRule::EarlyPurchases { before_hour: 9 },
            ),
        ])
    }
}

/// Ascending lower bounds of each tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankThresholds {
    brackets: Vec<(RankTier, u64)>,
}

impl RankThresholds {
    /// Build a table from `(tier, lower bound)` pairs
    ///
    /// Returns `None` unless the table starts at 0 and both tiers and bounds
    /// strictly increase.
    pub fn new(brackets: Vec<(RankTier, u64)>) -> Option<Self> {
        let starts_at_zero = brackets.first().map(|(_, lower)| *lower == 0)?;
        let ascending = brackets
            .windows(2)
            .all(|pair| pair[0].0 < pair[1].0 && pair[0].1 < pair[1].1);

        (starts_at_zero && ascending).then_some(RankThresholds { brackets })
    }

    /// Tier and next threshold for a points total
    pub fn rank_for(&self, user: &str, points: u64) -> UserRank {
        let position = self
            .brackets
            .iter()
            .rposition(|(_, lower)| points >= *lower)
            .unwrap_or(0);
        let tier = self.brackets[position].0;
        let next = self.brackets.get(position + 1).map(|(_, lower)| *lower);

        UserRank::new(user, tier, points, next)
    }
}

impl Default for RankThresholds {
    fn default() -> Self {
        RankThresholds {
            brackets: vec![
                (RankTier::Bronze, 0),
                (RankTier::Silver, 1_000),
                (RankTier::Gold, 5_000),
                (RankTier::Platinum, 15_000),
                (RankTier::Diamond, 50_000),
            ],
        }
    }
}

/// Rank points formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsPolicy {
    pub per_completed_achievement: u64,
    /// Spending is counted in whole steps of this size
    pub spend_step: Decimal,
    pub per_spend_step: u64,
}

impl PointsPolicy {
    pub fn points(&self, completed_achievements: usize, total_spent: Decimal) -> u64 {
        let achievement_points =
            (completed_achievements as u64).saturating_mul(self.per_completed_achievement);

        let steps = if self.spend_step > Decimal::ZERO && total_spent > Decimal::ZERO {
            (total_spent / self.spend_step).floor().to_u64().unwrap_or(u64::MAX)
        } else {
            0
        };

        achievement_points.saturating_add(steps.saturating_mul(self.per_spend_step))
    }
}

impl Default for PointsPolicy {
    fn default() -> Self {
        PointsPolicy {
            per_completed_achievement: 250,
            spend_step: Decimal::from(1_000),
            per_spend_step: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::dec;

    #[test]
    fn test_default_catalog_titles() {
        let catalog = AchievementCatalog::default();
        let titles: Vec<_> = catalog.iter().map(|d| d.title.as_str()).collect();

        assert_eq!(titles, vec![FIRST_TRANSACTION, BIG_SPENDER, SAVINGS_MASTER, EARLY_BIRD]);
        assert_eq!(catalog.len(), 4);
    }

    #[rstest]
    #[case::zero(0, RankTier::Bronze, Some(1_000))]
    #[case::below_silver(999, RankTier::Bronze, Some(1_000))]
    #[case::silver(1_000, RankTier::Silver, Some(5_000))]
    #[case::gold(5_000, RankTier::Gold, Some(15_000))]
    #[case::top_of_gold(14_999, RankTier::Gold, Some(15_000))]
    #[case::platinum(15_000, RankTier::Platinum, Some(50_000))]
    #[case::diamond(50_000, RankTier::Diamond, None)]
    #[case::far_above(9_000_000, RankTier::Diamond, None)]
    fn test_rank_brackets(
        #[case] points: u64,
        #[case] tier: RankTier,
        #[case] next: Option<u64>,
    ) {
        let rank = RankThresholds::default().rank_for("alice", points);

        assert_eq!(rank.tier(), tier);
        assert_eq!(rank.points(), points);
        assert_eq!(rank.next_tier_points(), next);
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::not_from_zero(vec![(RankTier::Bronze, 10)])]
    #[case::descending_bounds(vec![(RankTier::Bronze, 0), (RankTier::Silver, 0)])]
    #[case::tiers_out_of_order(vec![(RankTier::Silver, 0), (RankTier::Bronze, 100)])]
    fn test_invalid_thresholds(#[case] brackets: Vec<(RankTier, u64)>) {
        assert!(RankThresholds::new(brackets).is_none());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds =
            RankThresholds::new(vec![(RankTier::Bronze, 0), (RankTier::Gold, 10)]).unwrap();

        assert_eq!(thresholds.rank_for("a", 9).tier(), RankTier::Bronze);
        assert_eq!(thresholds.rank_for("a", 10).tier(), RankTier::Gold);
        assert_eq!(thresholds.rank_for("a", 10).next_tier_points(), None);
    }

    #[rstest]
    #[case::nothing(0, dec!(0), 0)]
    #[case::below_step(0, dec!(999.99), 0)]
    #[case::one_step(0, dec!(1000), 10)]
    #[case::steps_floor(0, dec!(10500), 100)]
    #[case::achievements_only(2, dec!(0), 500)]
    #[case::both(3, dec!(12000), 870)]
    fn test_points_formula(
        #[case] completed: usize,
        #[case] spent: Decimal,
        #[case] expected: u64,
    ) {
        assert_eq!(PointsPolicy::default().points(completed, spent), expected);
    }
}
