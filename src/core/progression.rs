//! Achievement and rank recomputation
//!
//! Progression is rebuilt from scratch on every pass: the completed purchases
//! in the ledger and the current wallet balance go in, a full [`Progression`]
//! comes out. Nothing is incremented, so running a pass twice over the same
//! ledger yields the same result and a missed or repeated trigger cannot
//! drift the numbers.
//!
//! Each stored snapshot remembers the ledger revision it was derived from.
//! A read whose revision no longer matches the ledger recomputes first, which
//! is how a pass that failed after a commit gets repaired.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::catalog::{AchievementCatalog, AchievementRule, PointsPolicy, RankThresholds};
use super::traits::{Clock, ProgressionStore, SnapshotSaved, TransactionLedger, WalletStore};
use crate::types::{Achievement, Progression, Transaction, UserId, WalletError};

/// Everything that parameterises a pass besides the data itself
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionRules {
    pub catalog: AchievementCatalog,
    pub thresholds: RankThresholds,
    pub points: PointsPolicy,
    /// Zone in which "before 9 AM" is evaluated
    pub timezone: Tz,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        ProgressionRules {
            catalog: AchievementCatalog::default(),
            thresholds: RankThresholds::default(),
            points: PointsPolicy::default(),
            timezone: chrono_tz::Asia::Dhaka,
        }
    }
}

/// Derive a user's progression from their transactions and balance
///
/// Pure: the same inputs always give the same output.
pub fn derive_progression(
    rules: &ProgressionRules,
    user: &str,
    transactions: &[Transaction],
    balance: Decimal,
    revision: u64,
    computed_at: DateTime<Utc>,
) -> Progression {
    let purchases: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.is_completed_purchase())
        .collect();
    let total_spent: Decimal = purchases.iter().map(|tx| tx.amount).sum();

    let achievements: Vec<Achievement> = rules
        .catalog
        .iter()
        .map(|definition| {
            let progress = match definition.rule {
                AchievementRule::FirstPurchase => {
                    if purchases.is_empty() {
                        Decimal::ZERO
                    } else {
                        Decimal::ONE
                    }
                }
                AchievementRule::TotalSpent => total_spent,
                AchievementRule::CurrentBalance => balance,
                AchievementRule::EarlyPurchases { before_hour } => {
                    let early = purchases
                        .iter()
                        .filter(|tx| tx.created_at.with_timezone(&rules.timezone).hour() < before_hour)
                        .count();
                    Decimal::from(early)
                }
            };

            Achievement {
                user: user.to_string(),
                title: definition.title.clone(),
                description: definition.description.clone(),
                icon: definition.icon.clone(),
                progress,
                max_progress: definition.max_progress,
            }
        })
        .collect();

    let completed = achievements.iter().filter(|a| a.is_completed()).count();
    let points = rules.points.points(completed, total_spent);

    Progression {
        user: user.to_string(),
        achievements,
        rank: rules.thresholds.rank_for(user, points),
        revision,
        computed_at,
    }
}

/// Outcome of one recomputation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Recomputed {
    pub progression: Progression,
    /// Titles that were not completed before this pass and are now
    pub newly_completed: Vec<String>,
}

/// Recomputes and serves progression snapshots
pub struct ProgressionCalculator {
    rules: ProgressionRules,
    ledger: Arc<dyn TransactionLedger>,
    wallets: Arc<dyn WalletStore>,
    store: Arc<dyn ProgressionStore>,
    clock: Arc<dyn Clock>,
}

impl ProgressionCalculator {
    pub fn new(
        rules: ProgressionRules,
        ledger: Arc<dyn TransactionLedger>,
        wallets: Arc<dyn WalletStore>,
        store: Arc<dyn ProgressionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ProgressionCalculator {
            rules,
            ledger,
            wallets,
            store,
            clock,
        }
    }

    pub fn rules(&self) -> &ProgressionRules {
        &self.rules
    }

    /// Rebuild and store the progression of `user`
    pub fn recompute(&self, user: &str) -> Result<Recomputed, WalletError> {
        // read the revision before the data, so the label is never newer than the data
        let revision = self.ledger.revision(user);
        let transactions = self.ledger.list_for_user(user)?;
        let balance = self.wallets.get(user)?.balance;

        let progression = derive_progression(
            &self.rules,
            user,
            &transactions,
            balance,
            revision,
            self.clock.now(),
        );

        // flips are judged against the snapshot this save actually replaced
        let newly_completed: Vec<String> = match self.store.save(progression.clone())? {
            SnapshotSaved::Replaced(previous) => progression
                .achievements
                .iter()
                .filter(|a| a.is_completed())
                .filter(|a| {
                    !previous
                        .as_ref()
                        .and_then(|p| p.achievement(&a.title))
                        .is_some_and(|before| before.is_completed())
                })
                .map(|a| a.title.clone())
                .collect(),
            SnapshotSaved::Superseded => {
                tracing::debug!(user, revision, "newer progression already stored");
                Vec::new()
            }
        };
        tracing::debug!(
            user,
            revision,
            points = progression.rank.points(),
            tier = ?progression.rank.tier(),
            "progression recomputed"
        );

        Ok(Recomputed {
            progression,
            newly_completed,
        })
    }

    /// Current progression, recomputed first if missing or stale
    pub fn snapshot(&self, user: &str) -> Result<Progression, WalletError> {
        if let Some(stored) = self.store.load(user)? {
            if stored.revision == self.ledger.revision(user) {
                return Ok(stored);
            }
        }
        Ok(self.recompute(user)?.progression)
    }
}

/// Thread-safe progression store backed by `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryProgressionStore {
    snapshots: DashMap<UserId, Progression>,
}

impl InMemoryProgressionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressionStore for InMemoryProgressionStore {
    fn load(&self, user: &str) -> Result<Option<Progression>, WalletError> {
        Ok(self.snapshots.get(user).map(|entry| entry.value().clone()))
    }

    fn save(&self, progression: Progression) -> Result<SnapshotSaved, WalletError> {
        match self.snapshots.entry(progression.user.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(progression);
                Ok(SnapshotSaved::Replaced(None))
            }
            // a slower pass over an older revision must not overwrite a newer one
            Entry::Occupied(slot) if slot.get().revision > progression.revision => {
                Ok(SnapshotSaved::Superseded)
            }
            Entry::Occupied(mut slot) => Ok(SnapshotSaved::Replaced(Some(slot.insert(progression)))),
        }
    }
}
