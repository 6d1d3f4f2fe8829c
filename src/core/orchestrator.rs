//! Transaction orchestration
//!
//! `TransactionOrchestrator` runs every money-moving operation through the
//! same shape:
//!
//! ```text
//! validate -> authorize -> insert pending row -> finalize(effect) -> hooks
//! ```
//!
//! Validation and authorization failures leave no trace. Once a row exists it
//! always reaches a terminal status, either here, on a gateway callback or
//! through the expiry sweep. The balance effect of a row only ever runs inside
//! [`TransactionLedger::finalize`], so a debit or credit happens at most once
//! per transaction no matter how many callers race to settle it.
//!
//! Hooks (progression, notifications) run after the commit. Their failures
//! are logged and never reverse a transaction.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::hooks::{CommitEvent, NotificationHook, PostCommitHook, ProgressionHook};
use super::ledger::InMemoryLedger;
use super::progression::{InMemoryProgressionStore, ProgressionCalculator, ProgressionRules};
use super::traits::{Clock, Finalized, ProgressionStore, SystemClock, TransactionLedger, WalletStore};
use super::wallet_store::InMemoryWalletStore;
use crate::collaborators::{
    CheckoutSession, CredentialVerifier, NotificationSink, PaymentGateway, PinDirectory,
    SandboxGateway, SessionOutcome, TracingSink,
};
use crate::types::{
    validate_amount, Category, DebitOutcome, GatewayReport, Progression, TopUpMethod,
    Transaction, TransactionId, TransactionStatus, UserId, Wallet, WalletError,
};

/// Tunables of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Smallest accepted top-up
    pub topup_minimum: Decimal,
    /// Age after which a pending transaction is failed by the sweep
    pub pending_expiry: Duration,
    /// History page size when the caller gives none
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            topup_minimum: Decimal::from(100),
            pending_expiry: Duration::minutes(30),
            history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    pub user: UserId,
    pub category: Category,
    pub amount: Decimal,
    pub description: Option<String>,
    pub pin: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseReceipt {
    pub transaction: Transaction,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopUpRequest {
    pub user: UserId,
    pub amount: Decimal,
    pub method: TopUpMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopUpReceipt {
    /// Funds are already in the wallet
    Credited {
        transaction: Transaction,
        balance: Decimal,
    },
    /// The user must finish paying at the gateway
    AwaitingGateway {
        transaction: Transaction,
        checkout: CheckoutSession,
    },
}

impl TopUpReceipt {
    pub fn transaction(&self) -> &Transaction {
        match self {
            TopUpReceipt::Credited { transaction, .. }
            | TopUpReceipt::AwaitingGateway { transaction, .. } => transaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub transaction: Transaction,
    pub balance: Decimal,
    /// The transaction was already terminal; nothing changed
    pub replayed: bool,
}

/// Entry point for every wallet operation
pub struct TransactionOrchestrator {
    wallets: Arc<dyn WalletStore>,
    ledger: Arc<dyn TransactionLedger>,
    progression: Arc<ProgressionCalculator>,
    identity: Arc<dyn CredentialVerifier>,
    gateway: Arc<dyn PaymentGateway>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl TransactionOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn progression(&self) -> &ProgressionCalculator {
        &self.progression
    }

    /// Open a wallet and seed its progression
    pub fn register_user(&self, user: &str) -> Result<Wallet, WalletError> {
        let wallet = self.wallets.open(user, self.clock.now())?;
        if let Err(e) = self.progression.recompute(user) {
            warn!(user, error = %e, "initial progression pass failed");
        }
        info!(user, "wallet opened");
        Ok(wallet)
    }

    #[tracing::instrument(
        skip_all,
        fields(user = %request.user, category = %request.category, amount = %request.amount)
    )]
    pub async fn submit_purchase(
        &self,
        request: PurchaseRequest,
    ) -> Result<PurchaseReceipt, WalletError> {
        validate_amount(request.amount)?;
        if !self
            .identity
            .verify_credential(&request.user, &request.pin)
            .await?
        {
            warn!("purchase rejected: invalid credential");
            return Err(WalletError::InvalidCredential);
        }
        self.wallets.get(&request.user)?;

        let now = self.clock.now();
        let tx = Transaction::purchase(
            &request.user,
            request.category,
            request.amount,
            request.description,
            now,
        );
        let id = tx.id;
        self.ledger.insert(tx)?;

        let wallets = &self.wallets;
        let mut balance = Decimal::ZERO;
        let settled = self
            .ledger
            .finalize(id, TransactionStatus::Completed, now, &mut |tx| {
                match wallets.debit_if_sufficient(&tx.user, tx.amount, now)? {
                    DebitOutcome::Debited(after) => {
                        balance = after;
                        Ok(())
                    }
                    DebitOutcome::Insufficient(current) => Err(
                        WalletError::insufficient_balance(&tx.user, current, tx.amount),
                    ),
                }
            });

        match settled {
            Ok(Finalized::Applied(tx)) => {
                info!(transaction = %tx.id, %balance, "purchase completed");
                self.after_commit(CommitEvent {
                    transaction: tx.clone(),
                    balance,
                })
                .await;
                Ok(PurchaseReceipt {
                    transaction: tx,
                    balance,
                })
            }
            Ok(Finalized::AlreadyTerminal(tx)) => Err(Self::settled_elsewhere(&tx)),
            Err(e) => {
                self.abandon(id, &e).await;
                Err(e)
            }
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(user = %request.user, method = %request.method, amount = %request.amount)
    )]
    pub async fn submit_top_up(&self, request: TopUpRequest) -> Result<TopUpReceipt, WalletError> {
        validate_amount(request.amount)?;
        if request.amount < self.config.topup_minimum {
            return Err(WalletError::invalid_amount(
                request.amount,
                &format!("minimum top up amount is {}", self.config.topup_minimum),
            ));
        }
        if request.method == TopUpMethod::Mobile {
            return Err(WalletError::MethodUnavailable(request.method.to_string()));
        }
        self.wallets.get(&request.user)?;

        let tx = Transaction::deposit(
            &request.user,
            request.method,
            request.amount,
            self.clock.now(),
        );
        let id = tx.id;
        let amount = tx.amount;
        self.ledger.insert(tx)?;

        match request.method {
            TopUpMethod::Card => self.open_checkout(id, amount).await,
            _ => self.credit_now(id).await,
        }
    }

    async fn credit_now(&self, id: TransactionId) -> Result<TopUpReceipt, WalletError> {
        let now = self.clock.now();
        let wallets = &self.wallets;
        let mut balance = Decimal::ZERO;
        let settled = self
            .ledger
            .finalize(id, TransactionStatus::Completed, now, &mut |tx| {
                balance = wallets.credit(&tx.user, tx.amount, now)?;
                Ok(())
            });

        match settled {
            Ok(Finalized::Applied(tx)) => {
                info!(transaction = %tx.id, %balance, "top-up credited");
                self.after_commit(CommitEvent {
                    transaction: tx.clone(),
                    balance,
                })
                .await;
                Ok(TopUpReceipt::Credited {
                    transaction: tx,
                    balance,
                })
            }
            Ok(Finalized::AlreadyTerminal(tx)) => Err(Self::settled_elsewhere(&tx)),
            Err(e) => {
                self.abandon(id, &e).await;
                Err(e)
            }
        }
    }

    async fn open_checkout(
        &self,
        id: TransactionId,
        amount: Decimal,
    ) -> Result<TopUpReceipt, WalletError> {
        let checkout = match self.gateway.create_checkout_session(amount, id).await {
            Ok(checkout) => checkout,
            Err(e) => {
                self.abandon(id, &e).await;
                return Err(e);
            }
        };
        let transaction = self.ledger.attach_session(id, &checkout.session_ref)?;
        info!(transaction = %id, session = %checkout.session_ref, "checkout session opened");

        Ok(TopUpReceipt::AwaitingGateway {
            transaction,
            checkout,
        })
    }

    /// Settle a card top-up from a gateway callback
    ///
    /// A reported success is checked against the gateway before crediting.
    /// Callbacks for a transaction that is already terminal change nothing.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_gateway_callback(
        &self,
        id: TransactionId,
        report: GatewayReport,
    ) -> Result<Reconciliation, WalletError> {
        let tx = self.ledger.get(id)?;
        if !tx.awaits_gateway() {
            return Err(WalletError::NotReconcilable(id));
        }
        if tx.status.is_terminal() {
            debug!(status = %tx.status, "callback replay ignored");
            return Ok(Reconciliation {
                balance: self.current_balance(&tx.user),
                transaction: tx,
                replayed: true,
            });
        }

        let paid = match (report, tx.gateway_session.as_deref()) {
            (GatewayReport::Success, Some(session)) => {
                self.gateway.session_outcome(session).await? == SessionOutcome::Paid
            }
            _ => false,
        };
        if report == GatewayReport::Success && !paid {
            warn!("callback reported success but the gateway does not confirm payment");
        }

        let now = self.clock.now();
        let wallets = &self.wallets;
        let settled = if paid {
            self.ledger
                .finalize(id, TransactionStatus::Completed, now, &mut |tx| {
                    wallets.credit(&tx.user, tx.amount, now).map(|_| ())
                })?
        } else {
            self.ledger
                .finalize(id, TransactionStatus::Failed, now, &mut |_| Ok(()))?
        };

        let replayed = !settled.was_applied();
        let transaction = settled.transaction().clone();
        let balance = self.current_balance(&transaction.user);
        if replayed {
            warn!(status = %transaction.status, "transaction settled concurrently");
        } else {
            info!(status = %transaction.status, %balance, "card top-up reconciled");
            self.after_commit(CommitEvent {
                transaction: transaction.clone(),
                balance,
            })
            .await;
        }

        Ok(Reconciliation {
            transaction,
            balance,
            replayed,
        })
    }

    /// Fail every pending transaction older than the expiry window
    pub async fn expire_pending(&self) -> Result<Vec<Transaction>, WalletError> {
        let now = self.clock.now();
        let stale = self.ledger.pending_before(now - self.config.pending_expiry)?;

        let mut expired = Vec::with_capacity(stale.len());
        for id in stale {
            match self
                .ledger
                .finalize(id, TransactionStatus::Failed, now, &mut |_| Ok(()))
            {
                Ok(Finalized::Applied(tx)) => {
                    info!(transaction = %tx.id, user = %tx.user, "pending transaction expired");
                    self.after_commit(CommitEvent {
                        balance: self.current_balance(&tx.user),
                        transaction: tx.clone(),
                    })
                    .await;
                    expired.push(tx);
                }
                Ok(Finalized::AlreadyTerminal(_)) => {}
                Err(e) => warn!(transaction = %id, error = %e, "could not expire transaction"),
            }
        }
        Ok(expired)
    }

    pub fn balance(&self, user: &str) -> Result<Wallet, WalletError> {
        self.wallets.get(user)
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, WalletError> {
        self.ledger.get(id)
    }

    /// Transactions of a user, newest first
    pub fn history(&self, user: &str, limit: Option<usize>) -> Result<Vec<Transaction>, WalletError> {
        self.wallets.get(user)?;
        let mut transactions = self.ledger.list_for_user(user)?;
        transactions.reverse();
        transactions.truncate(limit.unwrap_or(self.config.history_limit));
        Ok(transactions)
    }

    /// Achievements and rank, never older than the ledger
    pub fn achievements(&self, user: &str) -> Result<Progression, WalletError> {
        self.wallets.get(user)?;
        self.progression.snapshot(user)
    }

    fn current_balance(&self, user: &str) -> Decimal {
        self.wallets
            .get(user)
            .map(|wallet| wallet.balance)
            .unwrap_or_default()
    }

    fn settled_elsewhere(tx: &Transaction) -> WalletError {
        warn!(transaction = %tx.id, status = %tx.status, "transaction settled before its effect ran");
        WalletError::Storage(format!("transaction {} is already {}", tx.id, tx.status))
    }

    /// Mark a row failed after its effect could not be applied
    async fn abandon(&self, id: TransactionId, cause: &WalletError) {
        match self
            .ledger
            .finalize(id, TransactionStatus::Failed, self.clock.now(), &mut |_| Ok(()))
        {
            Ok(Finalized::Applied(tx)) => {
                if cause.is_infrastructure() {
                    error!(transaction = %id, error = %cause, "transaction failed");
                } else {
                    info!(transaction = %id, reason = %cause, "transaction failed");
                }
                self.after_commit(CommitEvent {
                    balance: self.current_balance(&tx.user),
                    transaction: tx,
                })
                .await;
            }
            Ok(Finalized::AlreadyTerminal(_)) => {}
            Err(e) => error!(
                transaction = %id,
                error = %e,
                "could not mark transaction failed, left pending for the expiry sweep"
            ),
        }
    }

    async fn after_commit(&self, event: CommitEvent) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_commit(&event).await {
                warn!(
                    hook = hook.name(),
                    transaction = %event.transaction.id,
                    error = %e,
                    "post-commit hook failed"
                );
            }
        }
    }
}

/// Assembles a [`TransactionOrchestrator`]
///
/// Every collaborator left unset gets its in-memory or sandbox default.
#[derive(Default)]
pub struct OrchestratorBuilder {
    wallets: Option<Arc<dyn WalletStore>>,
    ledger: Option<Arc<dyn TransactionLedger>>,
    progression_store: Option<Arc<dyn ProgressionStore>>,
    identity: Option<Arc<dyn CredentialVerifier>>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
    rules: Option<ProgressionRules>,
    config: Option<EngineConfig>,
    extra_hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl OrchestratorBuilder {
    pub fn wallets(mut self, wallets: Arc<dyn WalletStore>) -> Self {
        self.wallets = Some(wallets);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn TransactionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn progression_store(mut self, store: Arc<dyn ProgressionStore>) -> Self {
        self.progression_store = Some(store);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn CredentialVerifier>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn rules(mut self, rules: ProgressionRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Run after the built-in progression and notification hooks
    pub fn hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.extra_hooks.push(hook);
        self
    }

    pub fn build(self) -> TransactionOrchestrator {
        let wallets = self
            .wallets
            .unwrap_or_else(|| Arc::new(InMemoryWalletStore::new()));
        let ledger = self.ledger.unwrap_or_else(|| Arc::new(InMemoryLedger::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink = self.notifications.unwrap_or_else(|| Arc::new(TracingSink));

        let progression = Arc::new(ProgressionCalculator::new(
            self.rules.unwrap_or_default(),
            Arc::clone(&ledger),
            Arc::clone(&wallets),
            self.progression_store
                .unwrap_or_else(|| Arc::new(InMemoryProgressionStore::new())),
            Arc::clone(&clock),
        ));

        let mut hooks: Vec<Arc<dyn PostCommitHook>> = vec![
            Arc::new(ProgressionHook::new(
                Arc::clone(&progression),
                Arc::clone(&sink),
                Arc::clone(&clock),
            )),
            Arc::new(NotificationHook::new(sink, Arc::clone(&clock))),
        ];
        hooks.extend(self.extra_hooks);

        TransactionOrchestrator {
            wallets,
            ledger,
            progression,
            identity: self
                .identity
                .unwrap_or_else(|| Arc::new(PinDirectory::new())),
            gateway: self
                .gateway
                .unwrap_or_else(|| Arc::new(SandboxGateway::default())),
            hooks,
            clock,
            config: self.config.unwrap_or_default(),
        }
    }
}
