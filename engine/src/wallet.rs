//! Wallet facade: the public operation surface.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use fxwallet_common::{Currency, Result, TransactionId, UserId, WalletError};
use fxwallet_fx::FxEngine;
use fxwallet_ledger::{AccountManager, Transaction, TransactionJournal, TransactionStatus};

use crate::balance::{balance_report, BalanceReport};
use crate::config::WalletConfig;
use crate::exchange::{ExchangeOrchestrator, ExchangeOutcome};
use crate::metrics::{Metrics, MetricsSnapshot, SharedMetrics};
use crate::notifier::SharedNotifier;
use crate::settlement::SettlementPipeline;
use crate::state::ServiceState;

/// Deposit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub currency: Currency,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub currency: Currency,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Exchange request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Acknowledgement for an accepted deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl TransactionReceipt {
    fn accepted(transaction: &Transaction, operation: &str) -> Self {
        Self {
            transaction_id: transaction.id,
            status: transaction.status,
            message: format!(
                "{operation} request accepted. You will be notified once processing is complete."
            ),
            timestamp: transaction.created_at,
        }
    }
}

/// The wallet service.
pub struct Wallet {
    config: WalletConfig,
    state: RwLock<ServiceState>,
    accounts: Arc<AccountManager>,
    journal: Arc<TransactionJournal>,
    fx: Arc<FxEngine>,
    settlements: Arc<SettlementPipeline>,
    exchanges: ExchangeOrchestrator,
    metrics: SharedMetrics,
}

impl Wallet {
    /// Assemble a wallet from its collaborators.
    pub fn new(
        config: WalletConfig,
        accounts: Arc<AccountManager>,
        journal: Arc<TransactionJournal>,
        fx: Arc<FxEngine>,
        notifier: SharedNotifier,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let settlements = Arc::new(SettlementPipeline::new(
            accounts.clone(),
            journal.clone(),
            notifier,
            metrics.clone(),
            &config.settlement,
        ));
        let exchanges =
            ExchangeOrchestrator::new(accounts.clone(), journal.clone(), fx.clone(), metrics.clone());

        info!(
            workers = config.settlement.max_concurrent,
            rate_ttl_secs = config.rate.cache_ttl.as_secs(),
            "Wallet started"
        );

        Self {
            config,
            state: RwLock::new(ServiceState::Running),
            accounts,
            journal,
            fx,
            settlements,
            exchanges,
            metrics,
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn accounts(&self) -> &AccountManager {
        &self.accounts
    }

    pub fn fx(&self) -> &FxEngine {
        &self.fx
    }

    /// Accept a deposit. The balance is credited asynchronously.
    pub async fn deposit(&self, user_id: &UserId, request: DepositRequest) -> Result<TransactionReceipt> {
        self.ensure_accepting()?;
        let pending = self
            .settlements
            .deposit(user_id.clone(), request.currency, request.amount, request.description)
            .await?;
        Ok(TransactionReceipt::accepted(&pending, "Deposit"))
    }

    /// Accept a withdrawal. The balance is checked and debited asynchronously.
    pub async fn withdraw(&self, user_id: &UserId, request: WithdrawRequest) -> Result<TransactionReceipt> {
        self.ensure_accepting()?;
        let pending = self
            .settlements
            .withdraw(user_id.clone(), request.currency, request.amount, request.description)
            .await?;
        Ok(TransactionReceipt::accepted(&pending, "Withdraw"))
    }

    /// Exchange between the user's two currencies.
    pub async fn exchange(&self, user_id: &UserId, request: ExchangeRequest) -> Result<ExchangeOutcome> {
        self.ensure_accepting()?;
        self.exchanges
            .exchange(
                user_id,
                request.from_currency,
                request.to_currency,
                request.amount,
                request.description,
            )
            .await
    }

    /// Balances in both currencies and their total in `currency` (USD if `None`).
    pub async fn get_balance(&self, user_id: &UserId, currency: Option<Currency>) -> Result<BalanceReport> {
        balance_report(&self.accounts, &self.fx, user_id, currency.unwrap_or_default()).await
    }

    /// Current state of a transaction.
    pub async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.journal.get(id).await
    }

    /// Settlements accepted but not yet terminal.
    pub fn pending_settlements(&self) -> usize {
        self.settlements.in_flight()
    }

    /// Wait for every accepted settlement to finish, up to `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.settlements.drain(timeout).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.accounts.conflict_count())
    }

    /// Stop accepting operations and settle what is in flight.
    ///
    /// Settlements still waiting on their gateway delay after `grace` are
    /// interrupted and end `FAILED`.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, grace: Duration) {
        {
            let mut state = self.state.write();
            if !state.accepts_requests() {
                return;
            }
            *state = ServiceState::ShuttingDown;
        }
        info!(in_flight = self.settlements.in_flight(), "Shutting down wallet");

        if !self.settlements.drain(grace).await {
            warn!(
                in_flight = self.settlements.in_flight(),
                "Grace period elapsed, interrupting settlements"
            );
            self.settlements.interrupt();
            // Interrupted settlements record FAILED immediately; the extra
            // grace only covers store writes.
            if !self.settlements.drain(grace).await {
                warn!(in_flight = self.settlements.in_flight(), "Settlements still running at stop");
            }
        }

        *self.state.write() = ServiceState::Stopped;
        info!("Wallet stopped");
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.state.read().accepts_requests() {
            Ok(())
        } else {
            Err(WalletError::ShuttingDown)
        }
    }
}
