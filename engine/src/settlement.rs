//! Asynchronous deposit and withdrawal settlement.
//!
//! Submission writes a `PENDING` record and schedules the settlement on the
//! worker pool; the caller gets the pending record back immediately. The
//! scheduled unit waits out the simulated gateway delay, applies the balance
//! change, records the terminal status and notifies the user.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, info_span, instrument, warn, Instrument};

use fxwallet_common::{Currency, Money, Result, UserId, WalletError};
use fxwallet_ledger::{
    AccountManager, PendingTransaction, Transaction, TransactionJournal, TransactionStatus,
    TransactionType,
};

use crate::config::SettlementConfig;
use crate::metrics::SharedMetrics;
use crate::notifier::{Notification, SharedNotifier};

/// Reject zero, negative and otherwise unusable amounts.
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount { amount });
    }
    Ok(())
}

/// Runs deposits and withdrawals on a bounded pool of spawned tasks.
pub struct SettlementPipeline {
    accounts: Arc<AccountManager>,
    journal: Arc<TransactionJournal>,
    notifier: SharedNotifier,
    metrics: SharedMetrics,
    workers: Arc<Semaphore>,
    deposit_delay: Duration,
    withdraw_delay: Duration,
    in_flight: Arc<watch::Sender<usize>>,
    interrupt: watch::Sender<bool>,
}

impl SettlementPipeline {
    pub fn new(
        accounts: Arc<AccountManager>,
        journal: Arc<TransactionJournal>,
        notifier: SharedNotifier,
        metrics: SharedMetrics,
        config: &SettlementConfig,
    ) -> Self {
        let (in_flight, _) = watch::channel(0usize);
        let (interrupt, _) = watch::channel(false);

        Self {
            accounts,
            journal,
            notifier,
            metrics,
            workers: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            deposit_delay: config.deposit_delay,
            withdraw_delay: config.withdraw_delay,
            in_flight: Arc::new(in_flight),
            interrupt,
        }
    }

    /// Accept a deposit; the balance is credited later.
    #[instrument(skip(self, description), fields(user_id = %user_id))]
    pub async fn deposit(
        self: &Arc<Self>,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Transaction> {
        self.submit(TransactionType::Deposit, user_id, currency, amount, description)
            .await
    }

    /// Accept a withdrawal; the balance is checked and debited later.
    #[instrument(skip(self, description), fields(user_id = %user_id))]
    pub async fn withdraw(
        self: &Arc<Self>,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Transaction> {
        self.submit(TransactionType::Withdraw, user_id, currency, amount, description)
            .await
    }

    /// Settlements accepted but not yet terminal.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until nothing is in flight. Returns `false` if `timeout` ran out first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut in_flight = self.in_flight.subscribe();
        let idle = async move {
            loop {
                if *in_flight.borrow_and_update() == 0 {
                    return;
                }
                if in_flight.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }

    /// Cut short every current and future settlement delay.
    pub fn interrupt(&self) {
        self.interrupt.send_replace(true);
    }

    async fn submit(
        self: &Arc<Self>,
        kind: TransactionType,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Transaction> {
        validate_amount(amount)?;

        let pending = self
            .journal
            .open(Transaction::pending(user_id, kind, currency, amount, description))
            .await?;
        let record = pending.record().clone();

        match kind {
            TransactionType::Withdraw => self.metrics.withdrawal_submitted(),
            _ => self.metrics.deposit_submitted(),
        }

        let guard = InFlightGuard::enter(self.in_flight.clone());
        let pipeline = Arc::clone(self);
        let span = info_span!("settlement", transaction_id = %record.id, kind = %kind);

        tokio::spawn(
            async move {
                let _guard = guard;
                match pipeline.workers.clone().acquire_owned().await {
                    Ok(_permit) => pipeline.execute(pending).await,
                    Err(_) => {
                        let err = WalletError::Internal("settlement worker pool closed".into());
                        pipeline.finish(pending, Err(err)).await;
                    }
                }
            }
            .instrument(span),
        );

        info!(
            transaction_id = %record.id,
            kind = %kind,
            currency = %currency,
            amount = %amount,
            "Settlement scheduled"
        );
        Ok(record)
    }

    async fn execute(&self, pending: PendingTransaction) {
        let tx = pending.record();
        let outcome = match tx.kind {
            TransactionType::Withdraw => self.settle_withdraw(tx).await,
            _ => self.settle_deposit(tx).await,
        };
        self.finish(pending, outcome).await;
    }

    async fn settle_deposit(&self, tx: &Transaction) -> Result<()> {
        self.gateway_delay(self.deposit_delay).await?;
        self.accounts.add(&tx.user_id, tx.currency, tx.amount).await?;
        Ok(())
    }

    async fn settle_withdraw(&self, tx: &Transaction) -> Result<()> {
        let account = self.accounts.get(&tx.user_id, tx.currency).await?;
        if !account.has_sufficient_funds(tx.amount) {
            return Err(WalletError::InsufficientFunds {
                currency: tx.currency,
                available: account.balance,
                requested: tx.amount,
            });
        }

        self.gateway_delay(self.withdraw_delay).await?;
        // The balance may have moved during the delay; subtract checks again.
        self.accounts.subtract(&tx.user_id, tx.currency, tx.amount).await?;
        Ok(())
    }

    async fn gateway_delay(&self, delay: Duration) -> Result<()> {
        let mut interrupt = self.interrupt.subscribe();
        let interrupted = async move {
            loop {
                if *interrupt.borrow_and_update() {
                    return;
                }
                if interrupt.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = interrupted => Err(WalletError::SettlementInterrupted),
        }
    }

    async fn finish(&self, pending: PendingTransaction, outcome: Result<()>) {
        let user_id = pending.record().user_id.clone();
        let kind = pending.record().kind;
        let money = Money::new(pending.record().amount, pending.record().currency);
        let label = match kind {
            TransactionType::Withdraw => "Withdraw",
            _ => "Deposit",
        };

        let notification = match outcome {
            Ok(()) => {
                let transaction_id = pending.id();
                // The balance has moved either way; the user hears about it
                // even if the journal write is lost.
                match self.journal.mark_succeeded(pending).await {
                    Ok(_) => {
                        info!(user_id = %user_id, transaction_id = %transaction_id, "Settlement succeeded")
                    }
                    Err(e) => error!(
                        user_id = %user_id,
                        transaction_id = %transaction_id,
                        error = %e,
                        "Balance applied but success could not be recorded"
                    ),
                }
                self.metrics.settlement_success();
                let verb = match kind {
                    TransactionType::Withdraw => "Withdrew",
                    _ => "Deposited",
                };
                Notification {
                    transaction_id,
                    status: TransactionStatus::Success,
                    message: format!("{label} successful"),
                    details: format!("{verb} {money}"),
                }
            }
            Err(cause) => {
                let transaction_id = pending.id();
                let message = cause.to_string();
                self.metrics.settlement_failed();
                if cause.is_client_error() {
                    warn!(user_id = %user_id, transaction_id = %transaction_id, error = %message, "Settlement rejected");
                } else {
                    error!(user_id = %user_id, transaction_id = %transaction_id, error = %message, "Settlement failed");
                }
                if let Err(e) = self.journal.mark_failed(pending, message.clone()).await {
                    error!(transaction_id = %transaction_id, error = %e, "Failure could not be recorded");
                }
                Notification {
                    transaction_id,
                    status: TransactionStatus::Failed,
                    message: format!("{label} failed"),
                    details: message,
                }
            }
        };

        self.notifier.notify(&user_id, notification);
        self.metrics.notification_sent();
    }
}

/// Counts a settlement as in flight until dropped.
struct InFlightGuard {
    counter: Arc<watch::Sender<usize>>,
}

impl InFlightGuard {
    fn enter(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self { counter }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.send_modify(|n| *n = n.saturating_sub(1));
    }
}
