//! Synchronous two-leg currency exchange.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use fxwallet_common::{Currency, CurrencyPair, Money, Result, TransactionId, UserId, WalletError};
use fxwallet_fx::FxEngine;
use fxwallet_ledger::{
    AccountManager, PendingTransaction, Transaction, TransactionJournal, TransactionStatus,
    TransactionType,
};

use crate::metrics::SharedMetrics;
use crate::settlement::validate_amount;

/// Result of an accepted exchange, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutcome {
    /// Id of the debit (FROM) leg.
    pub transaction_id: TransactionId,
    /// Id of the credit (TO) leg.
    pub counter_transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub message: String,
    pub debited: Money,
    pub credited: Money,
    pub exchange_rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Moves value between a user's two currency accounts at the current rate.
pub struct ExchangeOrchestrator {
    accounts: Arc<AccountManager>,
    journal: Arc<TransactionJournal>,
    fx: Arc<FxEngine>,
    metrics: SharedMetrics,
}

impl ExchangeOrchestrator {
    pub fn new(
        accounts: Arc<AccountManager>,
        journal: Arc<TransactionJournal>,
        fx: Arc<FxEngine>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            accounts,
            journal,
            fx,
            metrics,
        }
    }

    /// Exchange `amount` of `from` into `to`.
    ///
    /// Both leg records are opened before any balance moves and both are
    /// closed together. Insufficient funds is returned as an error; any other
    /// failure after the legs exist, a missing source account included, is
    /// reported as a `FAILED` outcome.
    #[instrument(skip(self, description), fields(user_id = %user_id))]
    pub async fn exchange(
        &self,
        user_id: &UserId,
        from: Currency,
        to: Currency,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<ExchangeOutcome> {
        let prepared = self.prepare(from, to, amount).await;
        let (rate, converted) = match prepared {
            Ok(quote) => quote,
            Err(e) => {
                self.metrics.exchange_rejected();
                warn!(user_id = %user_id, error = %e, "Exchange rejected");
                return Err(e);
            }
        };

        let from_leg = self
            .journal
            .open(Transaction::exchange_leg(
                user_id.clone(),
                TransactionType::ExchangeFrom,
                from,
                amount,
                to,
                converted,
                rate,
                description.clone(),
            ))
            .await?;

        let to_leg = match self
            .journal
            .open(Transaction::exchange_leg(
                user_id.clone(),
                TransactionType::ExchangeTo,
                to,
                converted,
                from,
                amount,
                rate,
                description,
            ))
            .await
        {
            Ok(leg) => leg,
            Err(e) => {
                let transaction_id = from_leg.id();
                if let Err(mark_err) = self.journal.mark_failed(from_leg, e.to_string()).await {
                    error!(transaction_id = %transaction_id, error = %mark_err, "Could not close exchange leg");
                }
                self.metrics.exchange_failed();
                return Err(e);
            }
        };

        let ids = (from_leg.id(), to_leg.id());
        let debited = Money::new(amount, from);
        let credited = Money::new(converted, to);

        match self.move_balances(user_id, debited, credited).await {
            Ok(()) => {
                let (from_done, to_done) = tokio::join!(
                    self.journal.mark_succeeded(from_leg),
                    self.journal.mark_succeeded(to_leg)
                );
                from_done?;
                to_done?;

                self.metrics.exchange_success();
                info!(
                    user_id = %user_id,
                    transaction_id = %ids.0,
                    debited = %debited,
                    credited = %credited,
                    rate = %rate,
                    "Exchange completed"
                );
                Ok(ExchangeOutcome {
                    transaction_id: ids.0,
                    counter_transaction_id: ids.1,
                    status: TransactionStatus::Success,
                    message: format!("Exchange successful: {debited} to {credited}"),
                    debited: debited.rounded(),
                    credited: credited.rounded(),
                    exchange_rate: rate,
                    timestamp: Utc::now(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                self.fail_legs(from_leg, to_leg, &message).await;

                if matches!(e, WalletError::InsufficientFunds { .. }) {
                    self.metrics.exchange_rejected();
                    warn!(user_id = %user_id, transaction_id = %ids.0, error = %message, "Exchange rejected");
                    return Err(e);
                }

                self.metrics.exchange_failed();
                error!(user_id = %user_id, transaction_id = %ids.0, error = %message, "Exchange failed");
                Ok(ExchangeOutcome {
                    transaction_id: ids.0,
                    counter_transaction_id: ids.1,
                    status: TransactionStatus::Failed,
                    message: format!("Exchange failed: {message}"),
                    debited: debited.rounded(),
                    credited: credited.rounded(),
                    exchange_rate: rate,
                    timestamp: Utc::now(),
                })
            }
        }
    }

    /// Validate the request and price it with a single rate lookup.
    async fn prepare(&self, from: Currency, to: Currency, amount: Decimal) -> Result<(Decimal, Decimal)> {
        if from == to {
            return Err(WalletError::InvalidExchange(from));
        }
        validate_amount(amount)?;

        let rate = self.fx.get_rate(from, to).await?;
        let converted = FxEngine::convert_with_rate(amount, CurrencyPair::new(from, to), rate)?;
        if converted <= Decimal::ZERO {
            // Too small to produce a credit after rounding.
            return Err(WalletError::InvalidAmount { amount });
        }
        Ok((rate, converted))
    }

    async fn move_balances(&self, user_id: &UserId, debit: Money, credit: Money) -> Result<()> {
        let available = self.accounts.get(user_id, debit.currency).await?.balance;
        if available < debit.value {
            return Err(WalletError::InsufficientFunds {
                currency: debit.currency,
                available,
                requested: debit.value,
            });
        }

        self.accounts
            .subtract(user_id, debit.currency, debit.value)
            .await?;

        if let Err(e) = self.accounts.add(user_id, credit.currency, credit.value).await {
            match self.accounts.add(user_id, debit.currency, debit.value).await {
                Ok(_) => warn!(user_id = %user_id, error = %e, "Credit leg failed, debit restored"),
                Err(restore) => error!(
                    user_id = %user_id,
                    error = %e,
                    restore_error = %restore,
                    "Credit leg failed and debit could not be restored"
                ),
            }
            return Err(e);
        }
        Ok(())
    }

    async fn fail_legs(&self, from_leg: PendingTransaction, to_leg: PendingTransaction, message: &str) {
        let ids = (from_leg.id(), to_leg.id());
        let (from_done, to_done) = tokio::join!(
            self.journal.mark_failed(from_leg, message),
            self.journal.mark_failed(to_leg, message)
        );
        for (id, done) in [(ids.0, from_done), (ids.1, to_done)] {
            if let Err(e) = done {
                error!(transaction_id = %id, error = %e, "Could not close exchange leg");
            }
        }
    }
}
