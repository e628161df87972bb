//! Transaction records kept by the journal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fxwallet_common::{Currency, TransactionId, UserId};

/// Kind of balance movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    /// Debit leg of an exchange.
    ExchangeFrom,
    /// Credit leg of an exchange.
    ExchangeTo,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::ExchangeFrom => "EXCHANGE_FROM",
            TransactionType::ExchangeTo => "EXCHANGE_TO",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. `Pending` moves to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journal record of one requested balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    /// Currency the amount is denominated in.
    pub currency: Currency,
    pub amount: Decimal,
    /// Other side of an exchange leg.
    pub target_currency: Option<Currency>,
    pub target_amount: Option<Decimal>,
    /// Rate applied by an exchange, `from -> to`.
    pub exchange_rate: Option<Decimal>,
    pub description: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the record reaches a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// A new pending deposit or withdrawal.
    pub fn pending(
        user_id: UserId,
        kind: TransactionType,
        currency: Currency,
        amount: Decimal,
        description: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            kind,
            status: TransactionStatus::Pending,
            currency,
            amount,
            target_currency: None,
            target_amount: None,
            exchange_rate: None,
            description,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// A new pending exchange leg that references the opposite side.
    #[allow(clippy::too_many_arguments)]
    pub fn exchange_leg(
        user_id: UserId,
        kind: TransactionType,
        currency: Currency,
        amount: Decimal,
        target_currency: Currency,
        target_amount: Decimal,
        rate: Decimal,
        description: Option<String>,
    ) -> Self {
        Self {
            target_currency: Some(target_currency),
            target_amount: Some(target_amount),
            exchange_rate: Some(rate),
            ..Self::pending(user_id, kind, currency, amount, description)
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Copy moved into a terminal status.
    pub(crate) fn settled(&self, status: TransactionStatus, error_message: Option<String>) -> Self {
        debug_assert!(status.is_terminal());
        Self {
            status,
            error_message,
            processed_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}
