//! Error types for FxWallet operations.

use crate::{AccountKey, Currency, CurrencyPair};
use rust_decimal::Decimal;
use thiserror::Error;

/// Boxed underlying cause, kept for diagnostics only.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for wallet operations.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Currency outside the supported set.
    #[error("Currency {0} is not supported, only USD and TRY are allowed")]
    UnsupportedCurrency(String),

    /// Lookup on an account expected to exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountKey),

    /// Balance check failed at mutation time.
    #[error("Insufficient funds in {currency} account. Available: {available}, Requested: {requested}")]
    InsufficientFunds {
        currency: Currency,
        available: Decimal,
        requested: Decimal,
    },

    /// External rate source unreachable or missing data.
    #[error("Exchange rate not available for {pair}")]
    RateUnavailable {
        pair: CurrencyPair,
        #[source]
        source: BoxedCause,
    },

    /// Exchange between a currency and itself.
    #[error("Cannot exchange currency to the same currency: {0}")]
    InvalidExchange(Currency),

    /// Amount is zero, negative or otherwise malformed.
    #[error("Invalid amount {amount}: must be greater than 0")]
    InvalidAmount { amount: Decimal },

    /// Applying the amount would leave the representable decimal range.
    #[error("Amount {amount} {currency} is out of range for this operation")]
    AmountOutOfRange { currency: Currency, amount: Decimal },

    /// The simulated settlement wait was cut short.
    #[error("Settlement interrupted before completion")]
    SettlementInterrupted,

    /// Submission arrived after shutdown began.
    #[error("Wallet is shutting down and not accepting new operations")]
    ShuttingDown,

    /// Anything unanticipated, including store failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Whether the caller's request was at fault (as opposed to the system).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WalletError::UnsupportedCurrency(_)
                | WalletError::AccountNotFound(_)
                | WalletError::InsufficientFunds { .. }
                | WalletError::InvalidExchange(_)
                | WalletError::InvalidAmount { .. }
                | WalletError::AmountOutOfRange { .. }
        )
    }

    /// Stable error code for responses and notifications.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            WalletError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::RateUnavailable { .. } => "RATE_UNAVAILABLE",
            WalletError::InvalidExchange(_) => "INVALID_EXCHANGE",
            WalletError::InvalidAmount { .. } => "INVALID_AMOUNT",
            WalletError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            WalletError::SettlementInterrupted => "SETTLEMENT_INTERRUPTED",
            WalletError::ShuttingDown => "SHUTTING_DOWN",
            WalletError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-equivalent status for an outer transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            WalletError::AccountNotFound(_) => 404,
            WalletError::RateUnavailable { .. } | WalletError::ShuttingDown => 503,
            WalletError::Internal(_) | WalletError::SettlementInterrupted => 500,
            _ => 400,
        }
    }
}

/// Result type alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_message() {
        let err = WalletError::InsufficientFunds {
            currency: Currency::Usd,
            available: dec!(50.00),
            requested: dec!(100.00),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in USD account. Available: 50.00, Requested: 100.00"
        );
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_classification() {
        let missing = WalletError::AccountNotFound(AccountKey::new(UserId::new("u1"), Currency::Try));
        assert_eq!(missing.status_code(), 404);
        assert_eq!(missing.to_string(), "Account not found: u1/TRY");

        let internal = WalletError::Internal("boom".into());
        assert!(!internal.is_client_error());
        assert_eq!(internal.status_code(), 500);

        let rate = WalletError::RateUnavailable {
            pair: CurrencyPair::new(Currency::Usd, Currency::Try),
            source: "connection refused".into(),
        };
        assert_eq!(rate.status_code(), 503);
        assert!(std::error::Error::source(&rate).is_some());

        let overflow = WalletError::AmountOutOfRange {
            currency: Currency::Usd,
            amount: Decimal::MAX,
        };
        assert!(overflow.is_client_error());
        assert_eq!(overflow.error_code(), "AMOUNT_OUT_OF_RANGE");
        assert_eq!(overflow.status_code(), 400);
    }
}
