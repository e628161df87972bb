//! FX engine error types.

use fxwallet_common::{CurrencyPair, WalletError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures talking to or interpreting a rate source.
#[derive(Debug, Error)]
pub enum RateSourceError {
    /// Request could not be sent or the body could not be decoded.
    #[error("Rate source transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Source answered with a non-success status.
    #[error("Rate source returned HTTP {0}")]
    Status(u16),

    /// Source answered without a rate table.
    #[error("Rate source returned no rates")]
    EmptyResponse,

    /// Rate table had no entry for the requested currency.
    #[error("Rate source has no {quote} rate for base {base}")]
    MissingRate { base: String, quote: String },

    /// Rate was zero or negative.
    #[error("Rate source returned unusable rate {rate} for {pair}")]
    InvalidRate { pair: CurrencyPair, rate: Decimal },

    /// Source deliberately configured as unreachable.
    #[error("Rate source unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur in the FX engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// Rate not available for the requested currency pair.
    #[error("Rate not available for {pair}")]
    RateUnavailable {
        pair: CurrencyPair,
        #[source]
        source: RateSourceError,
    },

    /// Converted amount does not fit in a decimal.
    #[error("Converting {amount} at {rate} for {pair} overflows")]
    Overflow {
        pair: CurrencyPair,
        amount: Decimal,
        rate: Decimal,
    },
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

impl From<FxError> for WalletError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::RateUnavailable { pair, source } => WalletError::RateUnavailable {
                pair,
                source: Box::new(source),
            },
            FxError::Overflow { pair, amount, .. } => WalletError::AmountOutOfRange {
                currency: pair.base,
                amount,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_common::Currency;
    use std::error::Error as _;

    #[test]
    fn test_rate_unavailable_keeps_cause() {
        let pair = CurrencyPair::new(Currency::Usd, Currency::Try);
        let err: WalletError = FxError::RateUnavailable {
            pair,
            source: RateSourceError::EmptyResponse,
        }
        .into();

        assert_eq!(err.to_string(), "Exchange rate not available for USD/TRY");
        let cause = err.source().expect("cause kept");
        assert_eq!(cause.to_string(), "Rate source returned no rates");
    }

    #[test]
    fn test_overflow_maps_to_out_of_range() {
        let err: WalletError = FxError::Overflow {
            pair: CurrencyPair::new(Currency::Try, Currency::Usd),
            amount: Decimal::MAX,
            rate: Decimal::TWO,
        }
        .into();

        assert!(matches!(
            err,
            WalletError::AmountOutOfRange { currency: Currency::Try, amount } if amount == Decimal::MAX
        ));
    }
}
