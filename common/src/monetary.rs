//! Monetary types for FxWallet.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WalletError;

/// Fractional digits used when presenting monetary amounts.
pub const PRESENTATION_SCALE: u32 = 2;

/// Round an amount for presentation: 2 fractional digits, half-up.
///
/// Balances are tracked at full precision; this is only applied at response
/// boundaries and to converted amounts.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(PRESENTATION_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRESENTATION_SCALE);
    rounded
}

/// The closed set of currencies an account can be held in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    /// United States Dollar.
    #[default]
    Usd,
    /// Turkish Lira.
    Try,
}

impl Currency {
    /// Every supported currency, in a stable order.
    pub const ALL: [Currency; 2] = [Currency::Usd, Currency::Try];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Try => "TRY",
        }
    }

    /// The other supported currency.
    pub fn counterpart(&self) -> Currency {
        match self {
            Currency::Usd => Currency::Try,
            Currency::Try => Currency::Usd,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "TRY" => Ok(Currency::Try),
            _ => Err(WalletError::UnsupportedCurrency(s.to_string())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

/// An ordered currency pair; `base -> quote` and `quote -> base` are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency being converted from.
    pub base: Currency,
    /// Currency being converted to.
    pub quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }

    /// A pair of a currency to itself always converts at 1.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (full precision).
    pub value: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Rounded copy for presentation.
    pub fn rounded(&self) -> Self {
        Self {
            value: round_money(self.value),
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", round_money(self.value), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(2.5)), dec!(2.50));
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(Decimal::ZERO).to_string(), "0.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!("try".parse::<Currency>().unwrap(), Currency::Try);
        assert!(matches!(
            "EUR".parse::<Currency>(),
            Err(WalletError::UnsupportedCurrency(code)) if code == "EUR"
        ));
    }

    #[test]
    fn test_currency_serde() {
        let json = serde_json::to_string(&Currency::Try).unwrap();
        assert_eq!(json, "\"TRY\"");

        let parsed: Currency = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(parsed, Currency::Usd);

        assert!(serde_json::from_str::<Currency>("\"GBP\"").is_err());
    }

    #[test]
    fn test_pair_identity_and_inverse() {
        let pair = CurrencyPair::new(Currency::Usd, Currency::Try);
        assert!(!pair.is_identity());
        assert_eq!(pair.inverse(), CurrencyPair::new(Currency::Try, Currency::Usd));
        assert!(CurrencyPair::new(Currency::Try, Currency::Try).is_identity());
    }

    #[test]
    fn test_money_display_rounds() {
        let money = Money::new(dec!(3000), Currency::Try);
        assert_eq!(money.to_string(), "3000.00 TRY");
    }

    proptest! {
        #[test]
        fn rounding_is_within_half_a_cent(cents in -10_000_000i64..10_000_000, extra in 0u32..100) {
            let value = Decimal::new(cents * 100 + extra as i64, 4);
            let rounded = round_money(value);
            prop_assert!((rounded - value).abs() <= dec!(0.005));
            prop_assert_eq!(rounded.scale(), PRESENTATION_SCALE);
        }
    }
}
