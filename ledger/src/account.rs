//! Account definitions for ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fxwallet_common::{AccountKey, Currency, UserId};

use crate::store::{Version, Versioned, INITIAL_VERSION};

/// A single-currency balance owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Owning user.
    pub user_id: UserId,
    /// Account currency.
    pub currency: Currency,
    /// Current balance at full precision. Never negative.
    pub balance: Decimal,
    /// Store version this snapshot was read at.
    pub version: Version,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new zero-balance account.
    pub fn new(user_id: UserId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            currency,
            balance: Decimal::ZERO,
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> AccountKey {
        AccountKey::new(self.user_id.clone(), self.currency)
    }

    /// Check if account has sufficient funds for a debit.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Copy of this account with a new balance, stamped for the next version.
    pub(crate) fn with_balance(&self, balance: Decimal) -> Self {
        Self {
            balance,
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Adopt the version the store reports for this record.
    pub(crate) fn hydrate(stored: Versioned<Account>) -> Self {
        let mut account = stored.record;
        account.version = stored.version;
        account
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account_is_empty() {
        let account = Account::new(UserId::new("alice"), Currency::Try);
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.version, INITIAL_VERSION);
        assert_eq!(account.key(), AccountKey::new("alice".into(), Currency::Try));
    }

    #[test]
    fn test_with_balance_advances_version() {
        let account = Account::new(UserId::new("alice"), Currency::Usd);
        let next = account.with_balance(dec!(12.5));
        assert_eq!(next.balance, dec!(12.5));
        assert_eq!(next.version, account.version + 1);
        assert_eq!(next.created_at, account.created_at);
        assert!(next.has_sufficient_funds(dec!(12.5)));
        assert!(!next.has_sufficient_funds(dec!(12.51)));
    }
}
