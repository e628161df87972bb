//! Account manager: lookup, lazy creation and optimistic balance mutation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use fxwallet_common::{AccountKey, Currency, Result, UserId, WalletError};

use crate::account::Account;
use crate::store::{CasOutcome, InMemoryStore, SharedStore};

/// Store holding one account per (user, currency).
pub type AccountStore = SharedStore<AccountKey, Account>;

/// Default upper bound on read-compute-write attempts per mutation.
pub const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 1000;

/// Owns account records and their balance invariants.
///
/// Balance changes never hold a lock across the read and the write. Each
/// attempt reads the current version, computes the new balance and submits a
/// conditional write; a version mismatch means another writer got there
/// first, so the attempt is repeated against the fresh record.
pub struct AccountManager {
    store: AccountStore,
    max_attempts: u32,
    conflicts: AtomicU64,
}

impl AccountManager {
    pub fn new(store: AccountStore) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_CAS_ATTEMPTS)
    }

    /// Manager over a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::<AccountKey, Account>::new()))
    }

    pub fn with_max_attempts(store: AccountStore, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Return the account, creating it at zero balance if absent.
    pub async fn get_or_create(&self, user_id: &UserId, currency: Currency) -> Result<Account> {
        let key = AccountKey::new(user_id.clone(), currency);
        if let Some(existing) = self.store.get(&key).await? {
            return Ok(Account::hydrate(existing));
        }

        let outcome = self
            .store
            .create(key, Account::new(user_id.clone(), currency))
            .await?;
        if outcome.was_created() {
            info!(user_id = %user_id, currency = %currency, "Created new account");
        }
        Ok(Account::hydrate(outcome.into_stored()))
    }

    /// Return the account, failing if it does not exist yet.
    pub async fn get(&self, user_id: &UserId, currency: Currency) -> Result<Account> {
        self.find(user_id, currency)
            .await?
            .ok_or_else(|| WalletError::AccountNotFound(AccountKey::new(user_id.clone(), currency)))
    }

    /// Return the account if it exists.
    pub async fn find(&self, user_id: &UserId, currency: Currency) -> Result<Option<Account>> {
        let key = AccountKey::new(user_id.clone(), currency);
        Ok(self.store.get(&key).await?.map(Account::hydrate))
    }

    /// All existing accounts of a user, at most one per supported currency.
    pub async fn get_all_accounts(&self, user_id: &UserId) -> Result<Vec<Account>> {
        let mut accounts = Vec::with_capacity(Currency::ALL.len());
        for currency in Currency::ALL {
            if let Some(account) = self.find(user_id, currency).await? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    /// Ensure the user holds an account in every supported currency.
    pub async fn open_all(&self, user_id: &UserId) -> Result<Vec<Account>> {
        let mut accounts = Vec::with_capacity(Currency::ALL.len());
        for currency in Currency::ALL {
            accounts.push(self.get_or_create(user_id, currency).await?);
        }
        Ok(accounts)
    }

    /// Increase the balance; the account is created on first use.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn add(&self, user_id: &UserId, currency: Currency, amount: Decimal) -> Result<Account> {
        debug_assert!(amount > Decimal::ZERO, "credit amount must be positive");

        self.get_or_create(user_id, currency).await?;
        self.mutate(user_id, currency, |account| {
            account
                .balance
                .checked_add(amount)
                .ok_or(WalletError::AmountOutOfRange { currency, amount })
        })
        .await
    }

    /// Decrease the balance, refusing to go below zero.
    ///
    /// The funds check runs inside each attempt, against the same snapshot the
    /// conditional write is based on.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn subtract(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<Account> {
        debug_assert!(amount > Decimal::ZERO, "debit amount must be positive");

        self.mutate(user_id, currency, |account| {
            if !account.has_sufficient_funds(amount) {
                return Err(WalletError::InsufficientFunds {
                    currency,
                    available: account.balance,
                    requested: amount,
                });
            }
            Ok(account.balance - amount)
        })
        .await
    }

    /// Number of conditional writes that lost a race so far.
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    async fn mutate<F>(&self, user_id: &UserId, currency: Currency, next_balance: F) -> Result<Account>
    where
        F: Fn(&Account) -> Result<Decimal> + Send + Sync,
    {
        let key = AccountKey::new(user_id.clone(), currency);

        for attempt in 1..=self.max_attempts {
            let current = self
                .store
                .get(&key)
                .await?
                .map(Account::hydrate)
                .ok_or_else(|| WalletError::AccountNotFound(key.clone()))?;

            let balance = next_balance(&current)?;
            let next = current.with_balance(balance);

            match self
                .store
                .compare_and_swap(&key, current.version, next.clone())
                .await?
            {
                CasOutcome::Swapped(version) => {
                    debug!(
                        account = %key,
                        balance = %next.balance,
                        version,
                        attempt,
                        "Balance updated"
                    );
                    return Ok(Account { version, ..next });
                }
                CasOutcome::Conflict { current: stored } => {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        account = %key,
                        expected = current.version,
                        stored = ?stored,
                        attempt,
                        "Version conflict, retrying"
                    );
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(account = %key, attempts = self.max_attempts, "Gave up on contended account");
        Err(WalletError::Internal(format!(
            "account {} stayed contended for {} attempts",
            key, self.max_attempts
        )))
    }
}
