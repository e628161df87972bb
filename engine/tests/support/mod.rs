#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use fxwallet_common::{AccountKey, Currency, TransactionId, UserId};
use fxwallet_engine::{ChannelNotifier, Wallet, WalletConfig};
use fxwallet_fx::{FxEngine, FxEngineConfig, StaticRateSource};
use fxwallet_ledger::{
    Account, AccountManager, CasOutcome, CreateOutcome, InMemoryStore, StoreError, StoreResult,
    Transaction, TransactionJournal, Version, Versioned, VersionedStore,
};

pub struct TestWallet {
    pub wallet: Wallet,
    pub source: Arc<StaticRateSource>,
    pub notifier: Arc<ChannelNotifier>,
    pub transactions: Arc<InMemoryStore<TransactionId, Transaction>>,
}

impl TestWallet {
    /// Every journal record belonging to `user`.
    pub fn transactions_of(&self, user: &UserId) -> Vec<Transaction> {
        self.transactions
            .records()
            .into_iter()
            .map(|stored| stored.record)
            .filter(|tx| &tx.user_id == user)
            .collect()
    }
}

pub fn rates() -> Arc<StaticRateSource> {
    Arc::new(
        StaticRateSource::new()
            .with_rate(Currency::Usd, Currency::Try, Decimal::new(300, 1))
            .with_rate(Currency::Try, Currency::Usd, Decimal::new(37, 3)),
    )
}

pub fn wallet() -> TestWallet {
    wallet_with_accounts(Arc::new(AccountManager::in_memory()))
}

pub fn wallet_with_accounts(accounts: Arc<AccountManager>) -> TestWallet {
    let source = rates();
    let notifier = Arc::new(ChannelNotifier::new(1024));
    let transactions = Arc::new(InMemoryStore::<TransactionId, Transaction>::new());
    let wallet = Wallet::new(
        WalletConfig::default(),
        accounts,
        Arc::new(TransactionJournal::new(transactions.clone())),
        Arc::new(FxEngine::new(source.clone(), FxEngineConfig::default())),
        notifier.clone(),
    );
    TestWallet {
        wallet,
        source,
        notifier,
        transactions,
    }
}

pub async fn settle(wallet: &Wallet) {
    assert!(wallet.wait_idle(Duration::from_secs(600)).await, "settlements did not finish");
}

pub async fn balance(wallet: &Wallet, user: &UserId, currency: Currency) -> Decimal {
    wallet
        .accounts()
        .find(user, currency)
        .await
        .unwrap()
        .map_or(Decimal::ZERO, |a| a.balance)
}

/// Account store whose backend refuses to create accounts in one currency.
pub struct RefusingStore {
    pub inner: InMemoryStore<AccountKey, Account>,
    pub refuse: Currency,
}

impl RefusingStore {
    pub fn new(refuse: Currency) -> Self {
        Self {
            inner: InMemoryStore::new(),
            refuse,
        }
    }
}

#[async_trait]
impl VersionedStore<AccountKey, Account> for RefusingStore {
    async fn get(&self, key: &AccountKey) -> StoreResult<Option<Versioned<Account>>> {
        self.inner.get(key).await
    }

    async fn create(&self, key: AccountKey, record: Account) -> StoreResult<CreateOutcome<Account>> {
        if key.currency == self.refuse {
            return Err(StoreError::Unavailable(format!("{} shard offline", key.currency)));
        }
        self.inner.create(key, record).await
    }

    async fn compare_and_swap(
        &self,
        key: &AccountKey,
        expected: Version,
        record: Account,
    ) -> StoreResult<CasOutcome> {
        self.inner.compare_and_swap(key, expected, record).await
    }
}
