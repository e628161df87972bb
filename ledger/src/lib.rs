//! FxWallet Ledger
//!
//! Account balances and the transaction journal, both kept in a versioned
//! store and mutated through optimistic compare-and-swap.

pub mod store;
pub mod account;
pub mod manager;
pub mod transaction;
pub mod journal;

pub use store::{
    CasOutcome, CreateOutcome, InMemoryStore, SharedStore, StoreError, StoreResult, Version,
    Versioned, VersionedStore, INITIAL_VERSION,
};
pub use account::Account;
pub use manager::{AccountManager, AccountStore, DEFAULT_MAX_CAS_ATTEMPTS};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use journal::{PendingTransaction, TransactionJournal, TransactionStore};
