//! Transaction journal.
//!
//! A record is written as `PENDING` and then moved to `SUCCESS` or `FAILED`
//! exactly once. Opening a record hands back a [`PendingTransaction`] that
//! must be given up to finish it, so a finished record has no handle left
//! to finish it again.

use std::sync::Arc;

use tracing::{debug, warn};

use fxwallet_common::{Result, TransactionId, WalletError};

use crate::store::{CasOutcome, CreateOutcome, InMemoryStore, SharedStore, Version};
use crate::transaction::{Transaction, TransactionStatus};

/// Store holding transactions by id.
pub type TransactionStore = SharedStore<TransactionId, Transaction>;

/// Open handle on a `PENDING` record.
#[derive(Debug)]
#[must_use = "a pending transaction must be marked succeeded or failed"]
pub struct PendingTransaction {
    record: Transaction,
    version: Version,
}

impl PendingTransaction {
    pub fn id(&self) -> TransactionId {
        self.record.id
    }

    pub fn record(&self) -> &Transaction {
        &self.record
    }
}

/// Persists transactions and their terminal transitions.
pub struct TransactionJournal {
    store: TransactionStore,
}

impl TransactionJournal {
    pub fn new(store: TransactionStore) -> Self {
        Self { store }
    }

    /// Journal over a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::<TransactionId, Transaction>::new()))
    }

    /// Persist a new pending record.
    pub async fn open(&self, transaction: Transaction) -> Result<PendingTransaction> {
        if !transaction.is_pending() {
            return Err(WalletError::Internal(format!(
                "transaction {} opened in status {}",
                transaction.id, transaction.status
            )));
        }

        match self.store.create(transaction.id, transaction).await? {
            CreateOutcome::Created(stored) => {
                debug!(
                    transaction_id = %stored.record.id,
                    kind = %stored.record.kind,
                    "Transaction opened"
                );
                Ok(PendingTransaction {
                    record: stored.record,
                    version: stored.version,
                })
            }
            CreateOutcome::Exists(existing) => Err(WalletError::Internal(format!(
                "transaction id {} already in use",
                existing.record.id
            ))),
        }
    }

    pub async fn mark_succeeded(&self, pending: PendingTransaction) -> Result<Transaction> {
        self.finish(pending, TransactionStatus::Success, None).await
    }

    pub async fn mark_failed(
        &self,
        pending: PendingTransaction,
        error_message: impl Into<String>,
    ) -> Result<Transaction> {
        self.finish(pending, TransactionStatus::Failed, Some(error_message.into()))
            .await
    }

    /// Look up a transaction by id.
    pub async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.store.get(&id).await?.map(|stored| stored.record))
    }

    async fn finish(
        &self,
        pending: PendingTransaction,
        status: TransactionStatus,
        error_message: Option<String>,
    ) -> Result<Transaction> {
        let settled = pending.record.settled(status, error_message);

        match self
            .store
            .compare_and_swap(&settled.id, pending.version, settled.clone())
            .await?
        {
            CasOutcome::Swapped(_) => {
                debug!(transaction_id = %settled.id, status = %status, "Transaction settled");
                Ok(settled)
            }
            CasOutcome::Conflict { current } => {
                warn!(
                    transaction_id = %settled.id,
                    expected = pending.version,
                    current = ?current,
                    "Pending transaction changed underneath its handle"
                );
                Err(WalletError::Internal(format!(
                    "transaction {} was modified concurrently",
                    settled.id
                )))
            }
        }
    }
}
