//! Versioned key-value store contract backing accounts and transactions.
//!
//! Every record carries a monotonic version. Writers read a record with its
//! version, compute a replacement and submit it with
//! [`VersionedStore::compare_and_swap`]; the swap only lands if nobody else
//! wrote in between.

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use fxwallet_common::WalletError;

/// Record version counter.
pub type Version = u64;

/// Version assigned to a freshly created record.
pub const INITIAL_VERSION: Version = 1;

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: Version,
}

impl<T> Versioned<T> {
    pub fn new(record: T, version: Version) -> Self {
        Self { record, version }
    }
}

/// Outcome of a create-if-absent.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    /// The record was inserted.
    Created(Versioned<T>),
    /// The key was already taken; the existing record is returned.
    Exists(Versioned<T>),
}

impl<T> CreateOutcome<T> {
    /// The stored record, whichever way the create went.
    pub fn into_stored(self) -> Versioned<T> {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::Exists(v) => v,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed; the record now has this version.
    Swapped(Version),
    /// The stored version no longer matched (or the record vanished).
    Conflict { current: Option<Version> },
}

/// Store backend failures. Conflicts are not errors; see [`CasOutcome`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Record could not be encoded or decoded.
    #[error("Store codec error: {0}")]
    Codec(String),
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        WalletError::Internal(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Versioned key-value store with compare-and-swap.
#[async_trait]
pub trait VersionedStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Read a record and its current version.
    async fn get(&self, key: &K) -> StoreResult<Option<Versioned<V>>>;

    /// Insert at [`INITIAL_VERSION`] unless the key already exists.
    async fn create(&self, key: K, record: V) -> StoreResult<CreateOutcome<V>>;

    /// Replace the record only if its stored version equals `expected`.
    async fn compare_and_swap(&self, key: &K, expected: Version, record: V)
        -> StoreResult<CasOutcome>;
}

/// Shared handle to a store.
pub type SharedStore<K, V> = Arc<dyn VersionedStore<K, V>>;

/// In-process store over a sharded concurrent map.
pub struct InMemoryStore<K, V> {
    records: DashMap<K, Versioned<V>>,
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of every stored record, in no particular order.
    pub fn records(&self) -> Vec<Versioned<V>>
    where
        V: Clone,
    {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl<K, V> Default for InMemoryStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> VersionedStore<K, V> for InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> StoreResult<Option<Versioned<V>>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn create(&self, key: K, record: V) -> StoreResult<CreateOutcome<V>> {
        match self.records.entry(key) {
            Entry::Occupied(existing) => Ok(CreateOutcome::Exists(existing.get().clone())),
            Entry::Vacant(slot) => {
                let stored = Versioned::new(record, INITIAL_VERSION);
                slot.insert(stored.clone());
                Ok(CreateOutcome::Created(stored))
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &K,
        expected: Version,
        record: V,
    ) -> StoreResult<CasOutcome> {
        // The shard write lock held by get_mut makes check-and-write atomic.
        match self.records.get_mut(key) {
            Some(mut current) if current.version == expected => {
                let next = expected + 1;
                *current = Versioned::new(record, next);
                Ok(CasOutcome::Swapped(next))
            }
            Some(current) => Ok(CasOutcome::Conflict {
                current: Some(current.version),
            }),
            None => Ok(CasOutcome::Conflict { current: None }),
        }
    }
}
