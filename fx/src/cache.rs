//! FX rate caching with TTL support.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use fxwallet_common::CurrencyPair;

/// Cached rate entry.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    rate: Decimal,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe per-pair rate cache with a fixed TTL.
///
/// Concurrent misses on the same pair are not coalesced; each caller may
/// fetch and the last insert wins.
pub struct RateCache {
    entries: DashMap<CurrencyPair, CacheEntry>,
    ttl: Duration,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Get a rate from cache if still fresh.
    pub fn get(&self, pair: &CurrencyPair) -> Option<Decimal> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(pair).map(|e| *e) {
            if entry.is_valid(now) {
                debug!(pair = %pair, "Cache hit");
                return Some(entry.rate);
            }
            debug!(pair = %pair, "Cache entry expired");
            self.entries.remove_if(pair, |_, e| !e.is_valid(now));
        }

        debug!(pair = %pair, "Cache miss");
        None
    }

    /// Store a freshly fetched rate; its expiry starts now.
    pub fn insert(&self, pair: CurrencyPair, rate: Decimal) {
        let entry = CacheEntry {
            rate,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(pair, entry);
    }

    /// Clear all cached rates.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_valid(now));
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total = self.entries.len();
        let valid = self.entries.iter().filter(|e| e.is_valid(now)).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total.saturating_sub(valid),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Shared rate cache.
pub type SharedRateCache = Arc<RateCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_common::Currency;
    use rust_decimal_macros::dec;

    fn usd_try() -> CurrencyPair {
        CurrencyPair::new(Currency::Usd, Currency::Try)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_insert_and_get() {
        let cache = RateCache::new(Duration::from_secs(60));
        cache.insert(usd_try(), dec!(30));

        assert_eq!(cache.get(&usd_try()), Some(dec!(30)));
        assert_eq!(cache.get(&usd_try().inverse()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expiry() {
        let cache = RateCache::new(Duration::from_secs(60));
        cache.insert(usd_try(), dec!(30));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&usd_try()), Some(dec!(30)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&usd_try()), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_stats_and_eviction() {
        let cache = RateCache::new(Duration::from_secs(60));
        cache.insert(usd_try(), dec!(30));

        tokio::time::advance(Duration::from_secs(30)).await;
        cache.insert(usd_try().inverse(), dec!(0.033));

        tokio::time::advance(Duration::from_secs(31)).await;
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        cache.evict_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&usd_try().inverse()), Some(dec!(0.033)));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes_expiry() {
        let cache = RateCache::new(Duration::from_secs(60));
        cache.insert(usd_try(), dec!(30));

        tokio::time::advance(Duration::from_secs(50)).await;
        cache.insert(usd_try(), dec!(31));

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get(&usd_try()), Some(dec!(31)));
    }
}
