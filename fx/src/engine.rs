//! Main FX engine implementation.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use fxwallet_common::{constants, round_money, Currency, CurrencyPair};

use crate::cache::RateCache;
use crate::error::{FxError, FxResult, RateSourceError};
use crate::provider::SharedRateSource;

/// Configuration for the FX engine.
#[derive(Debug, Clone)]
pub struct FxEngineConfig {
    /// How long a fetched rate is served from cache.
    pub cache_ttl: Duration,
}

impl Default for FxEngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: constants::RATE_CACHE_TTL,
        }
    }
}

/// Rate lookup and conversion in front of a single rate source.
pub struct FxEngine {
    source: SharedRateSource,
    cache: RateCache,
}

impl FxEngine {
    pub fn new(source: SharedRateSource, config: FxEngineConfig) -> Self {
        Self {
            source,
            cache: RateCache::new(config.cache_ttl),
        }
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Rate that converts one unit of `from` into `to`.
    ///
    /// A currency converts to itself at exactly 1 without consulting the
    /// cache or the source. Otherwise a fresh cached rate is served, and an
    /// expired or missing one is fetched again. A failed fetch never falls
    /// back to an expired rate.
    #[instrument(skip(self))]
    pub async fn get_rate(&self, from: Currency, to: Currency) -> FxResult<Decimal> {
        let pair = CurrencyPair::new(from, to);
        if pair.is_identity() {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self.cache.get(&pair) {
            return Ok(rate);
        }

        let rate = self
            .fetch(pair)
            .await
            .map_err(|source| {
                warn!(pair = %pair, source_name = self.source.name(), error = %source, "Rate fetch failed");
                FxError::RateUnavailable { pair, source }
            })?;

        self.cache.evict_expired();
        self.cache.insert(pair, rate);
        info!(pair = %pair, rate = %rate, "Fetched exchange rate");
        Ok(rate)
    }

    /// Convert `amount` into `to`, rounded half-up to two digits.
    ///
    /// Same-currency conversion returns `amount` untouched, unrounded.
    pub async fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> FxResult<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let rate = self.get_rate(from, to).await?;
        Self::convert_with_rate(amount, CurrencyPair::new(from, to), rate)
    }

    /// Apply an already resolved rate for `pair`.
    pub fn convert_with_rate(amount: Decimal, pair: CurrencyPair, rate: Decimal) -> FxResult<Decimal> {
        amount
            .checked_mul(rate)
            .map(round_money)
            .ok_or(FxError::Overflow { pair, amount, rate })
    }

    async fn fetch(&self, pair: CurrencyPair) -> Result<Decimal, RateSourceError> {
        let snapshot = self.source.fetch(pair.base).await?;
        let rate = snapshot.rate_for(pair.quote)?;
        if rate <= Decimal::ZERO {
            return Err(RateSourceError::InvalidRate { pair, rate });
        }
        debug!(pair = %pair, as_of = ?snapshot.date, "Rate extracted from snapshot");
        Ok(rate)
    }
}

/// Shared FX engine.
pub type SharedFxEngine = Arc<FxEngine>;
