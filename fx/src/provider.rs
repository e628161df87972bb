//! Rate source trait and implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fxwallet_common::{Currency, CurrencyPair};

use crate::error::RateSourceError;

/// Rate table for one base currency as published by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base: String,
    /// As-of date reported by the source.
    #[serde(default)]
    pub date: Option<String>,
    /// Units of each quote currency per one unit of `base`, keyed by code.
    #[serde(default)]
    pub rates: Option<HashMap<String, Decimal>>,
}

impl RateSnapshot {
    /// Extract the `base -> quote` rate.
    pub fn rate_for(&self, quote: Currency) -> Result<Decimal, RateSourceError> {
        let rates = self.rates.as_ref().ok_or(RateSourceError::EmptyResponse)?;
        rates
            .get(quote.code())
            .copied()
            .ok_or_else(|| RateSourceError::MissingRate {
                base: self.base.clone(),
                quote: quote.code().to_string(),
            })
    }
}

/// External provider of rate tables, one request per base currency.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Fetch the latest rate table for `base`.
    async fn fetch(&self, base: Currency) -> Result<RateSnapshot, RateSourceError>;
}

/// Shared rate source handle.
pub type SharedRateSource = Arc<dyn RateSource>;

/// Rate source backed by an HTTP endpoint answering `GET {base_url}/{BASE}`.
#[derive(Clone)]
pub struct HttpRateSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RateSourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, base: Currency) -> String {
        format!("{}/{}", self.base_url, base.code())
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn fetch(&self, base: Currency) -> Result<RateSnapshot, RateSourceError> {
        let url = self.url_for(base);
        info!(url = %url, "Fetching exchange rates");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Rate source refused request");
            return Err(RateSourceError::Status(status.as_u16()));
        }

        let snapshot: RateSnapshot = response.json().await?;
        debug!(
            base = %snapshot.base,
            date = ?snapshot.date,
            entries = snapshot.rates.as_ref().map_or(0, HashMap::len),
            "Received rate table"
        );
        Ok(snapshot)
    }
}

/// In-process rate table, for simulation and tests.
pub struct StaticRateSource {
    rates: RwLock<HashMap<CurrencyPair, Decimal>>,
    unavailable: RwLock<Option<String>>,
    fetches: AtomicUsize,
}

impl StaticRateSource {
    pub fn new() -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Builder-style rate registration.
    pub fn with_rate(self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.set_rate(from, to, rate);
        self
    }

    /// Set or replace the `from -> to` rate.
    pub fn set_rate(&self, from: Currency, to: Currency, rate: Decimal) {
        self.rates.write().insert(CurrencyPair::new(from, to), rate);
    }

    /// Make every fetch fail with the given reason, or recover with `None`.
    pub fn set_unavailable(&self, reason: Option<String>) {
        *self.unavailable.write() = reason;
    }

    /// Number of fetches served or refused so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for StaticRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    fn name(&self) -> &str {
        "STATIC"
    }

    async fn fetch(&self, base: Currency) -> Result<RateSnapshot, RateSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.unavailable.read().clone() {
            return Err(RateSourceError::Unavailable(reason));
        }

        let rates = self
            .rates
            .read()
            .iter()
            .filter(|(pair, _)| pair.base == base)
            .map(|(pair, rate)| (pair.quote.code().to_string(), *rate))
            .collect();

        Ok(RateSnapshot {
            base: base.code().to_string(),
            date: Some(chrono::Utc::now().format("%Y-%m-%d").to_string()),
            rates: Some(rates),
        })
    }
}
