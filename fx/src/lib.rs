//! FxWallet FX Engine
//!
//! Exchange rate lookup for the USD/TRY wallet.
//!
//! # Features
//!
//! - Pluggable rate sources (HTTP endpoint or a static table)
//! - Per-pair rate cache with a fixed time-to-live
//! - Half-up conversion to two fractional digits
//!
//! # Example
//!
//! ```rust,ignore
//! use fxwallet_fx::{FxEngine, FxEngineConfig, HttpRateSource};
//! use fxwallet_common::Currency;
//!
//! let source = HttpRateSource::new("https://api.exchangerate-api.com/v4/latest", timeout)?;
//! let engine = FxEngine::new(Arc::new(source), FxEngineConfig::default());
//!
//! let rate = engine.get_rate(Currency::Usd, Currency::Try).await?;
//! let lira = engine.convert(dec!(100), Currency::Usd, Currency::Try).await?;
//! ```

pub mod engine;
pub mod provider;
pub mod cache;
pub mod error;

pub use engine::{FxEngine, FxEngineConfig};
pub use provider::{HttpRateSource, RateSnapshot, RateSource, SharedRateSource, StaticRateSource};
pub use cache::{CacheStats, RateCache};
pub use error::{FxError, FxResult, RateSourceError};
