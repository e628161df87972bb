//! Wallet configuration.

use std::time::Duration;

use fxwallet_common::constants;
use fxwallet_ledger::DEFAULT_MAX_CAS_ATTEMPTS;

/// Exchange rate source configuration.
#[derive(Debug, Clone)]
pub struct RateConfig {
    /// Base URL of the rate endpoint; the base currency code is appended.
    pub api_url: String,
    /// How long a fetched rate is served from cache.
    pub cache_ttl: Duration,
    /// Per-request timeout against the rate endpoint.
    pub request_timeout: Duration,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.exchangerate-api.com/v4/latest".to_string(),
            cache_ttl: constants::RATE_CACHE_TTL,
            request_timeout: constants::RATE_REQUEST_TIMEOUT,
        }
    }
}

/// Settlement pipeline configuration.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Maximum settlements executing at once.
    pub max_concurrent: usize,
    /// Simulated payment-gateway wait before a deposit is applied.
    pub deposit_delay: Duration,
    /// Simulated bank-transfer wait before a withdrawal is applied.
    pub withdraw_delay: Duration,
    /// How long shutdown waits for in-flight settlements before interrupting them.
    pub drain_timeout: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            deposit_delay: constants::DEPOSIT_SETTLEMENT_DELAY,
            withdraw_delay: constants::WITHDRAW_SETTLEMENT_DELAY,
            drain_timeout: constants::SHUTDOWN_DRAIN_TIMEOUT,
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Upper bound on optimistic write attempts per balance change.
    pub max_cas_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }
}

/// Main wallet configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub rate: RateConfig,
    pub settlement: SettlementConfig,
    pub ledger: LedgerConfig,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rate: RateConfig::default(),
            settlement: SettlementConfig::default(),
            ledger: LedgerConfig::default(),
            log_level: "info".to_string(),
            log_json: true,
        }
    }
}

impl WalletConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FXWALLET_RATE_API_URL") {
            config.rate.api_url = url;
        }

        if let Some(secs) = env_parse::<u64>("FXWALLET_RATE_TTL_SECS") {
            config.rate.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(ms) = env_parse::<u64>("FXWALLET_RATE_TIMEOUT_MS") {
            config.rate.request_timeout = Duration::from_millis(ms);
        }

        if let Some(workers) = env_parse("FXWALLET_WORKERS") {
            config.settlement.max_concurrent = workers;
        }

        if let Some(ms) = env_parse::<u64>("FXWALLET_DEPOSIT_DELAY_MS") {
            config.settlement.deposit_delay = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse::<u64>("FXWALLET_WITHDRAW_DELAY_MS") {
            config.settlement.withdraw_delay = Duration::from_millis(ms);
        }

        if let Some(secs) = env_parse::<u64>("FXWALLET_DRAIN_TIMEOUT_SECS") {
            config.settlement.drain_timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = env_parse("FXWALLET_MAX_CAS_ATTEMPTS") {
            config.ledger.max_cas_attempts = attempts;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.log_json = !format.eq_ignore_ascii_case("pretty");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate.api_url.trim().is_empty() {
            return Err("Rate API URL cannot be empty".to_string());
        }

        if self.rate.cache_ttl.is_zero() {
            return Err("Rate cache TTL must be greater than 0".to_string());
        }

        if self.settlement.max_concurrent == 0 {
            return Err("Settlement worker count must be greater than 0".to_string());
        }

        if self.ledger.max_cas_attempts == 0 {
            return Err("Max CAS attempts must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}
