//! Time utilities and constants for FxWallet.

/// Timing constants.
pub mod constants {
    use std::time::Duration;

    /// How long a fetched exchange rate stays fresh (60 seconds).
    pub const RATE_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Simulated payment-gateway round trip for deposits (1 second).
    pub const DEPOSIT_SETTLEMENT_DELAY: Duration = Duration::from_millis(1000);

    /// Simulated bank-transfer round trip for withdrawals (1.5 seconds).
    pub const WITHDRAW_SETTLEMENT_DELAY: Duration = Duration::from_millis(1500);

    /// Grace period for in-flight settlements on shutdown (30 seconds).
    pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout for a single rate source request (5 seconds).
    pub const RATE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
}
