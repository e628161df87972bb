//! FxWallet Engine
//!
//! Ties the ledger and the FX engine into a two-currency wallet: deposits and
//! withdrawals settle asynchronously on a bounded worker pool, exchanges run
//! synchronously as one two-leg unit, and balances can be totalled in either
//! currency.

pub mod balance;
pub mod config;
pub mod exchange;
pub mod metrics;
pub mod notifier;
pub mod settlement;
pub mod state;
pub mod wallet;

pub use balance::BalanceReport;
pub use config::{LedgerConfig, RateConfig, SettlementConfig, WalletConfig};
pub use exchange::{ExchangeOrchestrator, ExchangeOutcome};
pub use metrics::{Metrics, MetricsSnapshot};
pub use notifier::{ChannelNotifier, LogNotifier, Notification, Notifier, SharedNotifier};
pub use settlement::SettlementPipeline;
pub use state::ServiceState;
pub use wallet::{
    DepositRequest, ExchangeRequest, TransactionReceipt, Wallet, WithdrawRequest,
};
