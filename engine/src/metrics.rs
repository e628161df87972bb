//! Metrics collection for wallet monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Wallet metrics.
pub struct Metrics {
    /// Deposits accepted for settlement.
    pub deposits_submitted: AtomicU64,
    /// Withdrawals accepted for settlement.
    pub withdrawals_submitted: AtomicU64,
    /// Settlements that ended SUCCESS.
    pub settlements_success: AtomicU64,
    /// Settlements that ended FAILED.
    pub settlements_failed: AtomicU64,
    /// Settlements accepted but not yet terminal.
    pub settlements_active: AtomicU64,
    /// Exchanges with both legs SUCCESS.
    pub exchanges_success: AtomicU64,
    /// Exchanges accepted but failed.
    pub exchanges_failed: AtomicU64,
    /// Exchanges refused with an error.
    pub exchanges_rejected: AtomicU64,
    /// Notifications handed to the notifier.
    pub notifications_sent: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            deposits_submitted: AtomicU64::new(0),
            withdrawals_submitted: AtomicU64::new(0),
            settlements_success: AtomicU64::new(0),
            settlements_failed: AtomicU64::new(0),
            settlements_active: AtomicU64::new(0),
            exchanges_success: AtomicU64::new(0),
            exchanges_failed: AtomicU64::new(0),
            exchanges_rejected: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
        }
    }

    pub fn deposit_submitted(&self) {
        self.deposits_submitted.fetch_add(1, Ordering::Relaxed);
        self.settlements_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn withdrawal_submitted(&self) {
        self.withdrawals_submitted.fetch_add(1, Ordering::Relaxed);
        self.settlements_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record settlement success.
    pub fn settlement_success(&self) {
        self.settlements_success.fetch_add(1, Ordering::Relaxed);
        self.settlements_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record settlement failure.
    pub fn settlement_failed(&self) {
        self.settlements_failed.fetch_add(1, Ordering::Relaxed);
        self.settlements_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn exchange_success(&self) {
        self.exchanges_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_failed(&self) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_rejected(&self) {
        self.exchanges_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    ///
    /// `cas_conflicts` comes from the account manager, which owns that count.
    pub fn snapshot(&self, cas_conflicts: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            deposits_submitted: self.deposits_submitted.load(Ordering::Relaxed),
            withdrawals_submitted: self.withdrawals_submitted.load(Ordering::Relaxed),
            settlements_success: self.settlements_success.load(Ordering::Relaxed),
            settlements_failed: self.settlements_failed.load(Ordering::Relaxed),
            settlements_active: self.settlements_active.load(Ordering::Relaxed),
            exchanges_success: self.exchanges_success.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            exchanges_rejected: self.exchanges_rejected.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            cas_conflicts,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub deposits_submitted: u64,
    pub withdrawals_submitted: u64,
    pub settlements_success: u64,
    pub settlements_failed: u64,
    pub settlements_active: u64,
    pub exchanges_success: u64,
    pub exchanges_failed: u64,
    pub exchanges_rejected: u64,
    pub notifications_sent: u64,
    pub cas_conflicts: u64,
}

impl MetricsSnapshot {
    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let series: [(&str, &str, &str, u64); 10] = [
            ("deposits_submitted_total", "counter", "Deposits accepted for settlement", self.deposits_submitted),
            ("withdrawals_submitted_total", "counter", "Withdrawals accepted for settlement", self.withdrawals_submitted),
            ("settlements_success_total", "counter", "Settlements completed successfully", self.settlements_success),
            ("settlements_failed_total", "counter", "Settlements that failed", self.settlements_failed),
            ("settlements_active", "gauge", "Settlements not yet terminal", self.settlements_active),
            ("exchanges_success_total", "counter", "Exchanges completed successfully", self.exchanges_success),
            ("exchanges_failed_total", "counter", "Exchanges accepted but failed", self.exchanges_failed),
            ("exchanges_rejected_total", "counter", "Exchanges rejected before completion", self.exchanges_rejected),
            ("notifications_sent_total", "counter", "Notifications handed to the notifier", self.notifications_sent),
            ("account_cas_conflicts_total", "counter", "Optimistic balance writes that lost a race", self.cas_conflicts),
        ];

        let mut out = String::new();
        for (name, kind, help, value) in series {
            out.push_str(&format!(
                "# HELP fxwallet_{name} {help}\n# TYPE fxwallet_{name} {kind}\nfxwallet_{name} {value}\n\n"
            ));
        }
        out
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.deposit_submitted();
        metrics.withdrawal_submitted();
        metrics.settlement_success();

        let snapshot = metrics.snapshot(0);
        assert_eq!(snapshot.deposits_submitted, 1);
        assert_eq!(snapshot.withdrawals_submitted, 1);
        assert_eq!(snapshot.settlements_success, 1);
        assert_eq!(snapshot.settlements_active, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.deposit_submitted();
        metrics.exchange_rejected();

        let output = metrics.snapshot(7).to_prometheus();
        assert!(output.contains("fxwallet_deposits_submitted_total 1"));
        assert!(output.contains("fxwallet_exchanges_rejected_total 1"));
        assert!(output.contains("fxwallet_account_cas_conflicts_total 7"));
        assert!(output.contains("# TYPE fxwallet_settlements_active gauge"));
    }
}
