//! Simulation metrics.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Client-side view of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Operations attempted.
    pub total_operations: u64,
    /// Operations the wallet accepted.
    pub accepted: u64,
    /// Operations refused synchronously.
    pub rejected: u64,
    /// Exchange latency samples (microseconds).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            accepted: 0,
            rejected: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    pub fn record_accepted(&mut self) {
        self.total_operations += 1;
        self.accepted += 1;
    }

    pub fn record_rejected(&mut self) {
        self.total_operations += 1;
        self.rejected += 1;
    }

    /// Record how long a synchronous exchange took.
    pub fn record_latency(&mut self, latency: Duration) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples
            .push_back(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
    }

    /// Get average latency in microseconds.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of operations the wallet accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.accepted as f64 / self.total_operations as f64
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            total_operations: self.total_operations,
            accepted: self.accepted,
            rejected: self.rejected,
            acceptance_rate: self.acceptance_rate(),
            exchange_latency_avg_us: self.average_latency_us(),
            exchange_latency_p50_us: self.percentile_latency(50),
            exchange_latency_p99_us: self.percentile_latency(99),
        }
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable summary for the final report.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub total_operations: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub acceptance_rate: f64,
    pub exchange_latency_avg_us: u64,
    pub exchange_latency_p50_us: u64,
    pub exchange_latency_p99_us: u64,
}
