//! Simulation controller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use fxwallet_common::{Currency, TransactionId, UserId, WalletError};
use fxwallet_engine::{DepositRequest, ExchangeRequest, Wallet, WithdrawRequest};
use fxwallet_fx::StaticRateSource;
use fxwallet_ledger::{TransactionStatus, TransactionType};

use crate::metrics::SimulationMetrics;
use crate::scenario::{ExchangeExpectation, Scenario, ScenarioStep};

/// Outcome of the post-run ledger audit.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerAudit {
    pub transactions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub accounts_checked: usize,
}

/// Result of one spawned load operation.
enum OpResult {
    Accepted(Vec<TransactionId>),
    Exchanged(Vec<TransactionId>, Duration),
    Rejected,
}

/// Drives a wallet through scenarios or random load.
pub struct SimulationController {
    wallet: Arc<Wallet>,
    rates: Option<Arc<StaticRateSource>>,
    rng: StdRng,
    users: Vec<UserId>,
    metrics: SimulationMetrics,
    submitted: Vec<TransactionId>,
}

impl SimulationController {
    pub fn new(
        wallet: Arc<Wallet>,
        rates: Option<Arc<StaticRateSource>>,
        user_count: usize,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let users = (0..user_count.max(1))
            .map(|i| UserId::new(format!("user-{i:03}")))
            .collect();

        Self {
            wallet,
            rates,
            rng,
            users,
            metrics: SimulationMetrics::new(),
            submitted: Vec::new(),
        }
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// Run a scenario, failing on the first unmet expectation.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<()> {
        info!(scenario = %scenario.name, description = %scenario.description, "Running scenario");

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step)
                .await
                .map_err(|e| anyhow!("step {} ({:?}) failed: {}", index + 1, step, e))?;
        }

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "Scenario passed");
        Ok(())
    }

    /// Fund every user, then fire `operations` random operations concurrently.
    pub async fn run_load(&mut self, operations: usize) -> anyhow::Result<()> {
        info!(users = self.users.len(), operations, "Running random load");

        for user in self.users.clone() {
            for (currency, amount) in [(Currency::Usd, 1_000), (Currency::Try, 30_000)] {
                let request = DepositRequest {
                    currency,
                    amount: Decimal::from(amount),
                    description: Some("initial funding".to_string()),
                };
                let receipt = self.wallet.deposit(&user, request).await?;
                self.metrics.record_accepted();
                self.submitted.push(receipt.transaction_id);
            }
        }
        self.settle().await?;

        let mut tasks = JoinSet::new();
        for _ in 0..operations {
            let user = self.users[self.rng.gen_range(0..self.users.len())].clone();
            let currency = if self.rng.gen_bool(0.5) { Currency::Usd } else { Currency::Try };
            let amount = Decimal::new(self.rng.gen_range(1..=50_000), 2);
            let roll = self.rng.gen_range(0..10);
            let wallet = self.wallet.clone();

            tasks.spawn(async move { random_operation(&wallet, &user, currency, amount, roll).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined? {
                OpResult::Accepted(ids) => {
                    self.metrics.record_accepted();
                    self.submitted.extend(ids);
                }
                OpResult::Exchanged(ids, latency) => {
                    self.metrics.record_accepted();
                    self.metrics.record_latency(latency);
                    self.submitted.extend(ids);
                }
                OpResult::Rejected => self.metrics.record_rejected(),
            }
        }

        self.settle().await
    }

    /// Recompute every balance from the journal and compare with the ledger.
    pub async fn audit(&self) -> anyhow::Result<LedgerAudit> {
        self.settle().await?;

        let mut expected: BTreeMap<(UserId, Currency), Decimal> = BTreeMap::new();
        let (mut succeeded, mut failed) = (0, 0);

        for id in &self.submitted {
            let tx = self
                .wallet
                .transaction(*id)
                .await?
                .ok_or_else(|| anyhow!("transaction {} missing from journal", id))?;

            match tx.status {
                TransactionStatus::Pending => bail!("transaction {} still pending", id),
                TransactionStatus::Failed => {
                    failed += 1;
                    continue;
                }
                TransactionStatus::Success => succeeded += 1,
            }

            let signed = match tx.kind {
                TransactionType::Deposit | TransactionType::ExchangeTo => tx.amount,
                TransactionType::Withdraw | TransactionType::ExchangeFrom => -tx.amount,
            };
            let entry = expected.entry((tx.user_id.clone(), tx.currency)).or_default();
            *entry = entry
                .checked_add(signed)
                .ok_or_else(|| anyhow!("journal total for {}/{} overflows", tx.user_id, tx.currency))?;
        }

        for ((user, currency), want) in &expected {
            let have = self
                .wallet
                .accounts()
                .find(user, *currency)
                .await?
                .map_or(Decimal::ZERO, |a| a.balance);
            if have != *want {
                bail!("{}/{} balance {} does not match journal {}", user, currency, have, want);
            }
            if have < Decimal::ZERO {
                bail!("{}/{} balance is negative: {}", user, currency, have);
            }
        }

        let audit = LedgerAudit {
            transactions: self.submitted.len(),
            succeeded,
            failed,
            accounts_checked: expected.len(),
        };
        info!(?audit, "Ledger audit passed");
        Ok(audit)
    }

    async fn settle(&self) -> anyhow::Result<()> {
        let timeout = self.wallet.config().settlement.drain_timeout;
        if !self.wallet.wait_idle(timeout).await {
            bail!("settlements still in flight after {:?}", timeout);
        }
        Ok(())
    }

    fn static_rates(&self) -> anyhow::Result<&StaticRateSource> {
        self.rates
            .as_deref()
            .ok_or_else(|| anyhow!("step needs the static rate source"))
    }

    /// Execute a single scenario step.
    async fn execute_step(&mut self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Deposit { user, currency, amount } => {
                let request = DepositRequest {
                    currency: *currency,
                    amount: *amount,
                    description: None,
                };
                let receipt = self.wallet.deposit(&UserId::new(user.as_str()), request).await?;
                self.metrics.record_accepted();
                self.submitted.push(receipt.transaction_id);
            }
            ScenarioStep::Withdraw { user, currency, amount } => {
                let request = WithdrawRequest {
                    currency: *currency,
                    amount: *amount,
                    description: None,
                };
                let receipt = self.wallet.withdraw(&UserId::new(user.as_str()), request).await?;
                self.metrics.record_accepted();
                self.submitted.push(receipt.transaction_id);
            }
            ScenarioStep::Exchange { user, from, to, amount, expect } => {
                let request = ExchangeRequest {
                    from_currency: *from,
                    to_currency: *to,
                    amount: *amount,
                    description: None,
                };
                let started = Instant::now();
                let result = self.wallet.exchange(&UserId::new(user.as_str()), request).await;
                self.metrics.record_latency(started.elapsed());

                let observed = match &result {
                    Ok(outcome) => {
                        self.metrics.record_accepted();
                        self.submitted
                            .extend([outcome.transaction_id, outcome.counter_transaction_id]);
                        if outcome.status == TransactionStatus::Success {
                            ExchangeExpectation::Success
                        } else {
                            ExchangeExpectation::Failed
                        }
                    }
                    Err(e) => {
                        self.metrics.record_rejected();
                        match e {
                            WalletError::InsufficientFunds { .. } => ExchangeExpectation::InsufficientFunds,
                            WalletError::RateUnavailable { .. } => ExchangeExpectation::RateUnavailable,
                            other => bail!("exchange error: {}", other),
                        }
                    }
                };

                if *expect != ExchangeExpectation::Any && observed != *expect {
                    bail!("expected exchange to end {:?}, got {:?}", expect, observed);
                }
            }
            ScenarioStep::Settle => self.settle().await?,
            ScenarioStep::Wait { millis } => {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            }
            ScenarioStep::SetRate { from, to, rate } => {
                self.static_rates()?.set_rate(*from, *to, *rate);
                // A new rate only shows once the cached one is gone.
                self.wallet.fx().cache().clear();
            }
            ScenarioStep::RateOutage { down } => {
                let reason = down.then(|| "simulated outage".to_string());
                self.static_rates()?.set_unavailable(reason);
            }
            ScenarioStep::ClearRates => self.wallet.fx().cache().clear(),
            ScenarioStep::AssertBalance { user, currency, amount } => {
                let have = self
                    .wallet
                    .accounts()
                    .find(&UserId::new(user.as_str()), *currency)
                    .await?
                    .map_or(Decimal::ZERO, |a| a.balance);
                if have != *amount {
                    bail!("{}/{} balance is {}, expected {}", user, currency, have, amount);
                }
            }
            ScenarioStep::AssertTotal { user, currency, amount } => {
                let report = self
                    .wallet
                    .get_balance(&UserId::new(user.as_str()), Some(*currency))
                    .await?;
                if report.total_balance != *amount {
                    bail!(
                        "{} total in {} is {}, expected {}",
                        user,
                        currency,
                        report.total_balance,
                        amount
                    );
                }
            }
        }

        Ok(())
    }
}

/// One random wallet call. `roll` picks the kind: 0-3 deposit, 4-6 withdraw, 7-9 exchange.
async fn random_operation(
    wallet: &Wallet,
    user: &UserId,
    currency: Currency,
    amount: Decimal,
    roll: u8,
) -> OpResult {
    let result = match roll {
        0..=3 => wallet
            .deposit(user, DepositRequest { currency, amount, description: None })
            .await
            .map(|r| OpResult::Accepted(vec![r.transaction_id])),
        4..=6 => wallet
            .withdraw(user, WithdrawRequest { currency, amount, description: None })
            .await
            .map(|r| OpResult::Accepted(vec![r.transaction_id])),
        _ => {
            let request = ExchangeRequest {
                from_currency: currency,
                to_currency: currency.counterpart(),
                amount,
                description: None,
            };
            let started = Instant::now();
            wallet.exchange(user, request).await.map(|outcome| {
                OpResult::Exchanged(
                    vec![outcome.transaction_id, outcome.counter_transaction_id],
                    started.elapsed(),
                )
            })
        }
    };

    result.unwrap_or_else(|e| {
        warn!(
            user_id = %user,
            code = e.error_code(),
            status = e.status_code(),
            error = %e,
            "Operation rejected"
        );
        OpResult::Rejected
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_engine::{LogNotifier, WalletConfig};
    use fxwallet_fx::{FxEngine, FxEngineConfig};
    use fxwallet_ledger::{AccountManager, TransactionJournal};
    use rust_decimal_macros::dec;

    fn controller(users: usize) -> SimulationController {
        let mut config = WalletConfig::default();
        config.settlement.deposit_delay = Duration::from_millis(5);
        config.settlement.withdraw_delay = Duration::from_millis(5);
        config.settlement.drain_timeout = Duration::from_secs(5);

        let rates = Arc::new(
            StaticRateSource::new()
                .with_rate(Currency::Usd, Currency::Try, dec!(30.0))
                .with_rate(Currency::Try, Currency::Usd, dec!(0.037)),
        );
        let fx = Arc::new(FxEngine::new(
            rates.clone(),
            FxEngineConfig {
                cache_ttl: config.rate.cache_ttl,
            },
        ));
        let wallet = Arc::new(Wallet::new(
            config,
            Arc::new(AccountManager::in_memory()),
            Arc::new(TransactionJournal::in_memory()),
            fx,
            Arc::new(LogNotifier),
        ));

        SimulationController::new(wallet, Some(rates), users, Some(7))
    }

    #[tokio::test]
    async fn test_builtin_scenarios_pass() {
        for name in Scenario::builtin_names() {
            let mut controller = controller(1);
            let scenario = Scenario::load(name).unwrap();
            controller.run_scenario(&scenario).await.unwrap();
            controller.audit().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_failed_assertion_reports_step() {
        let mut controller = controller(1);
        let scenario = Scenario {
            name: "broken".to_string(),
            description: String::new(),
            steps: vec![ScenarioStep::AssertBalance {
                user: "nobody".to_string(),
                currency: Currency::Usd,
                amount: dec!(1),
            }],
        };

        let err = controller.run_scenario(&scenario).await.unwrap_err();
        assert!(err.to_string().starts_with("step 1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_random_load_audits_clean() {
        let mut controller = controller(4);
        controller.run_load(60).await.unwrap();

        let audit = controller.audit().await.unwrap();
        assert_eq!(audit.succeeded + audit.failed, audit.transactions);
        // Eight funding deposits always land.
        assert!(audit.succeeded >= 8);
    }
}
