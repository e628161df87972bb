//! Simulation scenarios.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use fxwallet_common::Currency;

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Submit a deposit.
    Deposit {
        user: String,
        currency: Currency,
        amount: Decimal,
    },
    /// Submit a withdrawal.
    Withdraw {
        user: String,
        currency: Currency,
        amount: Decimal,
    },
    /// Run an exchange and check how it ended.
    Exchange {
        user: String,
        from: Currency,
        to: Currency,
        amount: Decimal,
        expect: ExchangeExpectation,
    },
    /// Wait for every accepted settlement to finish.
    Settle,
    /// Advance wall time.
    Wait { millis: u64 },
    /// Change a rate on the static rate source.
    SetRate {
        from: Currency,
        to: Currency,
        rate: Decimal,
    },
    /// Take the static rate source down (`true`) or back up.
    RateOutage { down: bool },
    /// Drop every cached rate.
    ClearRates,
    /// Check one account balance.
    AssertBalance {
        user: String,
        currency: Currency,
        amount: Decimal,
    },
    /// Check a balance report total.
    AssertTotal {
        user: String,
        currency: Currency,
        amount: Decimal,
    },
}

/// How an exchange step is expected to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeExpectation {
    Success,
    Failed,
    InsufficientFunds,
    RateUnavailable,
    Any,
}

impl Scenario {
    /// Load a built-in scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "balance-report" => Ok(Self::balance_report()),
            "exchange" => Ok(Self::exchange()),
            "withdraw-race" => Ok(Self::withdraw_race()),
            "rate-outage" => Ok(Self::rate_outage()),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (expected one of: {})",
                name,
                Self::builtin_names().join(", ")
            )),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["balance-report", "exchange", "withdraw-race", "rate-outage"]
    }

    /// Totals for an empty and a funded user.
    fn balance_report() -> Self {
        Self {
            name: "balance-report".to_string(),
            description: "Balance totals across both currencies".to_string(),
            steps: vec![
                ScenarioStep::AssertTotal {
                    user: "newcomer".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(0.00),
                },
                ScenarioStep::SetRate {
                    from: Currency::Try,
                    to: Currency::Usd,
                    rate: dec!(0.037),
                },
                ScenarioStep::Deposit {
                    user: "holder".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(1000.00),
                },
                ScenarioStep::Deposit {
                    user: "holder".to_string(),
                    currency: Currency::Try,
                    amount: dec!(5000.00),
                },
                ScenarioStep::Settle,
                ScenarioStep::AssertTotal {
                    user: "holder".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(1185.00),
                },
            ],
        }
    }

    /// Rejected and successful exchanges.
    fn exchange() -> Self {
        Self {
            name: "exchange".to_string(),
            description: "Exchange with and without sufficient funds".to_string(),
            steps: vec![
                ScenarioStep::SetRate {
                    from: Currency::Usd,
                    to: Currency::Try,
                    rate: dec!(30.0),
                },
                ScenarioStep::Deposit {
                    user: "short".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(50.00),
                },
                ScenarioStep::Deposit {
                    user: "trader".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(1000.00),
                },
                ScenarioStep::Settle,
                ScenarioStep::Exchange {
                    user: "short".to_string(),
                    from: Currency::Usd,
                    to: Currency::Try,
                    amount: dec!(100.00),
                    expect: ExchangeExpectation::InsufficientFunds,
                },
                ScenarioStep::AssertBalance {
                    user: "short".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(50.00),
                },
                ScenarioStep::Exchange {
                    user: "trader".to_string(),
                    from: Currency::Usd,
                    to: Currency::Try,
                    amount: dec!(100.00),
                    expect: ExchangeExpectation::Success,
                },
                ScenarioStep::AssertBalance {
                    user: "trader".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(900.00),
                },
                ScenarioStep::AssertBalance {
                    user: "trader".to_string(),
                    currency: Currency::Try,
                    amount: dec!(3000.00),
                },
            ],
        }
    }

    /// Withdrawals racing for the same funds.
    fn withdraw_race() -> Self {
        let mut steps = vec![
            ScenarioStep::Deposit {
                user: "racer".to_string(),
                currency: Currency::Try,
                amount: dec!(100),
            },
            ScenarioStep::Settle,
        ];
        steps.extend((0..8).map(|_| ScenarioStep::Withdraw {
            user: "racer".to_string(),
            currency: Currency::Try,
            amount: dec!(30),
        }));
        steps.push(ScenarioStep::Settle);
        steps.push(ScenarioStep::AssertBalance {
            user: "racer".to_string(),
            currency: Currency::Try,
            amount: dec!(10),
        });

        Self {
            name: "withdraw-race".to_string(),
            description: "Concurrent withdrawals never overdraw".to_string(),
            steps,
        }
    }

    /// Exchanges while the rate source is down.
    fn rate_outage() -> Self {
        Self {
            name: "rate-outage".to_string(),
            description: "Exchange fails cleanly without a rate".to_string(),
            steps: vec![
                ScenarioStep::Deposit {
                    user: "patient".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(10),
                },
                ScenarioStep::Settle,
                ScenarioStep::ClearRates,
                ScenarioStep::RateOutage { down: true },
                ScenarioStep::Exchange {
                    user: "patient".to_string(),
                    from: Currency::Usd,
                    to: Currency::Try,
                    amount: dec!(5),
                    expect: ExchangeExpectation::RateUnavailable,
                },
                ScenarioStep::RateOutage { down: false },
                ScenarioStep::Exchange {
                    user: "patient".to_string(),
                    from: Currency::Usd,
                    to: Currency::Try,
                    amount: dec!(5),
                    expect: ExchangeExpectation::Success,
                },
                ScenarioStep::AssertBalance {
                    user: "patient".to_string(),
                    currency: Currency::Usd,
                    amount: dec!(5),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_load() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, *name);
            assert!(!scenario.steps.is_empty());
        }

        let err = Scenario::load("nope").unwrap_err().to_string();
        assert!(err.contains("Unknown scenario: nope"));
        assert!(err.contains("withdraw-race"));
    }

    #[test]
    fn test_step_json_shape() {
        let step: ScenarioStep = serde_json::from_str(
            r#"{"step":"exchange","user":"a","from":"USD","to":"try","amount":"1.5","expect":"success"}"#,
        )
        .unwrap();
        assert!(matches!(
            step,
            ScenarioStep::Exchange { to: Currency::Try, expect: ExchangeExpectation::Success, .. }
        ));
    }
}
