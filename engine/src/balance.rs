//! Multi-currency balance report.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};

use fxwallet_common::{round_money, Currency, Result, UserId, WalletError};
use fxwallet_fx::FxEngine;
use fxwallet_ledger::AccountManager;

/// A user's balances, each rounded for display, plus their total in one currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReport {
    pub user_id: UserId,
    pub requested_currency: Currency,
    pub total_balance: Decimal,
    pub per_currency_balances: BTreeMap<Currency, Decimal>,
}

/// Build the report, opening any missing account at zero first.
///
/// Zero balances are not priced, so a user holding a single currency never
/// needs a rate lookup. The total is summed at full precision and rounded once.
#[instrument(skip(accounts, fx), fields(user_id = %user_id))]
pub async fn balance_report(
    accounts: &AccountManager,
    fx: &FxEngine,
    user_id: &UserId,
    requested: Currency,
) -> Result<BalanceReport> {
    let mut per_currency = BTreeMap::new();
    let mut total = Decimal::ZERO;

    for account in accounts.open_all(user_id).await? {
        per_currency.insert(account.currency, round_money(account.balance));

        if account.balance.is_zero() {
            continue;
        }

        let priced = if account.currency == requested {
            Some(account.balance)
        } else {
            let rate = fx.get_rate(account.currency, requested).await?;
            debug!(currency = %account.currency, rate = %rate, "Pricing balance");
            account.balance.checked_mul(rate)
        };

        total = priced
            .and_then(|value| total.checked_add(value))
            .ok_or_else(|| {
                WalletError::Internal(format!(
                    "total balance of {user_id} in {requested} exceeds the decimal range"
                ))
            })?;
    }

    Ok(BalanceReport {
        user_id: user_id.clone(),
        requested_currency: requested,
        total_balance: round_money(total),
        per_currency_balances: per_currency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fxwallet_fx::{FxEngineConfig, StaticRateSource};
    use rust_decimal_macros::dec;

    fn fx(source: Arc<StaticRateSource>) -> FxEngine {
        FxEngine::new(source, FxEngineConfig::default())
    }

    #[tokio::test]
    async fn test_new_user_gets_both_accounts() {
        let accounts = AccountManager::in_memory();
        let source = Arc::new(StaticRateSource::new());
        let alice = UserId::new("alice");

        let report = balance_report(&accounts, &fx(source.clone()), &alice, Currency::Usd)
            .await
            .unwrap();

        assert_eq!(report.total_balance, dec!(0.00));
        assert_eq!(report.per_currency_balances.len(), 2);
        assert_eq!(source.fetch_count(), 0);
        assert_eq!(accounts.get_all_accounts(&alice).await.unwrap().len(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["perCurrencyBalances"]["USD"], "0.00");
        assert_eq!(json["totalBalance"], "0.00");
    }

    #[tokio::test]
    async fn test_total_converts_other_currency() {
        let accounts = AccountManager::in_memory();
        let source = Arc::new(StaticRateSource::new().with_rate(Currency::Try, Currency::Usd, dec!(0.037)));
        let alice = UserId::new("alice");
        accounts.add(&alice, Currency::Usd, dec!(1000.00)).await.unwrap();
        accounts.add(&alice, Currency::Try, dec!(5000.00)).await.unwrap();

        let report = balance_report(&accounts, &fx(source), &alice, Currency::Usd)
            .await
            .unwrap();

        assert_eq!(report.total_balance, dec!(1185.00));
        assert_eq!(report.per_currency_balances[&Currency::Try], dec!(5000.00));
    }

    #[tokio::test]
    async fn test_rate_failure_propagates() {
        let accounts = AccountManager::in_memory();
        let source = Arc::new(StaticRateSource::new());
        let alice = UserId::new("alice");
        accounts.add(&alice, Currency::Try, dec!(1)).await.unwrap();

        let result = balance_report(&accounts, &fx(source), &alice, Currency::Usd).await;
        assert!(matches!(result, Err(WalletError::RateUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_unrepresentable_total_is_an_error() {
        let accounts = AccountManager::in_memory();
        let source = Arc::new(StaticRateSource::new().with_rate(Currency::Usd, Currency::Try, dec!(30)));
        let alice = UserId::new("alice");
        accounts.add(&alice, Currency::Usd, Decimal::MAX).await.unwrap();

        let result = balance_report(&accounts, &fx(source), &alice, Currency::Try).await;
        assert!(matches!(result, Err(WalletError::Internal(message)) if message.contains("alice")));
    }
}
