mod support;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fxwallet_common::{Currency, UserId, WalletError};
use fxwallet_engine::{DepositRequest, ExchangeRequest, WithdrawRequest};
use fxwallet_ledger::{AccountManager, TransactionStatus, TransactionType};

use support::{balance, settle, wallet, wallet_with_accounts, RefusingStore};

fn deposit(currency: Currency, amount: Decimal) -> DepositRequest {
    DepositRequest {
        currency,
        amount,
        description: None,
    }
}

fn exchange(from: Currency, to: Currency, amount: Decimal) -> ExchangeRequest {
    ExchangeRequest {
        from_currency: from,
        to_currency: to,
        amount,
        description: None,
    }
}

#[tokio::test(start_paused = true)]
async fn new_user_balance_opens_both_accounts() {
    let t = wallet();
    let user = UserId::new("new-user");

    let report = t.wallet.get_balance(&user, Some(Currency::Usd)).await.unwrap();

    assert_eq!(report.requested_currency, Currency::Usd);
    assert_eq!(report.total_balance, dec!(0.00));
    assert_eq!(report.per_currency_balances[&Currency::Usd], dec!(0.00));
    assert_eq!(report.per_currency_balances[&Currency::Try], dec!(0.00));
    assert_eq!(t.wallet.accounts().get_all_accounts(&user).await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn balance_total_prices_other_currency() {
    let t = wallet();
    let user = UserId::new("holder");
    t.wallet.deposit(&user, deposit(Currency::Usd, dec!(1000.00))).await.unwrap();
    t.wallet.deposit(&user, deposit(Currency::Try, dec!(5000.00))).await.unwrap();
    settle(&t.wallet).await;

    let report = t.wallet.get_balance(&user, None).await.unwrap();

    assert_eq!(report.requested_currency, Currency::Usd);
    assert_eq!(report.total_balance, dec!(1185.00));
}

#[tokio::test(start_paused = true)]
async fn exchange_without_funds_fails_both_legs() {
    let t = wallet();
    let user = UserId::new("short");
    t.wallet.deposit(&user, deposit(Currency::Usd, dec!(50.00))).await.unwrap();
    settle(&t.wallet).await;

    let result = t
        .wallet
        .exchange(&user, exchange(Currency::Usd, Currency::Try, dec!(100.00)))
        .await;

    assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));
    assert_eq!(balance(&t.wallet, &user, Currency::Usd).await, dec!(50.00));
    assert_eq!(balance(&t.wallet, &user, Currency::Try).await, Decimal::ZERO);
    assert_eq!(t.wallet.metrics().exchanges_rejected, 1);

    let legs: Vec<_> = t
        .transactions_of(&user)
        .into_iter()
        .filter(|tx| tx.kind != TransactionType::Deposit)
        .collect();
    assert_eq!(legs.len(), 2);
    assert!(legs.iter().any(|tx| tx.kind == TransactionType::ExchangeFrom));
    assert!(legs.iter().any(|tx| tx.kind == TransactionType::ExchangeTo));
    for leg in &legs {
        assert_eq!(leg.status, TransactionStatus::Failed);
        assert!(leg.error_message.as_deref().unwrap().contains("Insufficient funds"));
        assert_eq!(leg.exchange_rate, Some(dec!(30.0)));
    }
}

#[tokio::test(start_paused = true)]
async fn exchange_moves_value_at_rate() {
    let t = wallet();
    let user = UserId::new("trader");
    t.wallet.deposit(&user, deposit(Currency::Usd, dec!(1000.00))).await.unwrap();
    settle(&t.wallet).await;

    let outcome = t
        .wallet
        .exchange(&user, exchange(Currency::Usd, Currency::Try, dec!(100.00)))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Success);
    assert_eq!(balance(&t.wallet, &user, Currency::Usd).await, dec!(900.00));
    assert_eq!(balance(&t.wallet, &user, Currency::Try).await, dec!(3000.00));

    for id in [outcome.transaction_id, outcome.counter_transaction_id] {
        let leg = t.wallet.transaction(id).await.unwrap().unwrap();
        assert_eq!(leg.status, TransactionStatus::Success);
        assert_eq!(leg.exchange_rate, Some(dec!(30.0)));
        assert!(leg.processed_at.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn exchange_credit_failure_leaves_balances_untouched() {
    let accounts = Arc::new(AccountManager::new(Arc::new(RefusingStore::new(Currency::Try))));
    let t = wallet_with_accounts(accounts);
    let user = UserId::new("unlucky");
    t.wallet.deposit(&user, deposit(Currency::Usd, dec!(200))).await.unwrap();
    settle(&t.wallet).await;

    let outcome = t
        .wallet
        .exchange(&user, exchange(Currency::Usd, Currency::Try, dec!(100)))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Failed);
    assert!(outcome.message.starts_with("Exchange failed: "));
    assert_eq!(balance(&t.wallet, &user, Currency::Usd).await, dec!(200));
    assert_eq!(balance(&t.wallet, &user, Currency::Try).await, Decimal::ZERO);

    for id in [outcome.transaction_id, outcome.counter_transaction_id] {
        let leg = t.wallet.transaction(id).await.unwrap().unwrap();
        assert_eq!(leg.status, TransactionStatus::Failed);
        assert!(leg.error_message.is_some());
    }
    assert_eq!(t.wallet.metrics().exchanges_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_deposits_sum_regardless_of_order() {
    let t = wallet();
    let user = UserId::new("busy");
    let amounts: Vec<Decimal> = (1..=50).map(|i| Decimal::new(i * 137, 2)).collect();

    let (wallet, user_ref) = (&t.wallet, &user);
    let submissions = amounts
        .iter()
        .map(move |amount| wallet.deposit(user_ref, deposit(Currency::Try, *amount)));
    for receipt in futures::future::join_all(submissions).await {
        assert_eq!(receipt.unwrap().status, TransactionStatus::Pending);
    }
    settle(&t.wallet).await;

    let expected: Decimal = amounts.iter().copied().sum();
    assert_eq!(balance(&t.wallet, &user, Currency::Try).await, expected);
    assert_eq!(t.wallet.metrics().settlements_success, 50);
    assert_eq!(t.wallet.metrics().settlements_active, 0);
}

#[tokio::test(start_paused = true)]
async fn overdrawn_withdrawal_fails_and_is_notified() {
    let t = wallet();
    let user = UserId::new("saver");
    let mut events = t.notifier.subscribe(&user);
    t.wallet.deposit(&user, deposit(Currency::Usd, dec!(20))).await.unwrap();
    settle(&t.wallet).await;
    assert_eq!(events.recv().await.unwrap().status, TransactionStatus::Success);

    let receipt = t
        .wallet
        .withdraw(
            &user,
            WithdrawRequest {
                currency: Currency::Usd,
                amount: dec!(20.01),
                description: Some("rent".into()),
            },
        )
        .await
        .unwrap();
    settle(&t.wallet).await;

    let event = events.recv().await.unwrap();
    assert_eq!(event.transaction_id, receipt.transaction_id);
    assert_eq!(event.status, TransactionStatus::Failed);
    assert_eq!(event.message, "Withdraw failed");

    let tx = t.wallet.transaction(receipt.transaction_id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.description.as_deref(), Some("rent"));
    assert_eq!(balance(&t.wallet, &user, Currency::Usd).await, dec!(20));
}

#[tokio::test(start_paused = true)]
async fn racing_withdrawals_never_overdraw() {
    let t = wallet();
    let user = UserId::new("racer");
    t.wallet.deposit(&user, deposit(Currency::Usd, dec!(100))).await.unwrap();
    settle(&t.wallet).await;

    // All ten pass the pre-check together; only five can be debited.
    for _ in 0..10 {
        t.wallet
            .withdraw(
                &user,
                WithdrawRequest {
                    currency: Currency::Usd,
                    amount: dec!(20),
                    description: None,
                },
            )
            .await
            .unwrap();
    }
    settle(&t.wallet).await;

    let metrics = t.wallet.metrics();
    assert_eq!(balance(&t.wallet, &user, Currency::Usd).await, Decimal::ZERO);
    assert_eq!(metrics.settlements_success, 1 + 5);
    assert_eq!(metrics.settlements_failed, 5);
}

#[tokio::test(start_paused = true)]
async fn rate_is_refetched_only_after_ttl() {
    let t = wallet();
    let user = UserId::new("viewer");
    t.wallet.deposit(&user, deposit(Currency::Try, dec!(100))).await.unwrap();
    settle(&t.wallet).await;

    t.wallet.get_balance(&user, Some(Currency::Usd)).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    t.wallet.get_balance(&user, Some(Currency::Usd)).await.unwrap();
    assert_eq!(t.source.fetch_count(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    t.wallet.get_balance(&user, Some(Currency::Usd)).await.unwrap();
    assert_eq!(t.source.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_slow_settlements() {
    let t = wallet();
    let user = UserId::new("late");
    let receipt = t.wallet.deposit(&user, deposit(Currency::Usd, dec!(5))).await.unwrap();

    t.wallet.shutdown(Duration::from_millis(100)).await;

    let tx = t.wallet.transaction(receipt.transaction_id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.error_message, Some(WalletError::SettlementInterrupted.to_string()));
    assert_eq!(balance(&t.wallet, &user, Currency::Usd).await, Decimal::ZERO);
    assert_eq!(t.wallet.pending_settlements(), 0);
}

mod properties {
    use super::*;
    use fxwallet_common::round_money;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn exchange_is_all_or_nothing(start_cents in 0i64..500_000, ask_cents in 1i64..500_000) {
            let start = Decimal::new(start_cents, 2);
            let ask = Decimal::new(ask_cents, 2);

            let (result, usd, lira) = tokio_test::block_on(async {
                let t = wallet();
                let user = UserId::new("prop");
                t.wallet.accounts().get_or_create(&user, Currency::Usd).await.unwrap();
                if start > Decimal::ZERO {
                    t.wallet.accounts().add(&user, Currency::Usd, start).await.unwrap();
                }
                let result = t
                    .wallet
                    .exchange(&user, exchange(Currency::Usd, Currency::Try, ask))
                    .await;
                (
                    result,
                    balance(&t.wallet, &user, Currency::Usd).await,
                    balance(&t.wallet, &user, Currency::Try).await,
                )
            });

            if ask <= start {
                prop_assert_eq!(result.unwrap().status, TransactionStatus::Success);
                prop_assert_eq!(usd, start - ask);
                prop_assert_eq!(lira, round_money(ask * dec!(30.0)));
            } else {
                let rejected = matches!(result, Err(WalletError::InsufficientFunds { .. }));
                prop_assert!(rejected);
                prop_assert_eq!(usd, start);
                prop_assert_eq!(lira, Decimal::ZERO);
            }
        }
    }
}
