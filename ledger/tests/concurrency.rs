mod common;

use std::time::Duration;

use common::{Harness, SCOPES};
use fundsline_common::{CreateAccountRequest, Currency, ErrorKind, TopUpRequest, TransferRequest};
use fundsline_ledger::ConversionScope;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_top_ups_both_apply() {
    let h = Harness::new(ConversionScope::BeforeUnit);
    let id = h.funded("Alice", Currency::usd(), Decimal::ZERO).await;

    let a = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.top_up(id, TopUpRequest::new(dec!(10))).await })
    };
    let b = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.top_up(id, TopUpRequest::new(dec!(10))).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(h.balance(id).await, dec!(20));
    assert_eq!(h.deltas(id), vec![dec!(10), dec!(10)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_never_overdraw() {
    for scope in SCOPES {
        let h = Harness::new(scope);
        let sender = h.funded("Alice", Currency::usd(), dec!(100)).await;
        let mut receivers = Vec::new();
        for i in 0..6 {
            let currency = if i % 2 == 0 { Currency::usd() } else { Currency::eur() };
            receivers.push(h.funded(&format!("R{i}"), currency, Decimal::ZERO).await);
        }

        let mut handles = Vec::new();
        for i in 0..30 {
            let engine = h.engine.clone();
            let receiver = receivers[i % receivers.len()];
            handles.push(tokio::spawn(async move {
                engine
                    .transfer(TransferRequest::new(sender, receiver, dec!(10)))
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::BusinessRule),
            }
        }

        assert_eq!(succeeded, 10, "scope {scope}");
        assert_eq!(h.balance(sender).await, Decimal::ZERO);
        // One funding delta plus one per successful transfer.
        assert_eq!(h.deltas(sender).len(), 11);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_do_not_deadlock() {
    let h = Harness::new(ConversionScope::InsideUnit);
    let a = h.funded("Alice", Currency::usd(), dec!(500)).await;
    let b = h.funded("Bob", Currency::usd(), dec!(500)).await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let engine = h.engine.clone();
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            engine
                .transfer(TransferRequest::new(from, to, dec!(1.25)))
                .await
        }));
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    })
    .await
    .expect("transfers deadlocked");

    assert_eq!(h.balance(a).await + h.balance(b).await, dec!(1000));
    assert_eq!(h.balance(a).await, dec!(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creation_admits_one_account() {
    let h = Harness::new(ConversionScope::BeforeUnit);
    let customer = h.customer("Alice");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_account(CreateAccountRequest::new(customer, Currency::eur()))
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(h.accounts.len(), 1);
}

fn cents() -> impl Strategy<Value = Decimal> {
    (1i64..50_000).prop_map(|c| Decimal::new(c, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn same_currency_transfers_conserve_total(
        initial in cents(),
        amounts in proptest::collection::vec(cents(), 1..12),
    ) {
        tokio_test::block_on(async {
            let h = Harness::new(ConversionScope::BeforeUnit);
            let sender = h.funded("Alice", Currency::usd(), initial).await;
            let receiver = h.funded("Bob", Currency::usd(), Decimal::ZERO).await;

            let mut moved = Decimal::ZERO;
            for amount in amounts {
                let before = h.balance(sender).await;
                match h.engine.transfer(TransferRequest::new(sender, receiver, amount)).await {
                    Ok(receipt) => {
                        prop_assert_eq!(receipt.credited, amount);
                        prop_assert_eq!(h.balance(sender).await, before - amount);
                        moved += amount;
                    }
                    Err(e) => {
                        prop_assert!(amount > before);
                        prop_assert_eq!(e.kind(), ErrorKind::BusinessRule);
                    }
                }
                prop_assert_eq!(h.balance(sender).await + h.balance(receiver).await, initial);
            }
            prop_assert_eq!(h.balance(receiver).await, moved);
            Ok(())
        })?;
    }
}
