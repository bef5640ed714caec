use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CounterpartyAccount, Money, Order, OrderKind, OrderLine, OrderStatus, SkuOption};
use fulfillment::{FulfillmentEngine, TransitionRequest};
use ledger_store::{InMemoryLedgerStore, LedgerStore};

fn bench_full_ship(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("fulfillment/ship_two_line_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryLedgerStore::new();
                let account = CounterpartyAccount::new("Bench Optical", Money::zero());
                store.insert_account(&account).await.unwrap();
                store
                    .insert_option(&SkuOption::new("LENS-A", None, None, 100))
                    .await
                    .unwrap();
                store
                    .insert_option(&SkuOption::new("LENS-B", None, None, 100))
                    .await
                    .unwrap();

                let order = Order::new(
                    common::OrderNo::new("ORD-BENCH"),
                    account.id,
                    OrderKind::RetailStock,
                    vec![
                        OrderLine::new("LENS-A", None, None, 1, Money::from_cents(10_000)),
                        OrderLine::new("LENS-B", None, None, 2, Money::from_cents(5_000)),
                    ],
                    Utc::now(),
                );
                store.insert_order(&order).await.unwrap();

                let engine = FulfillmentEngine::new(store);
                engine
                    .transition(TransitionRequest::new(order.id(), OrderStatus::Shipped, "bench"))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_confirm_cancel_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("fulfillment/confirm_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryLedgerStore::new();
                let account = CounterpartyAccount::new("Bench Optical", Money::zero());
                store.insert_account(&account).await.unwrap();
                store
                    .insert_option(&SkuOption::new("LENS-A", None, None, 100))
                    .await
                    .unwrap();

                let order = Order::new(
                    common::OrderNo::new("ORD-BENCH"),
                    account.id,
                    OrderKind::RetailStock,
                    vec![OrderLine::new("LENS-A", None, None, 1, Money::from_cents(10_000))],
                    Utc::now(),
                );
                store.insert_order(&order).await.unwrap();

                let engine = FulfillmentEngine::new(store);
                engine
                    .transition(TransitionRequest::new(order.id(), OrderStatus::Confirmed, "bench"))
                    .await
                    .unwrap();
                engine
                    .transition(TransitionRequest::new(order.id(), OrderStatus::Cancelled, "bench"))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_full_ship, bench_confirm_cancel_cycle);
criterion_main!(benches);
