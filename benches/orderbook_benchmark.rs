use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use matching_sequencer::domain::order::Order;
use matching_sequencer::domain::orderbook::{LimitOrderBook, MatchContext, OrderBook};
use matching_sequencer::shared::protocol::Side;
use rust_decimal::Decimal;
use std::sync::Arc;

fn order(id: &str, symbol: &Arc<str>, side: Side, price: i64, quantity: i64) -> Box<Order> {
    let mut order = Box::new(Order::default());
    order.populate(id, Arc::clone(symbol), side, Decimal::new(price, 2), Decimal::from(quantity));
    order
}

/// 预填充卖盘：`levels` 档，每档 `per_level` 笔
fn master_book(symbol: &Arc<str>, levels: i64, per_level: usize) -> LimitOrderBook {
    let mut book = LimitOrderBook::new(Arc::clone(symbol));
    let mut ctx = MatchContext::new(1, 0, 1);
    for i in 0..levels {
        for j in 0..per_level {
            ctx.sequence += 1;
            let id = format!("ask-{}-{}", i, j);
            book.match_order(order(&id, symbol, Side::Sell, 5_000_000 + i * 100, 10), &mut ctx);
        }
    }
    book
}

fn realistic_match_benchmark(c: &mut Criterion) {
    let symbol: Arc<str> = Arc::from("BTC/USD");
    let mut group = c.benchmark_group("Realistic OrderBook Matching");

    // 母版只建一次，每次迭代克隆
    let master = master_book(&symbol, 1000, 1);

    group.bench_function("1-to-1 match in a cloned book with 1000 levels", |b| {
        b.iter_batched(
            || (master.clone(), order("taker", &symbol, Side::Buy, 5_000_000, 10)),
            |(mut book, taker)| {
                let mut ctx = MatchContext::new(u64::MAX - 1, 0, 1);
                black_box(book.match_order(black_box(taker), &mut ctx));
            },
            BatchSize::SmallInput,
        );
    });

    for sweep in [1i64, 10, 100] {
        group.bench_with_input(BenchmarkId::new("sweep levels", sweep), &sweep, |b, &sweep| {
            b.iter_batched(
                || (master.clone(), order("taker", &symbol, Side::Buy, 5_000_000 + sweep * 100, sweep * 10)),
                |(mut book, taker)| {
                    let mut ctx = MatchContext::new(u64::MAX - 1, 0, 1);
                    black_box(book.match_order(taker, &mut ctx));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.bench_function("rest non-crossing bid", |b| {
        b.iter_batched(
            || (master.clone(), order("bid", &symbol, Side::Buy, 4_000_000, 1)),
            |(mut book, bid)| {
                let mut ctx = MatchContext::new(u64::MAX - 1, 0, 1);
                black_box(book.match_order(bid, &mut ctx));
            },
            BatchSize::SmallInput,
        );
    });

    let deep = master_book(&symbol, 10, 100);
    group.bench_function("cancel from the middle of a 100-order level", |b| {
        b.iter_batched(
            || deep.clone(),
            |mut book| {
                let mut ctx = MatchContext::new(u64::MAX - 1, 0, 1);
                black_box(book.cancel_order("ask-5-50", &mut ctx));
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("snapshot depth 10", |b| {
        b.iter(|| black_box(master.snapshot(black_box(10))));
    });

    group.finish();
}

criterion_group!(benches, realistic_match_benchmark);
criterion_main!(benches);
