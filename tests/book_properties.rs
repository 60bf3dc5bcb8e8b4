//! 订单簿性质测试：随机命令序列下的不变量

use matching_sequencer::application::SequencerCore;
use matching_sequencer::domain::order::Order;
use matching_sequencer::domain::orderbook::OrderBook;
use matching_sequencer::shared::clock::FixedClock;
use matching_sequencer::shared::protocol::{MatchStatus, MatchingResult, Side};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const SYMBOL: &str = "BTC/USD";

#[derive(Debug, Clone)]
enum Command {
    Submit { side: Side, ticks: i64, quantity: u32 },
    /// 撤销第 n 个已提交的订单
    Cancel { nth: usize },
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => (any::<bool>(), 95i64..=105, 1u32..=10).prop_map(|(buy, ticks, quantity)| Command::Submit {
            side: if buy { Side::Buy } else { Side::Sell },
            ticks,
            quantity,
        }),
        1 => (0usize..64).prop_map(|nth| Command::Cancel { nth }),
    ]
}

/// 价格带两位小数，检验十进制比较
fn price(ticks: i64) -> Decimal {
    Decimal::new(ticks * 100 + 25, 2)
}

struct Run {
    core: SequencerCore,
    submitted: Decimal,
    traded: Decimal,
    cancelled: Decimal,
    results: Vec<MatchingResult>,
}

impl Run {
    fn new() -> Self {
        Self {
            core: SequencerCore::new(Arc::new(FixedClock::new(42))),
            submitted: Decimal::ZERO,
            traded: Decimal::ZERO,
            cancelled: Decimal::ZERO,
            results: Vec::new(),
        }
    }

    fn apply(&mut self, index: usize, command: &Command) {
        match *command {
            Command::Submit { side, ticks, quantity } => {
                let quantity = Decimal::from(quantity);
                let mut order = Box::new(Order::default());
                order.populate(&format!("o{}", index), Arc::from(SYMBOL), side, price(ticks), quantity);
                self.submitted += quantity;

                let outcome = self.core.process_submit(order);
                self.traded += outcome.result.filled_quantity();
                self.results.push(outcome.result);
            }
            Command::Cancel { nth } => {
                let (result, _) = self.core.process_cancel(SYMBOL, &format!("o{}", nth));
                if let Some(remaining) = result.remaining_quantity {
                    self.cancelled += remaining;
                }
            }
        }
    }

    fn resting(&self) -> Decimal {
        self.core.book(SYMBOL).map_or(Decimal::ZERO, |book| {
            book.resting_quantity(Side::Buy) + book.resting_quantity(Side::Sell)
        })
    }
}

proptest! {
    #[test]
    fn book_never_stays_crossed(commands in prop::collection::vec(command(), 1..200)) {
        let mut run = Run::new();
        for (i, c) in commands.iter().enumerate() {
            run.apply(i, c);
            if let Some(book) = run.core.book(SYMBOL) {
                prop_assert!(!book.is_crossed(), "crossed after command {}: {:?}", i, c);
            }
        }
    }

    #[test]
    fn quantity_is_conserved(commands in prop::collection::vec(command(), 1..200)) {
        let mut run = Run::new();
        for (i, c) in commands.iter().enumerate() {
            run.apply(i, c);
        }
        // 每笔成交同时消耗主动方和挂单方
        prop_assert_eq!(run.submitted, run.resting() + run.traded * Decimal::from(2) + run.cancelled);
    }

    #[test]
    fn resting_orders_keep_price_time_priority(commands in prop::collection::vec(command(), 1..200)) {
        let mut run = Run::new();
        for (i, c) in commands.iter().enumerate() {
            run.apply(i, c);
        }
        let Some(book) = run.core.book(SYMBOL) else {
            return Ok(());
        };

        for side in [Side::Buy, Side::Sell] {
            let orders = book.resting_orders(side);
            for pair in orders.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let better = match side {
                    Side::Buy => a.price > b.price,
                    Side::Sell => a.price < b.price,
                };
                prop_assert!(better || (a.price == b.price && a.sequence < b.sequence));
                prop_assert!(a.remaining_quantity > Decimal::ZERO);
            }
        }
    }

    #[test]
    fn trades_execute_at_maker_price_best_first(commands in prop::collection::vec(command(), 1..200)) {
        let mut run = Run::new();
        for (i, c) in commands.iter().enumerate() {
            let Command::Submit { side, ticks, .. } = *c else {
                run.apply(i, c);
                continue;
            };
            run.apply(i, c);
            let result = run.results.last().cloned().unwrap();
            let limit = price(ticks);

            for trade in &result.trades {
                prop_assert_eq!(trade.taker_side, side);
                let within_limit = match side {
                    Side::Buy => trade.price <= limit,
                    Side::Sell => trade.price >= limit,
                };
                prop_assert!(within_limit);
            }
            for pair in result.trades.windows(2) {
                let best_first = match side {
                    Side::Buy => pair[0].price <= pair[1].price,
                    Side::Sell => pair[0].price >= pair[1].price,
                };
                prop_assert!(best_first);
                prop_assert!(pair[0].trade_id < pair[1].trade_id);
            }

            let expected = match (result.trades.is_empty(), result.remaining_quantity.is_zero()) {
                (_, true) => MatchStatus::Matched,
                (true, false) => MatchStatus::Rested,
                (false, false) => MatchStatus::PartiallyMatched,
            };
            prop_assert_eq!(result.status, expected);
        }
    }

    #[test]
    fn same_commands_give_same_results(commands in prop::collection::vec(command(), 1..200)) {
        let mut first = Run::new();
        let mut second = Run::new();
        for (i, c) in commands.iter().enumerate() {
            first.apply(i, c);
            second.apply(i, c);
        }

        prop_assert_eq!(&first.results, &second.results);
        let symbol: Arc<str> = Arc::from(SYMBOL);
        prop_assert_eq!(first.core.snapshot(&symbol, 1000), second.core.snapshot(&symbol, 1000));
    }
}
