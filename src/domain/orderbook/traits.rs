/// OrderBook Trait - Domain Layer Abstraction
///
/// The sequencer drives books only through this trait, so an alternative
/// book layout can be dropped in without touching the pipeline.
///
/// ## Ownership
/// Incoming orders arrive as pooled `Box<Order>` records. The book either
/// keeps a record (it rests) or hands it back in `MatchOutcome::released`,
/// and the caller returns released records to the pool.
///
/// ## Example
/// ```rust,ignore
/// use matching_sequencer::domain::orderbook::{LimitOrderBook, MatchContext, OrderBook};
///
/// let mut book = LimitOrderBook::new(Arc::from("BTC/USD"));
/// let mut ctx = MatchContext::new(1, clock.now_nanos(), 1);
/// let outcome = book.match_order(order, &mut ctx);
/// for record in outcome.released {
///     pool.release(record);
/// }
/// ```

use crate::domain::order::Order;
use crate::shared::protocol::{MatchingResult, OrderBookSnapshot};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::Arc;

/// Sequencer state threaded through a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchContext {
    /// Arrival sequence of the command being applied
    pub sequence: u64,
    /// Timestamp stamped on every trade of this command
    pub timestamp: u64,
    /// Next trade id; global across books, advanced by the book
    pub next_trade_id: u64,
}

impl MatchContext {
    pub fn new(sequence: u64, timestamp: u64, next_trade_id: u64) -> Self {
        Self {
            sequence,
            timestamp,
            next_trade_id,
        }
    }

    /// Takes the next trade id
    #[inline]
    pub fn take_trade_id(&mut self) -> u64 {
        let id = self.next_trade_id;
        self.next_trade_id += 1;
        id
    }
}

/// Why a book refused an order without touching its levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Non-positive price or quantity, empty id
    Malformed,
    /// Order routed to a book of another symbol
    SymbolMismatch,
    /// An order with the same id is already resting
    DuplicateOrderId,
    /// Resting the order would overflow its price level's total quantity
    QuantityOverflow,
}

impl RejectReason {
    pub fn as_label(self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::SymbolMismatch => "symbol_mismatch",
            RejectReason::DuplicateOrderId => "duplicate_resting_id",
            RejectReason::QuantityOverflow => "quantity_overflow",
        }
    }
}

/// Result of applying one order to a book
#[derive(Debug)]
pub struct MatchOutcome {
    pub result: MatchingResult,
    /// Records no longer referenced by the book (filled makers, the taker
    /// when it did not rest, a rejected order)
    pub released: SmallVec<[Box<Order>; 8]>,
    /// Set when `result.status` is `Rejected`
    pub rejection: Option<RejectReason>,
}

/// Core OrderBook trait
pub trait OrderBook {
    fn symbol(&self) -> &Arc<str>;

    /// Matches an incoming order against the opposite side
    ///
    /// # Matching Logic
    /// - **Buy orders**: match against asks, lowest price first
    /// - **Sell orders**: match against bids, highest price first
    /// - **Price-time priority**: FIFO within a level
    /// - **Execution price**: always the resting (maker) price
    /// - **Remainder**: rests at the tail of its own price level
    fn match_order(&mut self, order: Box<Order>, ctx: &mut MatchContext) -> MatchOutcome;

    /// Removes a resting order
    ///
    /// # Returns
    /// * `Some(order)` - the record, detached from the book
    /// * `None` - the id is not resting in this book
    fn cancel_order(&mut self, order_id: &str, ctx: &mut MatchContext) -> Option<Box<Order>>;

    /// Top `depth` levels of each side
    fn snapshot(&self, depth: usize) -> OrderBookSnapshot;

    /// Highest bid price
    fn best_bid(&self) -> Option<Decimal>;

    /// Lowest ask price
    fn best_ask(&self) -> Option<Decimal>;

    /// Number of resting orders on both sides
    fn order_count(&self) -> usize;

    /// Number of non-empty price levels on both sides
    fn level_count(&self) -> usize;

    /// Gets the current spread (best_ask - best_bid)
    ///
    /// # Returns
    /// * `Some(spread)` if both bid and ask exist
    /// * `None` if either side is empty
    fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Gets the midpoint price ((best_bid + best_ask) / 2)
    fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    /// A book is crossed when its best bid reaches its best ask.
    /// Never true between commands.
    fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid >= ask)
    }

    fn is_empty(&self) -> bool {
        self.order_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Mock implementation for testing
    struct MockOrderBook {
        symbol: Arc<str>,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
    }

    impl OrderBook for MockOrderBook {
        fn symbol(&self) -> &Arc<str> {
            &self.symbol
        }

        fn match_order(&mut self, order: Box<Order>, ctx: &mut MatchContext) -> MatchOutcome {
            let result = MatchingResult::rejected(order.order_id.clone(), ctx.sequence, order.remaining_quantity);
            let mut released = SmallVec::new();
            released.push(order);
            MatchOutcome {
                result,
                released,
                rejection: Some(RejectReason::Malformed),
            }
        }

        fn cancel_order(&mut self, _order_id: &str, _ctx: &mut MatchContext) -> Option<Box<Order>> {
            None
        }

        fn snapshot(&self, _depth: usize) -> OrderBookSnapshot {
            OrderBookSnapshot::empty(Arc::clone(&self.symbol))
        }

        fn best_bid(&self) -> Option<Decimal> {
            self.best_bid
        }

        fn best_ask(&self) -> Option<Decimal> {
            self.best_ask
        }

        fn order_count(&self) -> usize {
            0
        }

        fn level_count(&self) -> usize {
            0
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn mock(bid: Option<&str>, ask: Option<&str>) -> MockOrderBook {
        MockOrderBook {
            symbol: Arc::from("TEST"),
            best_bid: bid.map(dec),
            best_ask: ask.map(dec),
        }
    }

    #[test]
    fn test_trait_spread_calculation() {
        let book = mock(Some("99.5"), Some("101"));
        assert_eq!(book.spread(), Some(dec("1.5")));
        assert_eq!(book.mid_price(), Some(dec("100.25")));
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_trait_empty_orderbook() {
        let book = mock(None, Some("101"));
        assert_eq!(book.spread(), None);
        assert_eq!(book.mid_price(), None);
        assert!(!book.is_crossed());
        assert!(book.is_empty());
    }

    #[test]
    fn test_crossed_detection() {
        assert!(mock(Some("100"), Some("100")).is_crossed());
        assert!(mock(Some("101"), Some("100")).is_crossed());
    }

    #[test]
    fn test_context_trade_ids() {
        let mut ctx = MatchContext::new(1, 0, 10);
        assert_eq!(ctx.take_trade_id(), 10);
        assert_eq!(ctx.take_trade_id(), 11);
        assert_eq!(ctx.next_trade_id, 12);
    }
}
