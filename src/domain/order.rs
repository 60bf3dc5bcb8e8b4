/// Order - the mutable record that travels through the pipeline
///
/// Owned by the submitting caller until enqueued; then by the sequencer,
/// and by a price level while it rests. Records come from the order pool
/// and go back to it once fully matched, cancelled or rejected.

use crate::shared::collections::Recycle;
use crate::shared::protocol::Side;
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use std::sync::Arc;

lazy_static! {
    static ref NO_SYMBOL: Arc<str> = Arc::from("");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: String,
    pub symbol: Arc<str>,
    pub side: Side,
    pub price: Decimal,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal,
    /// Arrival sequence, stamped by the sequencer when the order is popped
    pub sequence: u64,
}

impl Order {
    /// Fills the record in place, reusing the id buffer of a pooled record.
    pub fn populate(
        &mut self,
        order_id: &str,
        symbol: Arc<str>,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) {
        self.order_id.clear();
        self.order_id.push_str(order_id);
        self.symbol = symbol;
        self.side = side;
        self.price = price;
        self.original_quantity = quantity;
        self.remaining_quantity = quantity;
        self.sequence = 0;
    }

    /// Whether a resting order at `resting_price` is marketable against this one.
    #[inline]
    pub fn crosses(&self, resting_price: Decimal) -> bool {
        match self.side {
            Side::Buy => self.price >= resting_price,
            Side::Sell => self.price <= resting_price,
        }
    }

    #[inline]
    pub fn fill(&mut self, quantity: Decimal) {
        debug_assert!(quantity <= self.remaining_quantity);
        self.remaining_quantity -= quantity;
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.original_quantity - self.remaining_quantity
    }

    /// Sanity check the sequencer runs before touching a book.
    pub fn is_well_formed(&self) -> bool {
        !self.order_id.is_empty()
            && !self.symbol.is_empty()
            && self.price > Decimal::ZERO
            && self.remaining_quantity > Decimal::ZERO
            && self.remaining_quantity <= self.original_quantity
    }
}

impl Default for Order {
    fn default() -> Self {
        Self {
            order_id: String::new(),
            symbol: Arc::clone(&NO_SYMBOL),
            side: Side::Buy,
            price: Decimal::ZERO,
            original_quantity: Decimal::ZERO,
            remaining_quantity: Decimal::ZERO,
            sequence: 0,
        }
    }
}

impl Recycle for Order {
    fn recycle(&mut self) {
        self.order_id.clear();
        self.symbol = Arc::clone(&NO_SYMBOL);
        self.side = Side::Buy;
        self.price = Decimal::ZERO;
        self.original_quantity = Decimal::ZERO;
        self.remaining_quantity = Decimal::ZERO;
        self.sequence = 0;
    }
}
