/// 价格档位 - 同价位挂单的 FIFO 队列
///
/// 队列内订单严格按到达序号排列，队头即时间优先级最高的挂单。
/// `total_quantity` 始终等于队内订单剩余数量之和。

use crate::domain::order::Order;
use crate::shared::protocol::PriceLevelView;
use rust_decimal::Decimal;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    orders: VecDeque<Box<Order>>,
    total_quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: Decimal::ZERO,
        }
    }

    /// 追加 `quantity` 后档位总量是否仍可表示
    #[inline]
    pub fn can_accept(&self, quantity: Decimal) -> bool {
        self.total_quantity.checked_add(quantity).is_some()
    }

    /// 追加到队尾，调用方需先用 `can_accept` 确认不会溢出
    #[inline]
    pub fn push_back(&mut self, order: Box<Order>) {
        debug_assert_eq!(order.price, self.price);
        debug_assert!(self.orders.back().map_or(true, |last| last.sequence <= order.sequence));
        self.total_quantity += order.remaining_quantity;
        self.orders.push_back(order);
    }

    /// 时间优先级最高的挂单
    #[inline]
    pub fn front(&self) -> Option<&Order> {
        self.orders.front().map(|o| o.as_ref())
    }

    /// 对队头挂单成交 `quantity`
    ///
    /// 队头完全成交时出队并返回该记录，否则返回 `None`。
    pub fn fill_front(&mut self, quantity: Decimal) -> Option<Box<Order>> {
        let front = self.orders.front_mut()?;
        front.fill(quantity);
        self.total_quantity -= quantity;
        if front.is_filled() {
            self.orders.pop_front()
        } else {
            None
        }
    }

    /// 按 id 移除（撤单），O(n)
    pub fn remove(&mut self, order_id: &str) -> Option<Box<Order>> {
        let pos = self.orders.iter().position(|o| o.order_id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.total_quantity -= order.remaining_quantity;
        Some(order)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn total_quantity(&self) -> Decimal {
        self.total_quantity
    }

    /// 按时间优先级遍历
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().map(|o| o.as_ref())
    }

    pub fn view(&self) -> PriceLevelView {
        PriceLevelView {
            price: self.price,
            quantity: self.total_quantity,
            order_count: self.orders.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::protocol::Side;
    use std::str::FromStr;
    use std::sync::Arc;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn resting(id: &str, qty: &str, sequence: u64) -> Box<Order> {
        let mut order = Box::new(Order::default());
        order.populate(id, Arc::from("BTC/USD"), Side::Sell, dec("100"), dec(qty));
        order.sequence = sequence;
        order
    }

    #[test]
    fn test_fifo_and_total() {
        let mut level = PriceLevel::new(dec("100"));
        level.push_back(resting("a", "1.5", 1));
        level.push_back(resting("b", "2", 2));

        assert_eq!(level.front().map(|o| o.order_id.as_str()), Some("a"));
        assert_eq!(level.total_quantity(), dec("3.5"));
        assert_eq!(level.view().order_count, 2);
    }

    #[test]
    fn test_can_accept_detects_overflow() {
        let mut level = PriceLevel::new(dec("100"));
        assert!(level.can_accept(Decimal::MAX));
        level.push_back(resting("a", "79228162514264337593543950335", 1));
        assert!(!level.can_accept(Decimal::ONE));
        assert!(level.can_accept(Decimal::ZERO));
    }

    #[test]
    fn test_fill_front_partial_then_full() {
        let mut level = PriceLevel::new(dec("100"));
        level.push_back(resting("a", "2", 1));
        level.push_back(resting("b", "1", 2));

        assert!(level.fill_front(dec("0.5")).is_none());
        assert_eq!(level.front().map(|o| o.remaining_quantity), Some(dec("1.5")));
        assert_eq!(level.total_quantity(), dec("2.5"));

        let done = level.fill_front(dec("1.5")).unwrap();
        assert_eq!(done.order_id, "a");
        assert!(done.is_filled());
        assert_eq!(level.front().map(|o| o.order_id.as_str()), Some("b"));
        assert_eq!(level.total_quantity(), dec("1"));
    }

    #[test]
    fn test_remove_by_id() {
        let mut level = PriceLevel::new(dec("100"));
        level.push_back(resting("a", "1", 1));
        level.push_back(resting("b", "2", 2));
        level.push_back(resting("c", "3", 3));

        let removed = level.remove("b").unwrap();
        assert_eq!(removed.remaining_quantity, dec("2"));
        assert_eq!(level.total_quantity(), dec("4"));
        let ids: Vec<_> = level.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        assert!(level.remove("missing").is_none());
    }
}
