/// LimitOrderBook - 单个交易对的限价订单簿
///
/// 价格为任意精度 `Decimal`，无法像期货合约那样按 tick 建数组，
/// 因此两侧各用一棵 `BTreeMap` 做价格阶梯：
/// - 买盘键为 `Reverse<Decimal>`，迭代即从高到低
/// - 卖盘键为 `Decimal`，迭代即从低到高
/// - 两侧的 `first_entry()` 都是最优价
///
/// 撮合逻辑只写一份（`sweep`），对两种键类型泛型展开。
///
/// 订单簿只被定序器线程持有，内部没有任何同步。

use super::price_level::PriceLevel;
use super::traits::{MatchContext, MatchOutcome, OrderBook, RejectReason};
use crate::domain::order::Order;
use crate::shared::protocol::{MatchStatus, MatchingResult, OrderBookSnapshot, PriceLevelView, Side, Trade};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 价格阶梯的排序键
pub trait PriceKey: Ord + Copy {
    fn from_price(price: Decimal) -> Self;
    fn price(self) -> Decimal;
}

impl PriceKey for Decimal {
    #[inline]
    fn from_price(price: Decimal) -> Self {
        price
    }

    #[inline]
    fn price(self) -> Decimal {
        self
    }
}

impl PriceKey for Reverse<Decimal> {
    #[inline]
    fn from_price(price: Decimal) -> Self {
        Reverse(price)
    }

    #[inline]
    fn price(self) -> Decimal {
        self.0
    }
}

/// 单侧价格阶梯，迭代顺序即优先级顺序
#[derive(Debug, Clone)]
pub struct Ladder<K: PriceKey> {
    levels: BTreeMap<K, PriceLevel>,
}

impl<K: PriceKey> Default for Ladder<K> {
    fn default() -> Self {
        Self { levels: BTreeMap::new() }
    }
}

impl<K: PriceKey> Ladder<K> {
    #[inline]
    pub fn best_price(&self) -> Option<Decimal> {
        self.levels.keys().next().map(|k| k.price())
    }

    pub fn level(&self, price: Decimal) -> Option<&PriceLevel> {
        self.levels.get(&K::from_price(price))
    }

    /// 该订单挂到所属价位后总量不会溢出
    fn can_rest(&self, order: &Order) -> bool {
        self.levels
            .get(&K::from_price(order.price))
            .map_or(true, |level| level.can_accept(order.remaining_quantity))
    }

    /// 挂到所属价位队尾
    fn insert(&mut self, order: Box<Order>) {
        self.levels
            .entry(K::from_price(order.price))
            .or_insert_with(|| PriceLevel::new(order.price))
            .push_back(order);
    }

    fn remove(&mut self, price: Decimal, order_id: &str) -> Option<Box<Order>> {
        let key = K::from_price(price);
        let level = self.levels.get_mut(&key)?;
        let order = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&key);
        }
        Some(order)
    }

    /// 按优先级遍历价位
    pub fn levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values()
    }

    fn views(&self, depth: usize) -> Vec<PriceLevelView> {
        self.levels.values().take(depth).map(PriceLevel::view).collect()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }

    /// 全部价位总量之和，超出 `Decimal` 范围时饱和
    pub fn total_quantity(&self) -> Decimal {
        self.levels
            .values()
            .fold(Decimal::ZERO, |acc, level| acc.saturating_add(level.total_quantity()))
    }
}

/// 用 taker 吃掉对手盘阶梯，直到不再可成交或 taker 完全成交
///
/// 完全成交的 maker 出队并放入 `released`，同时从索引中删除。
fn sweep<K: PriceKey>(
    ladder: &mut Ladder<K>,
    taker: &mut Order,
    ctx: &mut MatchContext,
    index: &mut HashMap<String, (Side, Decimal)>,
    trades: &mut Vec<Trade>,
    released: &mut SmallVec<[Box<Order>; 8]>,
) {
    while !taker.is_filled() {
        let mut entry = match ladder.levels.first_entry() {
            Some(entry) => entry,
            None => break,
        };
        let level = entry.get_mut();
        if !taker.crosses(level.price) {
            break;
        }

        while !taker.is_filled() {
            let (maker_id, quantity) = match level.front() {
                Some(maker) => (
                    maker.order_id.clone(),
                    taker.remaining_quantity.min(maker.remaining_quantity),
                ),
                None => break,
            };

            trades.push(Trade {
                trade_id: ctx.take_trade_id(),
                symbol: Arc::clone(&taker.symbol),
                maker_order_id: maker_id,
                taker_order_id: taker.order_id.clone(),
                taker_side: taker.side,
                price: level.price,
                quantity,
                timestamp: ctx.timestamp,
            });

            taker.fill(quantity);
            if let Some(filled) = level.fill_front(quantity) {
                index.remove(&filled.order_id);
                released.push(filled);
            }
        }

        if level.is_empty() {
            entry.remove();
        }
    }
}

#[derive(Debug, Clone)]
pub struct LimitOrderBook {
    symbol: Arc<str>,
    bids: Ladder<Reverse<Decimal>>,
    asks: Ladder<Decimal>,
    /// 挂单索引：order_id -> (方向, 价格)，用于撤单与重复 id 检查
    index: HashMap<String, (Side, Decimal)>,
    last_sequence: u64,
    last_update: u64,
}

impl LimitOrderBook {
    pub fn new(symbol: Arc<str>) -> Self {
        Self {
            symbol,
            bids: Ladder::default(),
            asks: Ladder::default(),
            index: HashMap::new(),
            last_sequence: 0,
            last_update: 0,
        }
    }

    pub fn bids(&self) -> &Ladder<Reverse<Decimal>> {
        &self.bids
    }

    pub fn asks(&self) -> &Ladder<Decimal> {
        &self.asks
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.index.contains_key(order_id)
    }

    /// 某一侧按优先级排列的全部挂单
    pub fn resting_orders(&self, side: Side) -> Vec<&Order> {
        match side {
            Side::Buy => self.bids.levels().flat_map(PriceLevel::iter).collect(),
            Side::Sell => self.asks.levels().flat_map(PriceLevel::iter).collect(),
        }
    }

    /// 某一侧挂单剩余数量之和
    pub fn resting_quantity(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.bids.total_quantity(),
            Side::Sell => self.asks.total_quantity(),
        }
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn reject(&self, order: Box<Order>, ctx: &MatchContext, reason: RejectReason) -> MatchOutcome {
        let result = MatchingResult::rejected(order.order_id.clone(), ctx.sequence, order.remaining_quantity);
        let mut released = SmallVec::new();
        released.push(order);
        MatchOutcome {
            result,
            released,
            rejection: Some(reason),
        }
    }
}

impl OrderBook for LimitOrderBook {
    fn symbol(&self) -> &Arc<str> {
        &self.symbol
    }

    fn match_order(&mut self, mut order: Box<Order>, ctx: &mut MatchContext) -> MatchOutcome {
        if !order.is_well_formed() {
            return self.reject(order, ctx, RejectReason::Malformed);
        }
        if order.symbol != self.symbol {
            return self.reject(order, ctx, RejectReason::SymbolMismatch);
        }
        if self.index.contains_key(&order.order_id) {
            return self.reject(order, ctx, RejectReason::DuplicateOrderId);
        }
        // 撮合前检查：拒绝时订单簿保持原样
        let fits = match order.side {
            Side::Buy => self.bids.can_rest(&order),
            Side::Sell => self.asks.can_rest(&order),
        };
        if !fits {
            return self.reject(order, ctx, RejectReason::QuantityOverflow);
        }

        order.sequence = ctx.sequence;
        let mut trades = Vec::new();
        let mut released = SmallVec::new();

        match order.side {
            Side::Buy => sweep(&mut self.asks, &mut order, ctx, &mut self.index, &mut trades, &mut released),
            Side::Sell => sweep(&mut self.bids, &mut order, ctx, &mut self.index, &mut trades, &mut released),
        }

        let remaining_quantity = order.remaining_quantity;
        let status = if order.is_filled() {
            MatchStatus::Matched
        } else if trades.is_empty() {
            MatchStatus::Rested
        } else {
            MatchStatus::PartiallyMatched
        };

        let result = MatchingResult {
            order_id: order.order_id.clone(),
            sequence: ctx.sequence,
            trades,
            remaining_quantity,
            status,
        };

        if order.is_filled() {
            released.push(order);
        } else {
            let entry = (order.order_id.clone(), (order.side, order.price));
            match order.side {
                Side::Buy => self.bids.insert(order),
                Side::Sell => self.asks.insert(order),
            }
            self.index.insert(entry.0, entry.1);
        }

        self.last_sequence = ctx.sequence;
        self.last_update = ctx.timestamp;

        MatchOutcome {
            result,
            released,
            rejection: None,
        }
    }

    fn cancel_order(&mut self, order_id: &str, ctx: &mut MatchContext) -> Option<Box<Order>> {
        self.last_sequence = ctx.sequence;
        let (side, price) = self.index.remove(order_id)?;
        let order = match side {
            Side::Buy => self.bids.remove(price, order_id),
            Side::Sell => self.asks.remove(price, order_id),
        };
        if order.is_some() {
            self.last_update = ctx.timestamp;
        }
        order
    }

    fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: Arc::clone(&self.symbol),
            bids: self.bids.views(depth),
            asks: self.asks.views(depth),
            sequence: self.last_sequence,
            timestamp: self.last_update,
        }
    }

    #[inline]
    fn best_bid(&self) -> Option<Decimal> {
        self.bids.best_price()
    }

    #[inline]
    fn best_ask(&self) -> Option<Decimal> {
        self.asks.best_price()
    }

    fn order_count(&self) -> usize {
        self.index.len()
    }

    fn level_count(&self) -> usize {
        self.bids.level_count() + self.asks.level_count()
    }
}
