//! 撮合引擎对外数据结构
//!
//! 这些类型由外部传输层（gRPC/HTTP，不在本 crate 内）直接序列化：
//! 价格与数量一律以十进制字符串出现在线上，内部统一使用 `Decimal`。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 买卖方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// 对手方向
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 用作 metrics 标签
    pub fn as_label(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// 解析线上方向字段，大小写不敏感
    pub fn parse(raw: &str) -> Option<Side> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if raw.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// 下单请求，字段保持线上原始形态，校验在进入队列前完成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub quantity: String,
}

impl SubmitOrderRequest {
    /// 构造一个限价单请求
    pub fn limit(
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        price: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            symbol: symbol.into(),
            side: side.to_string(),
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

/// 撮合结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// 全部成交
    Matched,
    /// 部分成交，剩余部分已挂单
    PartiallyMatched,
    /// 未成交，整单挂单
    Rested,
    /// 引擎内部拒绝，订单未进入订单簿
    Rejected,
}

/// 成交记录，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub symbol: Arc<str>,
    pub maker_order_id: String,
    pub taker_order_id: String,
    /// 主动方（taker）方向
    pub taker_side: Side,
    /// 成交价，始终为挂单方（maker）的价格
    pub price: Decimal,
    pub quantity: Decimal,
    /// Unix 纳秒时间戳
    pub timestamp: u64,
}

/// 单个订单的撮合结果，通过结果分发表送回下单方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub order_id: String,
    /// 定序器赋予的到达序号
    pub sequence: u64,
    pub trades: Vec<Trade>,
    pub remaining_quantity: Decimal,
    pub status: MatchStatus,
}

impl MatchingResult {
    pub fn rejected(order_id: impl Into<String>, sequence: u64, remaining_quantity: Decimal) -> Self {
        Self {
            order_id: order_id.into(),
            sequence,
            trades: Vec::new(),
            remaining_quantity,
            status: MatchStatus::Rejected,
        }
    }

    /// 本次撮合的累计成交数量
    pub fn filled_quantity(&self) -> Decimal {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

/// 快照中的一档价格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevelView {
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_count: usize,
}

/// 订单簿快照（按需生成，不持续维护）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: Arc<str>,
    /// 价格从高到低
    pub bids: Vec<PriceLevelView>,
    /// 价格从低到高
    pub asks: Vec<PriceLevelView>,
    /// 最后一次作用于该订单簿的命令序号
    pub sequence: u64,
    /// 订单簿最后一次变更的时间
    pub timestamp: u64,
}

impl OrderBookSnapshot {
    pub fn empty(symbol: Arc<str>) -> Self {
        Self {
            symbol,
            bids: Vec::new(),
            asks: Vec::new(),
            sequence: 0,
            timestamp: 0,
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevelView> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevelView> {
        self.asks.first()
    }
}

/// 撤单结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub order_id: String,
    pub cancelled: bool,
    /// 被撤订单撤单时的剩余数量
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_quantity: Option<Decimal>,
}
