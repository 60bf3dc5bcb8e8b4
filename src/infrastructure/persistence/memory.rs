/// 内存网关
///
/// 每个交易对一个定长 `RingBuffer<Trade>`，满时淘汰最旧成交；
/// 每个交易对只保留最新一份快照。适用于测试、回放和单机部署。

use super::{PersistenceError, PersistenceGateway};
use crate::shared::collections::RingBuffer;
use crate::shared::protocol::{OrderBookSnapshot, Trade};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct InMemoryGateway {
    history_per_symbol: usize,
    trades: RwLock<HashMap<Arc<str>, RingBuffer<Trade>>>,
    snapshots: RwLock<HashMap<Arc<str>, OrderBookSnapshot>>,
}

impl InMemoryGateway {
    pub fn new(history_per_symbol: usize) -> Self {
        Self {
            history_per_symbol: history_per_symbol.max(1),
            trades: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// 最近一次保存的快照
    pub fn latest_snapshot(&self, symbol: &str) -> Option<OrderBookSnapshot> {
        self.snapshots.read().get(symbol).cloned()
    }

    /// 某交易对当前保留的成交条数
    pub fn trade_count(&self, symbol: &str) -> usize {
        self.trades.read().get(symbol).map_or(0, RingBuffer::len)
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn save_trade(&self, trade: &Trade) -> Result<(), PersistenceError> {
        let mut trades = self.trades.write();
        let history = trades
            .entry(Arc::clone(&trade.symbol))
            .or_insert_with(|| RingBuffer::with_capacity(self.history_per_symbol));
        history.push_overwrite(trade.clone());
        Ok(())
    }

    async fn save_snapshot(&self, snapshot: &OrderBookSnapshot) -> Result<(), PersistenceError> {
        let mut snapshots = self.snapshots.write();
        // 并发保存时只保留序号更新的一份
        match snapshots.get(snapshot.symbol.as_ref()) {
            Some(existing) if existing.sequence > snapshot.sequence => {}
            _ => {
                snapshots.insert(Arc::clone(&snapshot.symbol), snapshot.clone());
            }
        }
        Ok(())
    }

    async fn list_recent_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>, PersistenceError> {
        let trades = self.trades.read();
        let mut recent: Vec<Trade> = match trades.get(symbol) {
            Some(history) => history.iter().cloned().collect(),
            None => return Ok(Vec::new()),
        };
        // 持久化任务彼此独立，到达顺序不保证，按 trade_id 还原
        recent.sort_unstable_by(|a, b| b.trade_id.cmp(&a.trade_id));
        recent.truncate(limit);
        Ok(recent)
    }
}
