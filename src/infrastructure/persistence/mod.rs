/// Persistence Gateway - 成交与快照的外部存储接口
///
/// 写路径（`save_trade` / `save_snapshot`）由定序器以独立 tokio 任务调用，
/// 失败只记日志和 metrics，不影响撮合，也不回传给下单方。
/// 读路径（`list_recent_trades`）直接服务于 `get_trades`，错误会返回调用方。
///
/// 具体存储选型不在本 crate 内，这里只提供 `InMemoryGateway`。

pub mod memory;

use crate::shared::protocol::{OrderBookSnapshot, Trade};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryGateway;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync + 'static {
    /// 保存一笔成交
    async fn save_trade(&self, trade: &Trade) -> Result<(), PersistenceError>;

    /// 保存订单簿快照（覆盖该交易对的上一份）
    async fn save_snapshot(&self, snapshot: &OrderBookSnapshot) -> Result<(), PersistenceError>;

    /// 最近成交，按时间从新到旧
    async fn list_recent_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>, PersistenceError>;
}
