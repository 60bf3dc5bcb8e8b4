/// 引擎错误
///
/// 入队前能发现的问题一律同步返回；入队之后只会出现 `Timeout`/`Cancelled`。

use crate::domain::validation::ValidationError;
use crate::infrastructure::persistence::PersistenceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("order {order_id} is already awaiting a result")]
    DuplicateOrder { order_id: String },

    #[error("submission queue full (capacity {capacity}), retry later")]
    Backpressure { capacity: usize },

    #[error("no result for order {order_id} within {waited:?}; the order may still be processed")]
    Timeout { order_id: String, waited: Duration },

    #[error("wait for order {order_id} cancelled by caller; the order may still be processed")]
    Cancelled { order_id: String },

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("matching engine is not running")]
    NotRunning,

    #[error("order book query for {symbol} not answered within {waited:?}")]
    QueryTimeout { symbol: String, waited: Duration },

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl EngineError {
    /// 只有背压可以原样重试；超时后重试会导致重复下单
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Backpressure { .. })
    }

    /// 用作 metrics 标签
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::DuplicateOrder { .. } => "duplicate",
            EngineError::Backpressure { .. } => "backpressure",
            EngineError::Timeout { .. } => "timeout",
            EngineError::Cancelled { .. } => "cancelled",
            EngineError::Persistence(_) => "persistence",
            EngineError::NotRunning => "not_running",
            EngineError::QueryTimeout { .. } => "query_timeout",
            EngineError::Runtime(_) => "runtime",
        }
    }
}
