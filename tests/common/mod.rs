#![allow(dead_code)]

use async_trait::async_trait;
use matching_sequencer::application::{EngineConfig, MatchingService};
use matching_sequencer::infrastructure::persistence::{InMemoryGateway, PersistenceError, PersistenceGateway};
use matching_sequencer::shared::clock::FixedClock;
use matching_sequencer::shared::protocol::{OrderBookSnapshot, Side, SubmitOrderRequest, Trade};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SYMBOL: &str = "BTC/USD";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn buy(id: &str, price: &str, qty: &str) -> SubmitOrderRequest {
    SubmitOrderRequest::limit(id, SYMBOL, Side::Buy, price, qty)
}

pub fn sell(id: &str, price: &str, qty: &str) -> SubmitOrderRequest {
    SubmitOrderRequest::limit(id, SYMBOL, Side::Sell, price, qty)
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        queue_capacity: 1024,
        pool_capacity: 256,
        pool_prefill: 16,
        result_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

/// 未启动的引擎，时钟固定
pub fn engine_with(config: EngineConfig, gateway: Arc<dyn PersistenceGateway>) -> MatchingService {
    MatchingService::new(config, gateway, Arc::new(FixedClock::new(1_700_000_000_000_000_000))).unwrap()
}

/// 已启动的引擎与其内存网关
pub fn started_engine() -> (Arc<MatchingService>, Arc<InMemoryGateway>) {
    let gateway = Arc::new(InMemoryGateway::new(1000));
    let engine = engine_with(test_config(), gateway.clone());
    engine.start().unwrap();
    (Arc::new(engine), gateway)
}

/// 所有写入都失败的网关
#[derive(Default)]
pub struct FailingGateway {
    pub attempts: AtomicU64,
}

#[async_trait]
impl PersistenceGateway for FailingGateway {
    async fn save_trade(&self, _trade: &Trade) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::Unavailable("disk on fire".to_string()))
    }

    async fn save_snapshot(&self, _snapshot: &OrderBookSnapshot) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::Unavailable("disk on fire".to_string()))
    }

    async fn list_recent_trades(&self, _symbol: &str, _limit: usize) -> Result<Vec<Trade>, PersistenceError> {
        Err(PersistenceError::Backend("read replica down".to_string()))
    }
}

/// 等待异步持久化落地
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
