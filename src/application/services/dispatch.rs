/// 结果分发表 - order_id -> 完成信号
///
/// 下单方在入队前登记，定序器撮合完成后按 id 查表投递结果。
/// - 读写锁只在查表 / 增删时短暂持有，投递本身在锁外不阻塞
/// - 完成信号为容量 1 的 tokio mpsc，定序器用 `try_send`，永不阻塞
/// - `Registration` 析构时自动注销，调用方任何返回路径都不会泄漏条目
///
/// 等待方已超时离开时，结果被直接丢弃（订单本身照常生效）。
/// 引擎停止后 `close` 清空分发表，仍在等待的调用方立即得到 `NotRunning`。

use crate::application::error::EngineError;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::MatchingResult;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ResultDispatcher {
    waiters: RwLock<HashMap<String, mpsc::Sender<MatchingResult>>>,
    /// 只在持有写锁时修改
    closed: AtomicBool,
}

impl ResultDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 `order_id` 登记完成信号
    ///
    /// 同一 id 已有等待方时返回 `DuplicateOrder`，分发表关闭后返回 `NotRunning`。
    pub fn register(self: &Arc<Self>, order_id: &str) -> Result<Registration, EngineError> {
        let (tx, rx) = mpsc::channel(1);
        {
            let mut waiters = self.waiters.write();
            if self.closed.load(Ordering::Acquire) {
                return Err(EngineError::NotRunning);
            }
            match waiters.entry(order_id.to_string()) {
                Entry::Occupied(_) => {
                    return Err(EngineError::DuplicateOrder {
                        order_id: order_id.to_string(),
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(tx);
                }
            }
        }
        METRICS.pending_results.inc();

        Ok(Registration {
            dispatcher: Arc::clone(self),
            order_id: order_id.to_string(),
            rx,
        })
    }

    /// 投递结果，返回是否有等待方收到
    pub fn dispatch(&self, result: MatchingResult) -> bool {
        let sender = self.waiters.read().get(&result.order_id).cloned();
        match sender {
            Some(tx) => match tx.try_send(result) {
                Ok(()) => true,
                Err(e) => {
                    debug!("result for {} dropped: waiter gone", e.into_inner().order_id);
                    false
                }
            },
            None => {
                debug!("no waiter registered for {}", result.order_id);
                false
            }
        }
    }

    /// 当前等待中的调用方数量
    pub fn pending(&self) -> usize {
        self.waiters.read().len()
    }

    /// 拒绝后续登记并丢弃所有发送端，等待中的 `recv` 返回 `None`
    pub fn close(&self) {
        let mut waiters = self.waiters.write();
        self.closed.store(true, Ordering::Release);
        let abandoned = waiters.len();
        waiters.clear();
        METRICS.pending_results.sub(abandoned as i64);
        if abandoned > 0 {
            debug!(abandoned, "result dispatcher closed with waiters pending");
        }
    }

    fn deregister(&self, order_id: &str) {
        if self.waiters.write().remove(order_id).is_some() {
            METRICS.pending_results.dec();
        }
    }
}

/// 完成信号的接收端，析构即注销
#[derive(Debug)]
pub struct Registration {
    dispatcher: Arc<ResultDispatcher>,
    order_id: String,
    rx: mpsc::Receiver<MatchingResult>,
}

impl Registration {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// 等待撮合结果；分发表先于结果被销毁时返回 `None`
    pub async fn recv(&mut self) -> Option<MatchingResult> {
        self.rx.recv().await
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.dispatcher.deregister(&self.order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::protocol::MatchStatus;
    use rust_decimal::Decimal;

    fn result(order_id: &str) -> MatchingResult {
        MatchingResult {
            order_id: order_id.to_string(),
            sequence: 1,
            trades: Vec::new(),
            remaining_quantity: Decimal::ONE,
            status: MatchStatus::Rested,
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_waiter() {
        let dispatcher = Arc::new(ResultDispatcher::new());
        let mut registration = dispatcher.register("o-1").unwrap();
        assert_eq!(dispatcher.pending(), 1);

        assert!(dispatcher.dispatch(result("o-1")));
        let received = registration.recv().await.unwrap();
        assert_eq!(received.order_id, "o-1");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let dispatcher = Arc::new(ResultDispatcher::new());
        let _first = dispatcher.register("o-1").unwrap();
        assert!(matches!(
            dispatcher.register("o-1"),
            Err(EngineError::DuplicateOrder { .. })
        ));
    }

    #[test]
    fn test_drop_deregisters() {
        let dispatcher = Arc::new(ResultDispatcher::new());
        {
            let registration = dispatcher.register("o-1").unwrap();
            assert_eq!(registration.order_id(), "o-1");
        }
        assert_eq!(dispatcher.pending(), 0);
        assert!(!dispatcher.dispatch(result("o-1")));

        // 注销后可以再次登记同一 id
        assert!(dispatcher.register("o-1").is_ok());
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_and_refuses_new() {
        let dispatcher = Arc::new(ResultDispatcher::new());
        let mut registration = dispatcher.register("o-1").unwrap();

        dispatcher.close();
        assert!(registration.recv().await.is_none());
        assert_eq!(dispatcher.pending(), 0);
        assert!(matches!(dispatcher.register("o-2"), Err(EngineError::NotRunning)));

        // 关闭后注销不会重复扣减
        drop(registration);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_dispatch_never_blocks_on_full_slot() {
        let dispatcher = Arc::new(ResultDispatcher::new());
        let _registration = dispatcher.register("o-1").unwrap();
        assert!(dispatcher.dispatch(result("o-1")));
        // 槽位已满，第二次投递直接丢弃
        assert!(!dispatcher.dispatch(result("o-1")));
    }
}
