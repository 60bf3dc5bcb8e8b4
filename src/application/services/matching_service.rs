/// Matching Service - 撮合引擎对外门面
///
/// 调用方（gRPC/HTTP 层、测试、压测工具）只与本类型交互：
///
/// ```text
/// submit_order ─ 校验 ─ 取池化记录 ─ 登记完成信号 ─ 入队 ─┐
///                                                        ▼
///                                              定序器线程（唯一写者）
///                                                        │
/// 等待结果 ◄──────────── 结果分发表 ◄───────────────────┘
/// ```
///
/// ## 保证
/// - 入队前能发现的问题全部同步返回（校验失败、重复 id、队列满）
/// - 队列满时立即返回 `Backpressure`，不在内部重试
/// - 等待超时或被取消只释放调用方，订单仍会被撮合（需撤单请调用 `cancel_order`）
/// - 任何返回路径都会注销完成信号
///
/// ## Usage
/// ```rust,ignore
/// use matching_sequencer::application::{EngineConfig, MatchingService};
/// use matching_sequencer::infrastructure::persistence::InMemoryGateway;
///
/// let engine = MatchingService::spawn(EngineConfig::default(), Arc::new(InMemoryGateway::default()))?;
/// let result = engine
///     .submit_order(SubmitOrderRequest::limit("o-1", "BTC/USD", Side::Buy, "50000", "0.1"))
///     .await?;
/// ```

use super::dispatch::ResultDispatcher;
use super::sequencer::{BookQuery, Sequencer, SequencerCore, SequencerState};
use super::submission_queue::{EngineCommand, SubmissionQueue};
use crate::application::config::EngineConfig;
use crate::application::error::EngineError;
use crate::domain::order::Order;
use crate::domain::validation::{OrderValidator, ValidationError};
use crate::infrastructure::persistence::PersistenceGateway;
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::collections::ObjectPool;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{CancelResult, MatchingResult, OrderBookSnapshot, SubmitOrderRequest, Trade};
use crate::shared::symbol_pool::SymbolPool;
use crossbeam::channel::{self, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 引擎运行状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub pending_results: usize,
    pub pool_available: usize,
    pub processed_commands: u64,
    pub running: bool,
}

pub struct MatchingService {
    config: EngineConfig,
    validator: OrderValidator,
    symbols: Arc<SymbolPool>,
    pool: Arc<ObjectPool<Order>>,
    queue: Arc<SubmissionQueue>,
    dispatcher: Arc<ResultDispatcher>,
    queries: Sender<BookQuery>,
    gateway: Arc<dyn PersistenceGateway>,
    runtime: Handle,
    state: Arc<SequencerState>,
    /// 已停止接收新命令
    closed: AtomicBool,
    /// `start` 之前暂存的定序器
    idle_sequencer: Mutex<Option<Sequencer>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MatchingService {
    /// 构建引擎但不启动定序器
    ///
    /// 必须在 tokio 运行时内调用：成交持久化任务提交到当前运行时。
    /// 未启动时提交的命令会在队列中等待，直到 `start`。
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn PersistenceGateway>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current()
            .map_err(|e| EngineError::Runtime(format!("matching engine requires a tokio runtime: {}", e)))?;

        let queue = Arc::new(SubmissionQueue::new(config.queue_capacity));
        let (query_tx, query_rx) = channel::bounded(config.query_capacity.max(1));
        let dispatcher = Arc::new(ResultDispatcher::new());
        let pool = Arc::new(ObjectPool::new(
            "order",
            config.pool_capacity,
            config.pool_prefill,
            Order::default,
        ));
        let state = Arc::new(SequencerState::default());

        let sequencer = Sequencer::new(
            SequencerCore::new(clock),
            Arc::clone(&queue),
            query_rx,
            Arc::clone(&dispatcher),
            Arc::clone(&pool),
            Arc::clone(&gateway),
            runtime.clone(),
            Arc::clone(&state),
            config.sequencer_core,
        );

        let symbols = Arc::new(SymbolPool::with_capacity(64));
        symbols.preload(
            &config
                .validation
                .allowed_symbols
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>(),
        );

        Ok(Self {
            validator: OrderValidator::with_config(config.validation.clone()),
            config,
            symbols,
            pool,
            queue,
            dispatcher,
            queries: query_tx,
            gateway,
            runtime,
            state,
            closed: AtomicBool::new(false),
            idle_sequencer: Mutex::new(Some(sequencer)),
            worker: Mutex::new(None),
        })
    }

    /// 构建并启动，使用系统时钟
    pub fn spawn(config: EngineConfig, gateway: Arc<dyn PersistenceGateway>) -> Result<Self, EngineError> {
        let engine = Self::new(config, gateway, Arc::new(SystemClock))?;
        engine.start()?;
        Ok(engine)
    }

    /// 启动定序器线程；重复调用无副作用
    pub fn start(&self) -> Result<(), EngineError> {
        let sequencer = match self.idle_sequencer.lock().take() {
            Some(sequencer) => sequencer,
            None if self.closed.load(Ordering::Acquire) => return Err(EngineError::NotRunning),
            None => return Ok(()),
        };

        self.state.running.store(true, Ordering::Release);
        match sequencer.spawn() {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                info!(
                    queue_capacity = self.queue.capacity(),
                    result_timeout_ms = self.config.result_timeout.as_millis() as u64,
                    "matching engine started"
                );
                Ok(())
            }
            Err(e) => {
                self.state.running.store(false, Ordering::Release);
                self.closed.store(true, Ordering::Release);
                Err(EngineError::Runtime(format!("failed to spawn sequencer thread: {}", e)))
            }
        }
    }

    /// 停止接收命令，等定序器排空队列后退出
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.state.running.store(false, Ordering::Release);
        self.queue.doorbell().ring();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("sequencer thread terminated abnormally");
            }
        }
        // 从未启动：队列中的命令随定序器一起丢弃
        self.idle_sequencer.lock().take();

        // 定序器最后一次排空之后才入队的命令不会再被处理
        let mut stranded = 0usize;
        while let Some(command) = self.queue.pop() {
            if let EngineCommand::Submit(order) = command {
                self.pool.release(order);
            }
            stranded += 1;
        }
        if stranded > 0 {
            warn!(stranded, "commands left unprocessed at shutdown");
        }
        METRICS.queue_depth.set(0);
        // 仍在等待的调用方立即返回 NotRunning
        self.dispatcher.close();

        info!("matching engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            pending_results: self.dispatcher.pending(),
            pool_available: self.pool.available(),
            processed_commands: self.state.processed.load(Ordering::Relaxed),
            running: self.is_running(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 提交限价单并等待撮合结果（或配置的超时）
    pub async fn submit_order(&self, request: SubmitOrderRequest) -> Result<MatchingResult, EngineError> {
        self.submit(&request, None).await
    }

    /// 同 `submit_order`，`token` 被取消时提前返回 `Cancelled`
    pub async fn submit_order_cancellable(
        &self,
        request: SubmitOrderRequest,
        token: &CancellationToken,
    ) -> Result<MatchingResult, EngineError> {
        self.submit(&request, Some(token)).await
    }

    async fn submit(
        &self,
        request: &SubmitOrderRequest,
        token: Option<&CancellationToken>,
    ) -> Result<MatchingResult, EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.rejected(EngineError::NotRunning));
        }

        let valid = self
            .validator
            .validate(request)
            .map_err(|e| self.rejected(e.into()))?;
        METRICS.orders_total.with_label_values(&[valid.side.as_label()]).inc();

        // 先登记再入队，定序器不可能先于登记投递结果
        let mut registration = self
            .dispatcher
            .register(valid.order_id)
            .map_err(|e| self.rejected(e))?;

        let mut order = self.pool.acquire();
        order.populate(
            valid.order_id,
            self.symbols.intern(valid.symbol),
            valid.side,
            valid.price,
            valid.quantity,
        );

        if let Err(command) = self.queue.push(EngineCommand::Submit(order)) {
            if let EngineCommand::Submit(order) = command {
                self.pool.release(order);
            }
            warn!(order_id = valid.order_id, capacity = self.queue.capacity(), "submission queue full");
            return Err(self.rejected(EngineError::Backpressure {
                capacity: self.queue.capacity(),
            }));
        }
        METRICS.queue_depth.set(self.queue.len() as i64);

        let waited = self.config.result_timeout;
        let wait = tokio::time::timeout(waited, registration.recv());
        let outcome = match token {
            Some(token) => tokio::select! {
                biased;
                outcome = wait => outcome,
                _ = token.cancelled() => {
                    debug!(order_id = valid.order_id, "caller cancelled wait");
                    return Err(self.rejected(EngineError::Cancelled {
                        order_id: valid.order_id.to_string(),
                    }));
                }
            },
            None => wait.await,
        };

        match outcome {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(self.rejected(EngineError::NotRunning)),
            Err(_) => {
                warn!(order_id = valid.order_id, ?waited, "timed out waiting for matching result");
                Err(self.rejected(EngineError::Timeout {
                    order_id: valid.order_id.to_string(),
                    waited,
                }))
            }
        }
    }

    /// 撤销挂单，与下单共用提交队列，因此与下单严格有序
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<CancelResult, EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::NotRunning);
        }

        let symbol = self.validator.validate_symbol(symbol)?;
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(ValidationError::InvalidOrderId("Order id cannot be empty".to_string()).into());
        }

        let (reply, rx) = oneshot::channel();
        let command = EngineCommand::Cancel {
            symbol: self.lookup_symbol(symbol),
            order_id: order_id.to_string(),
            reply,
        };
        if self.queue.push(command).is_err() {
            return Err(self.rejected(EngineError::Backpressure {
                capacity: self.queue.capacity(),
            }));
        }

        let waited = self.config.result_timeout;
        match tokio::time::timeout(waited, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(EngineError::NotRunning),
            Err(_) => Err(self.rejected(EngineError::Timeout {
                order_id: order_id.to_string(),
                waited,
            })),
        }
    }

    /// 订单簿快照，由定序器在两条命令之间生成
    ///
    /// depth 为 0 时使用默认深度；未知交易对返回空快照。
    /// 成功后异步保存一份快照，保存失败不影响返回值。
    pub async fn get_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::NotRunning);
        }

        let symbol = self.lookup_symbol(self.validator.validate_symbol(symbol)?);
        let (reply, rx) = oneshot::channel();
        let query = BookQuery {
            symbol: Arc::clone(&symbol),
            depth: self.config.effective_depth(depth),
            reply,
        };

        match self.queries.try_send(query) {
            Ok(()) => self.queue.doorbell().ring(),
            Err(TrySendError::Full(_)) => {
                return Err(EngineError::Backpressure {
                    capacity: self.config.query_capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => return Err(EngineError::NotRunning),
        }

        let waited = self.config.result_timeout;
        let snapshot = match tokio::time::timeout(waited, rx).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(_)) => return Err(EngineError::NotRunning),
            Err(_) => {
                return Err(EngineError::QueryTimeout {
                    symbol: symbol.to_string(),
                    waited,
                })
            }
        };

        self.save_snapshot_in_background(snapshot.clone());
        Ok(snapshot)
    }

    /// 最近成交，直接读持久化网关，不经过定序器
    ///
    /// limit 为 0 时使用默认条数。
    pub async fn get_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>, EngineError> {
        let symbol = self.validator.validate_symbol(symbol)?;
        let limit = self.config.effective_trade_limit(limit);
        Ok(self.gateway.list_recent_trades(symbol, limit).await?)
    }

    /// 只查不建，避免查询不存在的交易对撑大符号池
    fn lookup_symbol(&self, symbol: &str) -> Arc<str> {
        self.symbols.get(symbol).unwrap_or_else(|| Arc::from(symbol))
    }

    fn save_snapshot_in_background(&self, snapshot: OrderBookSnapshot) {
        let gateway = Arc::clone(&self.gateway);
        self.runtime.spawn(async move {
            if let Err(e) = gateway.save_snapshot(&snapshot).await {
                METRICS
                    .persistence_failures_total
                    .with_label_values(&["snapshot"])
                    .inc();
                warn!(symbol = %snapshot.symbol, "failed to persist snapshot: {}", e);
            }
        });
    }

    fn rejected(&self, err: EngineError) -> EngineError {
        METRICS.rejections_total.with_label_values(&[err.as_label()]).inc();
        err
    }
}

impl Drop for MatchingService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
