/// 定序器 - 唯一持有全部订单簿的单写线程
///
/// 核心设计：
/// 1. 所有交易对的订单簿只被这一个线程修改，订单簿内部无锁
/// 2. 出队顺序即撮合顺序，到达序号在出队时赋予
/// 3. 空闲策略：自旋 -> yield -> park（生产者入队后按门铃唤醒）
/// 4. 成交持久化交给 tokio 任务，失败只记录不回传
/// 5. 单条命令 panic 被捕获并跳过，引擎继续运行
///
/// `SequencerCore` 是不含线程和 I/O 的纯状态机，回放与确定性测试直接驱动它。

use super::dispatch::ResultDispatcher;
use super::submission_queue::{EngineCommand, SubmissionQueue};
use crate::domain::order::Order;
use crate::domain::orderbook::{LimitOrderBook, MatchContext, MatchOutcome, OrderBook, RejectReason};
use crate::infrastructure::persistence::PersistenceGateway;
use crate::shared::clock::Clock;
use crate::shared::collections::ObjectPool;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{CancelResult, MatchingResult, OrderBookSnapshot, Trade};
use crossbeam::channel::Receiver;
use crossbeam::utils::Backoff;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// 空闲时单次 park 的最长时间
const PARK_TIMEOUT: Duration = Duration::from_millis(1);

/// 订单簿查询，由定序器在两条命令之间应答
#[derive(Debug)]
pub struct BookQuery {
    pub symbol: Arc<str>,
    pub depth: usize,
    pub reply: oneshot::Sender<OrderBookSnapshot>,
}

/// 定序器状态机
pub struct SequencerCore {
    books: HashMap<Arc<str>, LimitOrderBook>,
    next_sequence: u64,
    next_trade_id: u64,
    clock: Arc<dyn Clock>,
}

impl SequencerCore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            books: HashMap::new(),
            next_sequence: 1,
            next_trade_id: 1,
            clock,
        }
    }

    fn next_context(&mut self) -> MatchContext {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        MatchContext::new(sequence, self.clock.now_nanos(), self.next_trade_id)
    }

    /// 撮合一笔新订单
    ///
    /// 订单簿按需创建；畸形订单不会为其创建订单簿。
    pub fn process_submit(&mut self, order: Box<Order>) -> MatchOutcome {
        let mut ctx = self.next_context();

        if !order.is_well_formed() {
            let result = MatchingResult::rejected(order.order_id.clone(), ctx.sequence, order.remaining_quantity);
            let mut released = SmallVec::new();
            released.push(order);
            return MatchOutcome {
                result,
                released,
                rejection: Some(RejectReason::Malformed),
            };
        }

        let book = self
            .books
            .entry(Arc::clone(&order.symbol))
            .or_insert_with(|| LimitOrderBook::new(Arc::clone(&order.symbol)));
        let outcome = book.match_order(order, &mut ctx);
        self.next_trade_id = ctx.next_trade_id;
        outcome
    }

    /// 撤单；返回撤单结果与需要归还对象池的记录
    pub fn process_cancel(&mut self, symbol: &str, order_id: &str) -> (CancelResult, Option<Box<Order>>) {
        let mut ctx = self.next_context();
        let removed = self
            .books
            .get_mut(symbol)
            .and_then(|book| book.cancel_order(order_id, &mut ctx));

        let result = CancelResult {
            order_id: order_id.to_string(),
            cancelled: removed.is_some(),
            remaining_quantity: removed.as_ref().map(|o| o.remaining_quantity),
        };
        (result, removed)
    }

    /// 订单簿快照；未知交易对返回空快照
    pub fn snapshot(&self, symbol: &Arc<str>, depth: usize) -> OrderBookSnapshot {
        match self.books.get(symbol) {
            Some(book) => book.snapshot(depth),
            None => OrderBookSnapshot::empty(Arc::clone(symbol)),
        }
    }

    pub fn book(&self, symbol: &str) -> Option<&LimitOrderBook> {
        self.books.get(symbol)
    }

    pub fn books(&self) -> impl Iterator<Item = &LimitOrderBook> {
        self.books.values()
    }

    /// 已赋予的最后一个到达序号
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn next_trade_id(&self) -> u64 {
        self.next_trade_id
    }
}

/// 定序器与外界共享的运行状态
#[derive(Debug, Default)]
pub struct SequencerState {
    pub running: AtomicBool,
    pub processed: AtomicU64,
}

/// 定序器线程
pub struct Sequencer {
    core: SequencerCore,
    queue: Arc<SubmissionQueue>,
    queries: Receiver<BookQuery>,
    dispatcher: Arc<ResultDispatcher>,
    pool: Arc<ObjectPool<Order>>,
    gateway: Arc<dyn PersistenceGateway>,
    runtime: Handle,
    state: Arc<SequencerState>,
    core_id: Option<usize>,
}

impl Sequencer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        core: SequencerCore,
        queue: Arc<SubmissionQueue>,
        queries: Receiver<BookQuery>,
        dispatcher: Arc<ResultDispatcher>,
        pool: Arc<ObjectPool<Order>>,
        gateway: Arc<dyn PersistenceGateway>,
        runtime: Handle,
        state: Arc<SequencerState>,
        core_id: Option<usize>,
    ) -> Self {
        Self {
            core,
            queue,
            queries,
            dispatcher,
            pool,
            gateway,
            runtime,
            state,
            core_id,
        }
    }

    /// 启动定序器线程
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("sequencer".to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        self.pin_to_core();
        self.queue.doorbell().register_current();
        info!("sequencer started");

        let backoff = Backoff::new();
        loop {
            let mut busy = self.serve_queries();

            if let Some(command) = self.queue.pop() {
                self.apply(command);
                busy = true;
            }

            if busy {
                backoff.reset();
                continue;
            }

            // 停止信号只在队列排空后生效
            if !self.state.running.load(Ordering::Acquire) {
                break;
            }

            if backoff.is_completed() {
                let queue = &self.queue;
                let queries = &self.queries;
                queue
                    .doorbell()
                    .park_while(|| queue.is_empty() && queries.is_empty(), PARK_TIMEOUT);
            } else {
                backoff.snooze();
            }
        }

        // 停止检查之后才入队的命令
        while let Some(command) = self.queue.pop() {
            self.apply(command);
        }
        self.serve_queries();

        info!(
            processed = self.state.processed.load(Ordering::Relaxed),
            last_sequence = self.core.last_sequence(),
            "sequencer stopped"
        );
    }

    fn pin_to_core(&self) {
        let Some(core) = self.core_id else {
            return;
        };

        #[cfg(feature = "cpu-affinity")]
        {
            let target = core_affinity::get_core_ids()
                .and_then(|ids| ids.into_iter().find(|id| id.id == core));
            match target {
                Some(id) if core_affinity::set_for_current(id) => {
                    info!(core, "sequencer pinned to core");
                }
                _ => warn!(core, "failed to pin sequencer to core"),
            }
        }

        #[cfg(not(feature = "cpu-affinity"))]
        warn!(core, "cpu-affinity feature disabled, sequencer core setting ignored");
    }

    fn serve_queries(&mut self) -> bool {
        let mut served = false;
        while let Ok(query) = self.queries.try_recv() {
            let snapshot = self.core.snapshot(&query.symbol, query.depth);
            // 查询方已超时离开时丢弃
            let _ = query.reply.send(snapshot);
            served = true;
        }
        served
    }

    /// 执行一条命令，单条命令的 panic 不会终止定序器
    ///
    /// 下单命令 panic 时向下单方投递 `REJECTED`，不让它等到超时。
    fn apply(&mut self, command: EngineCommand) {
        let submitted = match &command {
            EngineCommand::Submit(order) => Some((order.order_id.clone(), order.remaining_quantity)),
            EngineCommand::Cancel { .. } => None,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(command)));
        if let Err(payload) = outcome {
            METRICS.sequencer_faults_total.inc();
            error!("command processing panicked, skipped: {}", panic_message(&*payload));

            if let Some((order_id, remaining)) = submitted {
                METRICS
                    .rejections_total
                    .with_label_values(&["sequencer_fault"])
                    .inc();
                let result = MatchingResult::rejected(order_id, self.core.last_sequence(), remaining);
                self.dispatcher.dispatch(result);
            }
        }

        self.state.processed.fetch_add(1, Ordering::Relaxed);
        METRICS.queue_depth.set(self.queue.len() as i64);
    }

    fn execute(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Submit(order) => self.execute_submit(order),
            EngineCommand::Cancel {
                symbol,
                order_id,
                reply,
            } => {
                let (result, removed) = self.core.process_cancel(&symbol, &order_id);
                if let Some(record) = removed {
                    self.pool.release(record);
                }
                debug!(%symbol, %order_id, cancelled = result.cancelled, "cancel processed");
                let _ = reply.send(result);
            }
        }
    }

    fn execute_submit(&mut self, order: Box<Order>) {
        let symbol = Arc::clone(&order.symbol);
        let started = Instant::now();
        let MatchOutcome {
            result,
            released,
            rejection,
        } = self.core.process_submit(order);

        METRICS
            .matching_duration
            .with_label_values(&[symbol.as_ref()])
            .observe(started.elapsed().as_secs_f64() * 1_000_000.0);

        for record in released {
            self.pool.release(record);
        }

        if let Some(reason) = rejection {
            METRICS
                .rejections_total
                .with_label_values(&[reason.as_label()])
                .inc();
            warn!(
                order_id = %result.order_id,
                %symbol,
                reason = reason.as_label(),
                "order rejected by sequencer"
            );
        }

        if !result.trades.is_empty() {
            METRICS
                .trades_total
                .with_label_values(&[symbol.as_ref()])
                .inc_by(result.trades.len() as u64);
            for trade in &result.trades {
                self.persist_trade(trade.clone());
            }
        }

        debug!(
            order_id = %result.order_id,
            sequence = result.sequence,
            trades = result.trades.len(),
            status = ?result.status,
            "order processed"
        );

        self.dispatcher.dispatch(result);
    }

    /// 每笔成交一个独立任务，互不阻塞
    fn persist_trade(&self, trade: Trade) {
        let gateway = Arc::clone(&self.gateway);
        self.runtime.spawn(async move {
            if let Err(e) = gateway.save_trade(&trade).await {
                METRICS
                    .persistence_failures_total
                    .with_label_values(&["trade"])
                    .inc();
                warn!(trade_id = trade.trade_id, symbol = %trade.symbol, "failed to persist trade: {}", e);
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::dispatch::Registration;
    use crate::infrastructure::persistence::InMemoryGateway;
    use crate::shared::clock::FixedClock;
    use crate::shared::protocol::{MatchStatus, Side};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(id: &str, symbol: &str, side: Side, price: &str, qty: &str) -> Box<Order> {
        let mut order = Box::new(Order::default());
        order.populate(id, Arc::from(symbol), side, dec(price), dec(qty));
        order
    }

    fn core() -> SequencerCore {
        SequencerCore::new(Arc::new(FixedClock::new(1_000)))
    }

    #[test]
    fn test_sequence_and_trade_ids_are_global() {
        let mut core = core();
        core.process_submit(order("s1", "BTC/USD", Side::Sell, "100", "1"));
        core.process_submit(order("s2", "ETH/USD", Side::Sell, "10", "1"));

        let btc = core.process_submit(order("b1", "BTC/USD", Side::Buy, "100", "1"));
        let eth = core.process_submit(order("b2", "ETH/USD", Side::Buy, "10", "1"));

        assert_eq!(btc.result.sequence, 3);
        assert_eq!(eth.result.sequence, 4);
        assert_eq!(btc.result.trades[0].trade_id, 1);
        assert_eq!(eth.result.trades[0].trade_id, 2);
        assert_eq!(btc.result.trades[0].timestamp, 1_000);
        assert_eq!(core.last_sequence(), 4);
        assert_eq!(core.next_trade_id(), 3);
    }

    #[test]
    fn test_malformed_order_creates_no_book() {
        let mut core = core();
        let outcome = core.process_submit(order("bad", "", Side::Buy, "1", "1"));
        assert_eq!(outcome.result.status, MatchStatus::Rejected);
        assert_eq!(outcome.released.len(), 1);
        assert_eq!(core.books().count(), 0);
    }

    #[test]
    fn test_cancel_unknown_symbol_and_id() {
        let mut core = core();
        let (result, removed) = core.process_cancel("BTC/USD", "nope");
        assert!(!result.cancelled);
        assert!(removed.is_none());

        core.process_submit(order("b1", "BTC/USD", Side::Buy, "99", "2"));
        let (result, removed) = core.process_cancel("BTC/USD", "b1");
        assert!(result.cancelled);
        assert_eq!(result.remaining_quantity, Some(dec("2")));
        assert!(removed.is_some());
        assert!(core.book("BTC/USD").map_or(false, |b| b.is_empty()));
    }

    #[test]
    fn test_snapshot_unknown_symbol_is_empty() {
        let core = core();
        let snapshot = core.snapshot(&Arc::from("XRP/USD"), 10);
        assert!(snapshot.bids.is_empty());
        assert!(snapshot.asks.is_empty());
        assert_eq!(snapshot.sequence, 0);
    }

    /// 被触发后下一次取时间时 panic 的时钟
    #[derive(Default)]
    struct TrippingClock {
        armed: AtomicBool,
    }

    impl TrippingClock {
        fn trip(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    impl Clock for TrippingClock {
        fn now_nanos(&self) -> u64 {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("clock failure");
            }
            1_000
        }
    }

    async fn await_result(registration: &mut Registration) -> MatchingResult {
        tokio::time::timeout(Duration::from_secs(2), registration.recv())
            .await
            .expect("result within timeout")
            .expect("dispatcher open")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_running_sequencer_survives_panicking_command() {
        let clock = Arc::new(TrippingClock::default());
        let queue = Arc::new(SubmissionQueue::new(16));
        let (_queries, query_rx) = crossbeam::channel::bounded(4);
        let dispatcher = Arc::new(ResultDispatcher::new());
        let pool = Arc::new(ObjectPool::new("order", 16, 0, Order::default));
        let state = Arc::new(SequencerState::default());
        state.running.store(true, Ordering::Release);

        let worker = Sequencer::new(
            SequencerCore::new(clock.clone()),
            Arc::clone(&queue),
            query_rx,
            Arc::clone(&dispatcher),
            pool,
            Arc::new(InMemoryGateway::default()),
            Handle::current(),
            Arc::clone(&state),
            None,
        )
        .spawn()
        .unwrap();

        let faults_before = METRICS.sequencer_faults_total.get();

        let mut victim = dispatcher.register("victim").unwrap();
        clock.trip();
        queue
            .push(EngineCommand::Submit(order("victim", "BTC/USD", Side::Buy, "100", "1")))
            .unwrap();
        let rejected = await_result(&mut victim).await;
        assert_eq!(rejected.status, MatchStatus::Rejected);
        assert_eq!(rejected.sequence, 1);
        assert_eq!(rejected.remaining_quantity, dec("1"));
        drop(victim);
        assert!(METRICS.sequencer_faults_total.get() > faults_before);

        // 后续订单照常撮合
        let mut maker = dispatcher.register("s1").unwrap();
        queue
            .push(EngineCommand::Submit(order("s1", "BTC/USD", Side::Sell, "100", "1")))
            .unwrap();
        assert_eq!(await_result(&mut maker).await.status, MatchStatus::Rested);

        let mut taker = dispatcher.register("b1").unwrap();
        queue
            .push(EngineCommand::Submit(order("b1", "BTC/USD", Side::Buy, "100", "1")))
            .unwrap();
        let matched = await_result(&mut taker).await;
        assert_eq!(matched.status, MatchStatus::Matched);
        assert_eq!(matched.sequence, 3);
        assert_eq!(matched.trades[0].maker_order_id, "s1");

        drop(maker);
        drop(taker);
        assert_eq!(dispatcher.pending(), 0);

        state.running.store(false, Ordering::Release);
        queue.doorbell().ring();
        worker.join().unwrap();
        assert_eq!(state.processed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom 1");
    }
}
