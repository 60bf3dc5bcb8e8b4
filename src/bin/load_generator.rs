use futures::future::join_all;
use matching_sequencer::application::{EngineConfig, EngineError, MatchingService};
use matching_sequencer::infrastructure::persistence::InMemoryGateway;
use matching_sequencer::shared::protocol::{MatchStatus, Side, SubmitOrderRequest};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// --- 配置 ---
const TEST_DURATION: Duration = Duration::from_secs(10); // 测试持续时间
const SYMBOL: &str = "BTC/USD";

/// 各类结果计数
#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    trades: AtomicU64,
    matched: AtomicU64,
    rested: AtomicU64,
    backpressure: AtomicU64,
    timeouts: AtomicU64,
    other_errors: AtomicU64,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    // 定序器独占一个核心，其余留给模拟客户端
    let num_clients = num_cpus::get().saturating_sub(1).max(1) * 4;

    println!("启动进程内吞吐量测试...");
    println!("模拟客户端数量: {}", num_clients);
    println!("测试持续时间: {:?}", TEST_DURATION);

    let config = EngineConfig {
        queue_capacity: 65_536,
        ..EngineConfig::default()
    };
    let gateway = Arc::new(InMemoryGateway::new(config.trade_history_per_symbol));
    let engine = match MatchingService::spawn(config, gateway) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("撮合引擎启动失败: {}", e);
            std::process::exit(1);
        }
    };

    let counters = Arc::new(Counters::default());
    let (latency_tx, mut latency_rx) = mpsc::unbounded_channel::<u128>();
    let deadline = Instant::now() + TEST_DURATION;

    let started = Instant::now();
    let clients: Vec<_> = (0..num_clients)
        .map(|client_id| {
            let engine = Arc::clone(&engine);
            let counters = Arc::clone(&counters);
            let latency_tx = latency_tx.clone();
            tokio::spawn(async move {
                run_client(client_id as u64, engine, counters, latency_tx, deadline).await;
            })
        })
        .collect();
    // 只剩客户端持有发送端，全部结束后接收循环才会退出
    drop(latency_tx);

    join_all(clients).await;
    let elapsed = started.elapsed();

    // 收集并计算延迟分布
    let mut latencies = Vec::new();
    while let Some(latency) = latency_rx.recv().await {
        latencies.push(latency);
    }
    latencies.sort_unstable();
    let percentile = |p: f64| -> f64 {
        if latencies.is_empty() {
            return 0.0;
        }
        let idx = ((latencies.len() - 1) as f64 * p).round() as usize;
        latencies[idx] as f64 / 1000.0
    };

    let submitted = counters.submitted.load(Ordering::Relaxed);
    let stats = engine.stats();
    engine.shutdown();

    println!("\n--- 测试结果 ---");
    println!("提交订单数:     {}", submitted);
    println!("吞吐量 (OPS):   {:.2}", submitted as f64 / elapsed.as_secs_f64());
    println!("成交笔数:       {}", counters.trades.load(Ordering::Relaxed));
    println!("完全成交订单:   {}", counters.matched.load(Ordering::Relaxed));
    println!("挂单订单:       {}", counters.rested.load(Ordering::Relaxed));
    println!("背压拒绝:       {}", counters.backpressure.load(Ordering::Relaxed));
    println!("等待超时:       {}", counters.timeouts.load(Ordering::Relaxed));
    println!("其他错误:       {}", counters.other_errors.load(Ordering::Relaxed));
    println!("延迟 p50:       {:.2} µs", percentile(0.50));
    println!("延迟 p99:       {:.2} µs", percentile(0.99));
    println!("延迟 p99.9:     {:.2} µs", percentile(0.999));
    println!("定序器处理命令: {}", stats.processed_commands);
}

async fn run_client(
    client_id: u64,
    engine: Arc<MatchingService>,
    counters: Arc<Counters>,
    latency_tx: mpsc::UnboundedSender<u128>,
    deadline: Instant,
) {
    let mut sequence: u64 = 0;
    while Instant::now() < deadline {
        sequence += 1;
        let request = {
            let mut rng = rand::thread_rng();
            let side = if rng.gen::<bool>() { Side::Buy } else { Side::Sell };
            // 买卖价区间重叠，保证持续有成交
            let ticks = match side {
                Side::Buy => rng.gen_range(49_990..=50_005),
                Side::Sell => rng.gen_range(49_995..=50_010),
            };
            SubmitOrderRequest::limit(
                format!("c{}-{}", client_id, sequence),
                SYMBOL,
                side,
                format!("{}.{}", ticks, rng.gen_range(0..10)),
                format!("{}", rng.gen_range(1..=5)),
            )
        };

        let sent_at = Instant::now();
        counters.submitted.fetch_add(1, Ordering::Relaxed);
        match engine.submit_order(request).await {
            Ok(result) => {
                let _ = latency_tx.send(sent_at.elapsed().as_nanos());
                counters
                    .trades
                    .fetch_add(result.trades.len() as u64, Ordering::Relaxed);
                match result.status {
                    MatchStatus::Matched => counters.matched.fetch_add(1, Ordering::Relaxed),
                    MatchStatus::Rested => counters.rested.fetch_add(1, Ordering::Relaxed),
                    _ => 0,
                };
            }
            Err(EngineError::Backpressure { .. }) => {
                counters.backpressure.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
            Err(EngineError::Timeout { .. }) => {
                counters.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.other_errors.fetch_add(1, Ordering::Relaxed);
                eprintln!("[客户端 {}] 下单失败: {}", client_id, e);
            }
        }
    }
}
