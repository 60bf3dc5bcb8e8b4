//! Prometheus Metrics Module
//!
//! 撮合引擎核心指标
//!
//! ## 指标类型
//! - **Counter**: 订单总数、拒单原因、成交总数、持久化失败
//! - **Histogram**: 撮合延迟
//! - **Gauge**: 队列深度、等待结果的调用方数量
//!
//! ## 使用示例
//! ```rust,ignore
//! use matching_sequencer::shared::metrics::METRICS;
//!
//! METRICS.orders_total.with_label_values(&["buy"]).inc();
//!
//! let timer = METRICS.matching_duration.with_label_values(&["BTC/USD"]).start_timer();
//! // ... 执行撮合 ...
//! timer.observe_duration();
//! ```

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// 全局Metrics实例
    pub static ref METRICS: Metrics = Metrics::new();
}

/// 撮合引擎核心指标
pub struct Metrics {
    /// 进入校验后的订单总数 (按方向: buy/sell)
    pub orders_total: IntCounterVec,

    /// 下单失败总数 (按原因)
    pub rejections_total: IntCounterVec,

    /// 成交总数
    pub trades_total: IntCounterVec,

    /// 定序器内单笔撮合耗时 (微秒)
    pub matching_duration: HistogramVec,

    /// 提交队列当前深度
    pub queue_depth: IntGauge,

    /// 正在等待撮合结果的调用方数量
    pub pending_results: IntGauge,

    /// 持久化失败总数 (trade/snapshot)
    pub persistence_failures_total: IntCounterVec,

    /// 对象池取用次数 (复用/新分配)
    pub pool_acquisitions_total: IntCounterVec,

    /// 定序器内被跳过的异常命令数
    pub sequencer_faults_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            orders_total: register_int_counter_vec!(
                "matching_sequencer_orders_total",
                "Total number of validated orders submitted",
                &["side"]
            )
            .expect("register orders_total"),

            rejections_total: register_int_counter_vec!(
                "matching_sequencer_rejections_total",
                "Total number of submissions that did not yield a result",
                &["reason"]
            )
            .expect("register rejections_total"),

            trades_total: register_int_counter_vec!(
                "matching_sequencer_trades_total",
                "Total number of trades executed",
                &["symbol"]
            )
            .expect("register trades_total"),

            matching_duration: register_histogram_vec!(
                "matching_sequencer_matching_duration_microseconds",
                "Order matching duration inside the sequencer in microseconds",
                &["symbol"],
                vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
            )
            .expect("register matching_duration"),

            queue_depth: register_int_gauge!(
                "matching_sequencer_queue_depth",
                "Commands waiting in the submission queue"
            )
            .expect("register queue_depth"),

            pending_results: register_int_gauge!(
                "matching_sequencer_pending_results",
                "Callers currently waiting for a matching result"
            )
            .expect("register pending_results"),

            persistence_failures_total: register_int_counter_vec!(
                "matching_sequencer_persistence_failures_total",
                "Persistence writes that failed and were dropped",
                &["kind"]
            )
            .expect("register persistence_failures_total"),

            pool_acquisitions_total: register_int_counter_vec!(
                "matching_sequencer_pool_acquisitions_total",
                "Object pool acquisitions by source",
                &["pool", "source"]
            )
            .expect("register pool_acquisitions_total"),

            sequencer_faults_total: register_int_counter!(
                "matching_sequencer_faults_total",
                "Commands skipped by the sequencer after an internal fault"
            )
            .expect("register sequencer_faults_total"),
        }
    }

    /// 导出Prometheus文本格式的指标
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("metrics encoding failed: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
