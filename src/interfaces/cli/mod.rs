/// CLI Interface Module
///
/// 撮合引擎作为独立进程运行时的入口。
///
/// ## Responsibilities
/// - Parse command-line arguments into an `EngineConfig`
/// - Start the engine and the observability server
/// - Replay a newline-delimited JSON order file (`--replay`)
/// - Handle graceful shutdown on Ctrl-C

use crate::application::{EngineConfig, EngineError, MatchingService};
use crate::domain::validation::ValidationConfig;
use crate::infrastructure::observability::{HealthChecker, ObservabilityServer};
use crate::infrastructure::persistence::InMemoryGateway;
use crate::shared::clock::FixedClock;
use crate::shared::protocol::SubmitOrderRequest;
use clap::Parser;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 撮合引擎命令行配置
#[derive(Parser, Debug, Clone)]
#[command(name = "matching-sequencer")]
#[command(version = "0.1.0")]
#[command(about = "单写者定序撮合引擎", long_about = None)]
pub struct CliConfig {
    /// 提交队列容量（满时快速失败）
    #[arg(short = 'q', long, default_value_t = 1 << 20)]
    pub queue_capacity: usize,

    /// 订单簿查询通道容量
    #[arg(long, default_value_t = 1024)]
    pub query_capacity: usize,

    /// 等待撮合结果的超时（毫秒）
    #[arg(short = 't', long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// 默认快照深度
    #[arg(short = 'd', long, default_value_t = 10)]
    pub depth: usize,

    /// 默认成交查询条数
    #[arg(long, default_value_t = 100)]
    pub trade_limit: usize,

    /// 每个交易对保留的成交历史条数
    #[arg(long, default_value_t = 10_000)]
    pub trade_history: usize,

    /// 订单对象池容量
    #[arg(long, default_value_t = 65_536)]
    pub pool_capacity: usize,

    /// 允许交易的交易对，逗号分隔（为空表示不限制）
    #[arg(short = 's', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Prometheus/健康检查端口，0 表示不启动
    #[arg(short = 'm', long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// 定序器线程绑定的CPU核心
    #[arg(long)]
    pub sequencer_core: Option<usize>,

    /// 日志级别
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// 按顺序回放 NDJSON 订单文件，输出每笔结果和最终订单簿后退出
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// 仅显示配置不启动服务（用于调试）
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl CliConfig {
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            queue_capacity: self.queue_capacity,
            query_capacity: self.query_capacity,
            result_timeout: Duration::from_millis(self.timeout_ms),
            default_depth: self.depth,
            default_trade_limit: self.trade_limit,
            pool_capacity: self.pool_capacity,
            pool_prefill: defaults.pool_prefill.min(self.pool_capacity),
            trade_history_per_symbol: self.trade_history,
            validation: ValidationConfig {
                allowed_symbols: self
                    .symbols
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(Arc::<str>::from)
                    .collect(),
                ..ValidationConfig::default()
            },
            sequencer_core: self.sequencer_core,
            ..defaults
        }
    }
}

/// Runs the CLI application
pub async fn run() -> Result<(), EngineError> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    // 回放模式的 stdout 只输出 NDJSON
    if let (Some(path), false) = (&config.replay, config.dry_run) {
        return replay(&config, path).await;
    }

    print_banner(&config);

    if config.dry_run {
        println!("\nDry-run 模式 - 不启动服务");
        println!("{:#?}", config.engine_config());
        return Ok(());
    }

    serve(&config).await
}

fn print_banner(config: &CliConfig) {
    println!("========================================");
    println!("  单写者定序撮合引擎 v0.1.0");
    println!("========================================");
    println!("队列容量:     {}", config.queue_capacity);
    println!("结果超时:     {} ms", config.timeout_ms);
    println!("快照深度:     {}", config.depth);
    println!("交易对限制:   {}", if config.symbols.is_empty() { "无".to_string() } else { config.symbols.join(",") });
    println!("指标端口:     {}", if config.metrics_port == 0 { "禁用".to_string() } else { config.metrics_port.to_string() });
    println!("定序器核心:   {}", config.sequencer_core.map_or("不绑定".to_string(), |c| c.to_string()));
    println!("日志级别:     {}", config.log_level);
    println!("========================================");
}

/// 常驻运行，直到 Ctrl-C
async fn serve(config: &CliConfig) -> Result<(), EngineError> {
    let engine_config = config.engine_config();
    let gateway = Arc::new(InMemoryGateway::new(engine_config.trade_history_per_symbol));
    let engine = Arc::new(MatchingService::spawn(engine_config, gateway)?);

    if config.metrics_port != 0 {
        let checker = Arc::new(HealthChecker::new(env!("CARGO_PKG_VERSION"), engine.clone()));
        let server = ObservabilityServer::new(config.metrics_port, checker);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("observability server stopped: {}", e);
            }
        });
    }

    info!("撮合引擎已就绪，Ctrl-C 退出");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
    }

    info!("收到退出信号，等待定序器排空队列");
    engine.shutdown();
    Ok(())
}

/// 按文件顺序逐笔提交，时间戳固定为 0，同一文件的输出逐字节一致
async fn replay(config: &CliConfig, path: &Path) -> Result<(), EngineError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EngineError::Runtime(format!("cannot read {}: {}", path.display(), e)))?;

    let engine_config = config.engine_config();
    let max_depth = engine_config.max_depth;
    let gateway = Arc::new(InMemoryGateway::new(engine_config.trade_history_per_symbol));
    let engine = MatchingService::new(engine_config, gateway, Arc::new(FixedClock::new(0)))?;
    engine.start()?;

    let mut symbols = BTreeSet::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let request: SubmitOrderRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                println!("{}", json!({ "line": line_no + 1, "error": e.to_string() }));
                continue;
            }
        };

        symbols.insert(request.symbol.trim().to_string());
        let order_id = request.order_id.clone();
        match engine.submit_order(request).await {
            Ok(result) => println!("{}", serde_json::to_string(&result).unwrap_or_default()),
            Err(e) => println!("{}", json!({ "order_id": order_id, "error": e.to_string() })),
        }
    }

    for symbol in symbols.iter().filter(|s| !s.is_empty()) {
        match engine.get_order_book(symbol, max_depth).await {
            Ok(snapshot) => println!("{}", serde_json::to_string(&snapshot).unwrap_or_default()),
            Err(e) => println!("{}", json!({ "symbol": symbol, "error": e.to_string() })),
        }
    }

    engine.shutdown();
    Ok(())
}

/// 初始化日志系统，RUST_LOG 优先于 --log-level
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // 回放模式的结果写 stdout，日志走 stderr 以免混在一起
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_default() {
        let config = CliConfig::parse_from(["matching-sequencer"]);
        assert_eq!(config.queue_capacity, 1_048_576);
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.depth, 10);
        assert_eq!(config.metrics_port, 9090);
        assert!(config.symbols.is_empty());
        assert!(config.sequencer_core.is_none());
        assert!(config.replay.is_none());
        assert_eq!(config.log_level, "info");
        assert!(!config.dry_run);
    }

    #[test]
    fn test_cli_config_custom() {
        let config = CliConfig::parse_from([
            "matching-sequencer",
            "--queue-capacity", "2048",
            "--timeout-ms", "500",
            "--symbols", "BTC/USD,ETH/USD",
            "--metrics-port", "0",
            "--sequencer-core", "3",
            "--replay", "orders.ndjson",
            "--log-level", "debug",
            "--dry-run",
        ]);

        assert_eq!(config.queue_capacity, 2048);
        assert_eq!(config.symbols, vec!["BTC/USD", "ETH/USD"]);
        assert_eq!(config.metrics_port, 0);
        assert_eq!(config.sequencer_core, Some(3));
        assert_eq!(config.replay, Some(PathBuf::from("orders.ndjson")));
        assert_eq!(config.log_level, "debug");
        assert!(config.dry_run);
    }

    #[test]
    fn test_cli_config_short_flags() {
        let config = CliConfig::parse_from([
            "matching-sequencer",
            "-q", "512",
            "-t", "100",
            "-d", "5",
            "-s", "SOL/USD",
            "-m", "9100",
            "-l", "warn",
        ]);

        assert_eq!(config.queue_capacity, 512);
        assert_eq!(config.timeout_ms, 100);
        assert_eq!(config.depth, 5);
        assert_eq!(config.symbols, vec!["SOL/USD"]);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_engine_config_conversion() {
        let config = CliConfig::parse_from([
            "matching-sequencer",
            "-q", "4096",
            "-t", "250",
            "--pool-capacity", "128",
            "-s", "BTC/USD, ETH/USD",
        ]);
        let engine = config.engine_config();

        assert_eq!(engine.queue_capacity, 4096);
        assert_eq!(engine.result_timeout, Duration::from_millis(250));
        assert_eq!(engine.pool_capacity, 128);
        assert!(engine.pool_prefill <= 128);
        let allowed: Vec<_> = engine.validation.allowed_symbols.iter().map(|s| s.as_ref()).collect();
        assert_eq!(allowed, vec!["BTC/USD", "ETH/USD"]);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(CliConfig::try_parse_from(["matching-sequencer", "-l", "verbose"]).is_err());
    }
}
