//! Health Check Endpoint
//!
//! 根据撮合引擎的运行状态给出健康结论，供负载均衡器和监控系统使用
//!
//! ## 判定规则
//! - 定序器未运行 -> `unhealthy`
//! - 提交队列占用超过 `DEGRADED_QUEUE_RATIO` -> `degraded`（即将触发背压）
//! - 其余 -> `healthy`
//!
//! ## 响应格式
//! ```json
//! {
//!   "status": "healthy",
//!   "uptime_seconds": 3600,
//!   "version": "0.1.0",
//!   "timestamp": 1234567890,
//!   "details": { "queue_depth": 0, "queue_capacity": 1048576, ... }
//! }
//! ```

use crate::application::services::{EngineStats, MatchingService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// 队列占用达到该比例即视为降级
pub const DEGRADED_QUEUE_RATIO: f64 = 0.9;

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 健康
    Healthy,
    /// 降级（队列接近满载）
    Degraded,
    /// 不健康（定序器未运行）
    Unhealthy,
}

/// 健康检查响应
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// 运行时间（秒）
    pub uptime_seconds: u64,
    pub version: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<EngineStats>,
}

/// 引擎状态来源
pub trait EngineProbe: Send + Sync {
    fn stats(&self) -> EngineStats;
}

impl EngineProbe for MatchingService {
    fn stats(&self) -> EngineStats {
        MatchingService::stats(self)
    }
}

/// 健康检查器
pub struct HealthChecker {
    start_time: SystemTime,
    version: String,
    probe: Arc<dyn EngineProbe>,
}

impl HealthChecker {
    pub fn new(version: impl Into<String>, probe: Arc<dyn EngineProbe>) -> Self {
        Self {
            start_time: SystemTime::now(),
            version: version.into(),
            probe,
        }
    }

    /// 获取运行时间（秒）
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time
            .elapsed()
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn status_of(stats: &EngineStats) -> HealthStatus {
        if !stats.running {
            return HealthStatus::Unhealthy;
        }
        let occupancy = stats.queue_depth as f64 / stats.queue_capacity.max(1) as f64;
        if occupancy >= DEGRADED_QUEUE_RATIO {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn get_status(&self) -> HealthStatus {
        Self::status_of(&self.probe.stats())
    }

    /// 生成详细健康检查响应
    pub fn check_health(&self) -> HealthResponse {
        let stats = self.probe.stats();
        HealthResponse {
            status: Self::status_of(&stats),
            uptime_seconds: self.uptime_seconds(),
            version: self.version.clone(),
            timestamp: Self::current_timestamp(),
            details: Some(stats),
        }
    }

    /// 存活检查（liveness probe）
    /// 进程能应答即存活，定序器状态交给就绪检查
    pub fn check_liveness(&self) -> bool {
        true
    }

    /// 就绪检查（readiness probe）
    /// 降级时仍可接流量，只有定序器停止才摘除
    pub fn check_readiness(&self) -> bool {
        !matches!(self.get_status(), HealthStatus::Unhealthy)
    }
}
