/// 引擎配置
///
/// 启动时确定，运行期不可修改。CLI 参数通过 `CliConfig::engine_config` 转换而来。

use crate::domain::validation::ValidationConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 提交队列容量（下单与撤单共用）
    pub queue_capacity: usize,

    /// 订单簿查询通道容量
    pub query_capacity: usize,

    /// 调用方等待撮合结果的超时
    pub result_timeout: Duration,

    /// depth 为 0 时使用的快照深度
    pub default_depth: usize,

    /// 快照深度上限
    pub max_depth: usize,

    /// limit 为 0 时返回的成交条数
    pub default_trade_limit: usize,

    /// 成交查询条数上限
    pub max_trade_limit: usize,

    /// 订单对象池空闲链表容量
    pub pool_capacity: usize,

    /// 启动时预分配的订单记录数
    pub pool_prefill: usize,

    /// 内存网关每个交易对保留的成交条数
    pub trade_history_per_symbol: usize,

    /// 下单校验规则
    pub validation: ValidationConfig,

    /// 定序器线程绑定的 CPU 核心（需启用 cpu-affinity feature）
    pub sequencer_core: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1 << 20,
            query_capacity: 1024,
            result_timeout: Duration::from_secs(2),
            default_depth: 10,
            max_depth: 1000,
            default_trade_limit: 100,
            max_trade_limit: 10_000,
            pool_capacity: 65_536,
            pool_prefill: 4_096,
            trade_history_per_symbol: 10_000,
            validation: ValidationConfig::default(),
            sequencer_core: None,
        }
    }
}

impl EngineConfig {
    /// 0 表示默认深度，超过上限时截断
    pub fn effective_depth(&self, depth: usize) -> usize {
        match depth {
            0 => self.default_depth,
            d => d.min(self.max_depth),
        }
    }

    /// 0 表示默认条数，超过上限时截断
    pub fn effective_trade_limit(&self, limit: usize) -> usize {
        match limit {
            0 => self.default_trade_limit,
            l => l.min(self.max_trade_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.queue_capacity, 1_048_576);
        assert_eq!(config.result_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_effective_depth_and_limit() {
        let config = EngineConfig::default();
        assert_eq!(config.effective_depth(0), 10);
        assert_eq!(config.effective_depth(5), 5);
        assert_eq!(config.effective_depth(50_000), 1000);
        assert_eq!(config.effective_trade_limit(0), 100);
        assert_eq!(config.effective_trade_limit(1_000_000), 10_000);
    }
}
