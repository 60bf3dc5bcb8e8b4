/// 成交时间戳时钟
///
/// 定序器只通过 `Clock` 取时间，测试与回放注入 `FixedClock`，
/// 使同一命令序列产生逐字节一致的成交记录。
///
/// `SystemClock` 沿用批量时间戳思路：
/// - 每 `UPDATE_INTERVAL` 次调用才真正读取系统时间
/// - 中间调用直接返回缓存值
/// - 时间戳只用于展示，价格-时间优先级由到达序号决定

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 每多少次调用刷新一次缓存
const UPDATE_INTERVAL: u32 = 100;

static TIMESTAMP_CACHE: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static UPDATE_COUNTER: Cell<u32> = Cell::new(0);
}

/// 时间源
pub trait Clock: Send + Sync {
    /// Unix 纳秒
    fn now_nanos(&self) -> u64;
}

/// 系统时钟（带缓存）
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_nanos(&self) -> u64 {
        fast_timestamp()
    }
}

/// 固定时钟，可手动推进
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl Clock for FixedClock {
    fn now_nanos(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// 获取快速时间戳
///
/// 缓存为空（进程刚启动）时总是读取真实时间，避免返回 0。
#[inline]
pub fn fast_timestamp() -> u64 {
    UPDATE_COUNTER.with(|counter| {
        let count = counter.get();
        let cached = TIMESTAMP_CACHE.load(Ordering::Relaxed);
        if count >= UPDATE_INTERVAL || cached == 0 {
            let fresh = precise_timestamp();
            TIMESTAMP_CACHE.fetch_max(fresh, Ordering::Relaxed);
            counter.set(0);
            TIMESTAMP_CACHE.load(Ordering::Relaxed)
        } else {
            counter.set(count + 1);
            cached
        }
    })
}

/// 获取精确时间戳（无缓存）
#[inline]
pub fn precise_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
