/// 对象池 - 可复用记录的并发空闲链表
///
/// 高频下单时每笔订单都要一条 `Box<Order>`，对象池把撮合完成的记录回收复用：
/// - `acquire` 取出空闲记录，池空时新分配
/// - `release` 重置后放回，池满时直接丢弃
/// - 空闲链表为无锁有界队列，任意线程可并发取还
///
/// 记录以 `Box<T>` 的所有权流转：归还即转移所有权，
/// 因此不可能出现“先归还、后读取”的悬垂访问。

use crate::shared::metrics::METRICS;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// 归还对象池前的重置
pub trait Recycle {
    /// 清空业务字段，保留已分配的容量
    fn recycle(&mut self);
}

/// 对象池统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub allocated: u64,
    pub reused: u64,
    pub available: usize,
}

pub struct ObjectPool<T> {
    name: &'static str,
    free: ArrayQueue<Box<T>>,
    factory: fn() -> T,
    allocated: AtomicU64,
    reused: AtomicU64,
}

impl<T: Recycle> ObjectPool<T> {
    /// 创建对象池
    ///
    /// # 参数
    /// * `name` - metrics 标签
    /// * `capacity` - 空闲链表最大长度
    /// * `prefill` - 启动时预分配的记录数（不超过 capacity）
    /// * `factory` - 新记录构造函数
    pub fn new(name: &'static str, capacity: usize, prefill: usize, factory: fn() -> T) -> Self {
        let free = ArrayQueue::new(capacity.max(1));
        for _ in 0..prefill.min(capacity) {
            let _ = free.push(Box::new(factory()));
        }
        Self {
            name,
            free,
            factory,
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// 取出一条记录
    #[inline]
    pub fn acquire(&self) -> Box<T> {
        match self.free.pop() {
            Some(item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                METRICS
                    .pool_acquisitions_total
                    .with_label_values(&[self.name, "reused"])
                    .inc();
                item
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                METRICS
                    .pool_acquisitions_total
                    .with_label_values(&[self.name, "allocated"])
                    .inc();
                Box::new((self.factory)())
            }
        }
    }

    /// 归还一条记录
    #[inline]
    pub fn release(&self, mut item: Box<T>) {
        item.recycle();
        // 池满说明突发流量已过，多余的记录直接释放
        let _ = self.free.push(item);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            available: self.free.len(),
        }
    }
}
