/// 提交队列 - 多生产者 / 单消费者的有界无锁队列
///
/// - 任意数量的调用方并发 `push`，队列满时立即把命令退回（快速失败，不重试）
/// - 唯一消费者是定序器线程，`pop` 非阻塞
/// - 出队顺序即撮合顺序，也是回放顺序
///
/// 定序器空闲时会短暂 park，生产者入队后通过 `Doorbell` 唤醒它。

use crate::domain::order::Order;
use crate::shared::protocol::CancelResult;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::Duration;
use tokio::sync::oneshot;

/// 定序器处理的命令
#[derive(Debug)]
pub enum EngineCommand {
    /// 新订单（已通过校验的池化记录）
    Submit(Box<Order>),
    /// 撤单，结果经内嵌的 oneshot 返回
    Cancel {
        symbol: Arc<str>,
        order_id: String,
        reply: oneshot::Sender<CancelResult>,
    },
}

/// 定序器唤醒门铃
///
/// 只有在定序器声明自己即将 park 时才真正 unpark，
/// 繁忙时生产者的 `ring` 只是一次原子读。
#[derive(Debug, Default)]
pub struct Doorbell {
    sleeping: AtomicBool,
    consumer: OnceLock<Thread>,
}

impl Doorbell {
    /// 登记当前线程为消费者，只在定序器线程内调用一次
    pub fn register_current(&self) {
        let _ = self.consumer.set(thread::current());
    }

    /// 唤醒正在 park 的消费者
    #[inline]
    pub fn ring(&self) {
        if self.sleeping.swap(false, Ordering::SeqCst) {
            if let Some(consumer) = self.consumer.get() {
                consumer.unpark();
            }
        }
    }

    /// 在 `idle()` 仍为真时 park，最长 `timeout`
    ///
    /// 先置 `sleeping` 再复查条件，避免错过检查与 park 之间到达的唤醒。
    /// 这里是 store 后接另一变量的 load，必须用 SeqCst，否则两者可能重排。
    pub fn park_while(&self, idle: impl Fn() -> bool, timeout: Duration) {
        self.sleeping.store(true, Ordering::SeqCst);
        if idle() {
            thread::park_timeout(timeout);
        }
        self.sleeping.store(false, Ordering::Release);
    }
}

pub struct SubmissionQueue {
    queue: ArrayQueue<EngineCommand>,
    doorbell: Doorbell,
}

impl SubmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            doorbell: Doorbell::default(),
        }
    }

    /// 入队；队列满时原样退回命令
    #[inline]
    pub fn push(&self, command: EngineCommand) -> Result<(), EngineCommand> {
        self.queue.push(command)?;
        self.doorbell.ring();
        Ok(())
    }

    #[inline]
    pub fn pop(&self) -> Option<EngineCommand> {
        self.queue.pop()
    }

    pub fn doorbell(&self) -> &Doorbell {
        &self.doorbell
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
