/// 定长环形缓冲区
///
/// 用作每个交易对的最近成交历史：
/// - 预分配固定容量，运行期零分配
/// - `push_overwrite` 满时淘汰最旧元素
/// - 支持正反向遍历（最新在后）
///
/// 非线程安全，由外层锁保护。

use std::mem::MaybeUninit;

pub struct RingBuffer<T> {
    /// 底层数据存储（预分配）
    buffer: Box<[MaybeUninit<T>]>,

    /// 最旧元素位置
    head: usize,

    /// 当前元素数量
    len: usize,
}

impl<T> RingBuffer<T> {
    /// 创建指定容量的 RingBuffer
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        let buffer = (0..capacity)
            .map(|_| MaybeUninit::uninit())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buffer,
            head: 0,
            len: 0,
        }
    }

    #[inline]
    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.buffer.len()
    }

    /// 入队；满时返回原值
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        let tail = self.slot(self.len);
        self.buffer[tail].write(value);
        self.len += 1;
        Ok(())
    }

    /// 入队；满时淘汰并返回最旧元素
    #[inline]
    pub fn push_overwrite(&mut self, value: T) -> Option<T> {
        let evicted = if self.is_full() { self.pop() } else { None };
        // 刚刚腾出一个位置，不会失败
        if self.push(value).is_err() {
            unreachable!("ring buffer has room after eviction");
        }
        evicted
    }

    /// 出队最旧元素
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        // 安全性：head 位置在 len > 0 时一定已初始化
        let value = unsafe { self.buffer[self.head].assume_init_read() };
        self.head = (self.head + 1) % self.buffer.len();
        self.len -= 1;
        Some(value)
    }

    /// 最旧元素
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    /// 最新元素
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    /// 按从旧到新的偏移读取
    #[inline]
    pub fn get(&self, offset: usize) -> Option<&T> {
        if offset >= self.len {
            return None;
        }
        // 安全性：offset < len 的槽位均已初始化
        Some(unsafe { self.buffer[self.slot(offset)].assume_init_ref() })
    }

    /// 从旧到新遍历；`.rev()` 即从新到旧
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            front: 0,
            back: self.len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.buffer.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// 借用迭代器
pub struct Iter<'a, T> {
    ring: &'a RingBuffer<T>,
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.ring.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.ring.get(self.back)
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}
