/// Symbol字符串池 - 交易对符号驻留
///
/// 订单、订单簿和成交记录共享同一个 `Arc<str>`：
/// 1. 每个交易对只分配一次
/// 2. 读多写少，使用读写锁
/// 3. 查询路径只读不插入，未知符号不会撑大池子
///
/// 性能特点：
/// - 首次出现：读锁 + 写锁 + 堆分配
/// - 后续访问：读锁 + Arc克隆（原子增量）

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// 交易对符号池
pub struct SymbolPool {
    symbols: RwLock<HashMap<Arc<str>, ()>>,
}

impl SymbolPool {
    pub fn new() -> Self {
        Self {
            symbols: RwLock::new(HashMap::new()),
        }
    }

    /// 创建带有预设容量的符号池
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            symbols: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// 驻留一个符号，返回共享的 `Arc<str>`
    #[inline]
    pub fn intern(&self, symbol: &str) -> Arc<str> {
        if let Some(existing) = self.get(symbol) {
            return existing;
        }

        let mut write_guard = self.symbols.write();
        // 获取写锁期间其他线程可能已插入
        if let Some((existing, _)) = write_guard.get_key_value(symbol) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(symbol);
        write_guard.insert(Arc::clone(&interned), ());
        interned
    }

    /// 只查不插
    #[inline]
    pub fn get(&self, symbol: &str) -> Option<Arc<str>> {
        self.symbols
            .read()
            .get_key_value(symbol)
            .map(|(existing, _)| Arc::clone(existing))
    }

    /// 启动时预热常见交易对
    pub fn preload(&self, symbols: &[&str]) {
        let mut write_guard = self.symbols.write();
        for &symbol in symbols {
            if !write_guard.contains_key(symbol) {
                write_guard.insert(Arc::from(symbol), ());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

impl Default for SymbolPool {
    fn default() -> Self {
        Self::new()
    }
}
