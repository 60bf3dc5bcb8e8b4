// 全局内存分配器：使用 jemalloc 提升性能
// 订单记录、成交与结果在多线程间频繁分配释放，jemalloc 的线程缓存更合适
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

// 将所有模块声明为公共的，这样二进制文件、测试和基准测试都能访问它们
pub mod shared;
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod interfaces;
