/// Collections used around the sequencer
///
/// - ObjectPool: concurrent free list of reusable records
/// - RingBuffer: fixed-capacity history buffer with overwrite

pub mod object_pool;
pub mod ringbuffer;

pub use object_pool::{ObjectPool, PoolStats, Recycle};
pub use ringbuffer::RingBuffer;
