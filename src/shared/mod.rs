/// Shared utilities and types used across all layers
///
/// This module contains:
/// - Protocol definitions (requests, trades, results, snapshots)
/// - Common data structures (symbol pool, object pool, ring buffer)
/// - Utilities (clock, metrics)

pub mod protocol;
pub mod symbol_pool;
pub mod clock;
pub mod collections;
pub mod metrics;

// Re-export commonly used types
pub use protocol::{
    CancelResult, MatchStatus, MatchingResult, OrderBookSnapshot, PriceLevelView, Side,
    SubmitOrderRequest, Trade,
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use symbol_pool::SymbolPool;
