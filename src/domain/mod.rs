/// Domain Layer - Core Business Logic
///
/// Pure matching rules: no threads, no I/O, no clocks. The sequencer feeds
/// commands in and takes results and released records out.
///
/// ## Modules
/// - `order`: the pooled order record
/// - `orderbook`: price ladders, price levels and the matching sweep
/// - `validation`: request checks run before enqueue

pub mod order;
pub mod orderbook;
pub mod validation;

// Re-export key types
pub use order::Order;
pub use orderbook::{LimitOrderBook, MatchContext, MatchOutcome, OrderBook, RejectReason};
pub use validation::{OrderValidator, ValidatedOrder, ValidationConfig, ValidationError};
