/// Domain Layer - OrderBook Module
///
/// ## Production Implementation
/// - `LimitOrderBook`: two `BTreeMap` price ladders keyed by exact `Decimal`
///   prices, FIFO `PriceLevel` queues, id index for cancellation
///
/// ## Trait Abstraction
/// The sequencer drives books through `OrderBook`, keeping the matching
/// loop independent of the book layout.

pub mod limit_book;
pub mod price_level;
pub mod traits;

pub use limit_book::{Ladder, LimitOrderBook, PriceKey};
pub use price_level::PriceLevel;
pub use traits::{MatchContext, MatchOutcome, OrderBook, RejectReason};
