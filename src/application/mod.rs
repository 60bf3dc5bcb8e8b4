/// Application Layer - Use Cases and Services
///
/// Wires the domain (books, validation) to the concurrency boundary:
/// submission queue, sequencer thread, result dispatch and the facade.
///
/// ## Modules
/// - `config`: startup configuration
/// - `error`: the error type every facade operation returns
/// - `services`: queue, dispatcher, sequencer, `MatchingService`

pub mod config;
pub mod error;
pub mod services;

// Re-export key services
pub use config::EngineConfig;
pub use error::EngineError;
pub use services::{EngineStats, MatchingService, SequencerCore};
