/// Application Services
///
/// - `submission_queue`: bounded lock-free command queue with consumer doorbell
/// - `dispatch`: order id -> completion signal table
/// - `sequencer`: the single writer thread and its replayable state machine
/// - `matching_service`: the facade callers use

pub mod dispatch;
pub mod matching_service;
pub mod sequencer;
pub mod submission_queue;

pub use dispatch::{Registration, ResultDispatcher};
pub use matching_service::{EngineStats, MatchingService};
pub use sequencer::{BookQuery, Sequencer, SequencerCore, SequencerState};
pub use submission_queue::{Doorbell, EngineCommand, SubmissionQueue};
