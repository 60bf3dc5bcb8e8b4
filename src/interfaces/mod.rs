/// Interfaces Layer - External Entry Points
///
/// The process entry point lives here; network transports (gRPC, HTTP)
/// sit outside this crate and talk to `MatchingService` directly.
///
/// ## Modules
/// - `cli`: Command-line interface (main.rs logic)

pub mod cli;
