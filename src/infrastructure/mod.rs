/// Infrastructure Layer - Technical Implementations
///
/// Everything that touches the outside world on behalf of the engine.
///
/// ## Modules
/// - `persistence`: trade/snapshot gateway and its in-memory implementation
/// - `observability`: Prometheus exporter and health endpoints

pub mod observability;
pub mod persistence;

// Re-export key types
pub use observability::{HealthChecker, ObservabilityServer};
pub use persistence::{InMemoryGateway, PersistenceError, PersistenceGateway};
