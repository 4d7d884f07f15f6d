pub mod config;
pub mod environment;
pub mod observer;
pub mod replication;

// Re-export commonly used types
pub use config::{ConcurrencyMode, ConfigError, SimulationConfig};
pub use environment::Environment;
pub use observer::{MachineState, SimulationObserver};
pub use replication::{OracleFactory, ReplicationResult, ReplicationRunner};
