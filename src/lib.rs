pub mod core;

// Re-export commonly used types
pub use crate::core::due_date::{DueDatePolicy, DueDatePolicyConfig};
pub use crate::core::entities::{CustomerProfile, Order, OrderSpec, OrderState, ProductProfile};
pub use crate::core::errors::{SimResult, SimulationError};
pub use crate::core::events::{Event, EventKind, EventQueue};
pub use crate::core::execution::{
    ConcurrencyMode, Environment, MachineState, ReplicationRunner, SimulationConfig,
    SimulationObserver,
};
pub use crate::core::report::{OrderRecord, RunReport, RunStatistics};
pub use crate::core::sampling::{Distribution, VariateMode, VariateSource};
pub use crate::core::scheduling::{DispatchingRule, OptimizationConfig, SequencingOracle};
pub use crate::core::types::{EventId, OrderId, SimTime};
