pub mod dispatching;
pub mod job_queue;
pub mod oracle;

pub use dispatching::DispatchingRule;
pub use job_queue::{JobQueue, MachineOutlook, ProposedSchedule};
pub use oracle::{
    OptimizationConfig, OracleError, OracleJob, SequencingOracle, WeightedTardinessOracle,
};
