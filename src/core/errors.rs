use super::entities::OrderState;
use super::events::EventKind;
use super::execution::config::ConfigError;
use super::sampling::SamplingError;
use super::scheduling::oracle::OracleError;
use super::types::{EventId, OrderId};

/// Fatal conditions of a simulation run.
///
/// Any of these aborts the replication that raised it. A rejected due-date
/// quote is not an error: it is an expected branch of the quoting protocol.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Arrival and cancellation times are fixed when the order is created.
    #[error("{kind} event {event} has a fixed occurrence time and cannot be moved")]
    FixedTimeEvent { event: EventId, kind: EventKind },

    /// The event is neither ordered in the heap nor held in the pending buffer.
    #[error("{kind} event {event} is not present in the event queue")]
    UnknownEvent { event: EventId, kind: EventKind },

    #[error("event {0} was never issued by this queue")]
    ForeignEvent(EventId),

    /// The start event names a different order than the head of the confirmed sequence.
    #[error("start event for {started} but the confirmed sequence expected {expected:?}")]
    SequenceDesync {
        started: OrderId,
        expected: Option<OrderId>,
    },

    #[error("{0} is waiting but missing from the job queue")]
    NotQueued(OrderId),

    /// Two orders tried to occupy the machine at once.
    #[error("machine is busy with {busy_with}, cannot start {requested}")]
    MachineOccupied { busy_with: OrderId, requested: OrderId },

    /// A finish event fired for an order the machine is not processing.
    #[error("finish event for {order} but the machine is processing {in_process:?}")]
    NotInProcess {
        order: OrderId,
        in_process: Option<OrderId>,
    },

    /// An order lifecycle operation was applied in the wrong state.
    #[error("{order} cannot {action} while {state:?}")]
    InvalidTransition {
        order: OrderId,
        state: OrderState,
        action: &'static str,
    },

    /// Accepted due dates are never re-quoted.
    #[error("{order} already holds due date {due_date}")]
    DueDateAlreadySet { order: OrderId, due_date: f64 },

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("sequencing oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("variate sampling failed: {0}")]
    Sampling(#[from] SamplingError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type SimResult<T> = Result<T, SimulationError>;
