use crate::core::events::Event;
use crate::core::types::{OrderId, SimTime};

/// Whether the machine is processing an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineState {
    #[default]
    Idle,
    Busy(OrderId),
}

impl MachineState {
    pub fn in_process(&self) -> Option<OrderId> {
        match self {
            MachineState::Idle => None,
            MachineState::Busy(id) => Some(*id),
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, MachineState::Busy(_))
    }
}

/// Observer trait for simulation events
pub trait SimulationObserver {
    /// Called when the simulation clock advances
    fn on_time_advance(&mut self, old_time: SimTime, new_time: SimTime);

    /// Called after an event has been handled
    fn on_event_processed(&mut self, time: SimTime, event: &Event, machine: MachineState);
}
