use crate::core::types::{EventId, OrderId};

/// The four things that can happen to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Arrival,
    Cancellation,
    Start,
    Finish,
}

impl EventKind {
    /// Arrival and cancellation times are decided when the order is generated
    /// and never move afterwards.
    pub fn is_fixed_time(&self) -> bool {
        matches!(self, EventKind::Arrival | EventKind::Cancellation)
    }

    /// Rank among events sharing a timestamp: a finishing job frees the
    /// machine before any start logic for the same instant runs.
    pub(crate) fn tie_rank(&self) -> u8 {
        match self {
            EventKind::Finish => 0,
            EventKind::Start => 1,
            EventKind::Arrival | EventKind::Cancellation => 2,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Arrival => "arrival",
            EventKind::Cancellation => "cancellation",
            EventKind::Start => "start",
            EventKind::Finish => "finish",
        };
        write!(f, "{}", name)
    }
}

/// An event handle owned by its order.
///
/// The event queue only keeps the ordering key (time and rank) under the
/// same id; the handle itself lives with the order that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub order: OrderId,
}

impl Event {
    pub fn is_fixed_time(&self) -> bool {
        self.kind.is_fixed_time()
    }
}
