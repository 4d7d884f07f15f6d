use serde::{Deserialize, Serialize};

/// Simulated time. An abstract, monotonically advancing scalar.
pub type SimTime = f64;

/// Stable identifier of an order within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub(crate) usize);

impl OrderId {
    /// Create an order id from its index in the run's order book
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order#{}", self.0)
    }
}

/// Identifier of an event slot in the event queue arena.
///
/// Ids are handed out in insertion order, which makes them usable as the
/// final tie-break between events that share both time and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) usize);

impl EventId {
    /// Get the raw arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Index into the configured product profiles
pub type ProductType = usize;

/// Index into the configured customer profiles
pub type CustomerType = usize;
