pub mod event;
pub mod event_queue;

pub use event::{Event, EventKind};
pub use event_queue::EventQueue;
