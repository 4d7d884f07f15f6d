use super::event::{Event, EventKind};
use crate::core::errors::{SimResult, SimulationError};
use crate::core::types::{EventId, OrderId, SimTime};
use std::cmp::Ordering;

/// Where an event currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    /// Position inside the binary heap
    Heap(usize),
    /// Time not decided yet
    Pending,
    /// Popped or removed
    Detached,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    kind: EventKind,
    order: OrderId,
    time: Option<SimTime>,
    location: Location,
}

/// Time-ordered event queue with mutable keys.
///
/// Events live in an arena addressed by [`EventId`]; the heap stores ids
/// only and every slot remembers its heap position, so moving or removing
/// an event is O(log n). Events whose time is still unknown wait in a
/// pending state until [`EventQueue::update_time`] promotes them.
#[derive(Debug, Default)]
pub struct EventQueue {
    slots: Vec<Slot>,
    heap: Vec<EventId>,
    pending: usize,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new event and hand back its handle.
    ///
    /// An event without a time is held pending and is not eligible for
    /// [`EventQueue::pop_min`] until its time is set.
    pub fn insert(&mut self, kind: EventKind, order: OrderId, time: Option<SimTime>) -> Event {
        let id = EventId(self.slots.len());
        self.slots.push(Slot {
            kind,
            order,
            time,
            location: Location::Pending,
        });

        match time {
            Some(_) => self.push_heap(id),
            None => self.pending += 1,
        }

        Event { id, kind, order }
    }

    /// Move an event to a new time, promoting it out of the pending buffer if needed
    pub fn update_time(&mut self, id: EventId, new_time: SimTime) -> SimResult<()> {
        let Slot {
            kind,
            time,
            location,
            ..
        } = *self.slot(id)?;
        if kind.is_fixed_time() {
            return Err(SimulationError::FixedTimeEvent { event: id, kind });
        }

        match location {
            Location::Detached => Err(SimulationError::UnknownEvent { event: id, kind }),
            Location::Pending => {
                self.pending -= 1;
                self.slots[id.0].time = Some(new_time);
                self.push_heap(id);
                Ok(())
            }
            Location::Heap(position) => {
                if time == Some(new_time) {
                    return Ok(());
                }
                self.slots[id.0].time = Some(new_time);
                let position = self.sift_up(position);
                self.sift_down(position);
                Ok(())
            }
        }
    }

    /// Remove an event from the queue.
    ///
    /// Start and finish events may already be gone after a cancellation, so
    /// removing them again is a no-op. For arrival and cancellation events a
    /// missing entry means the queue and the orders disagree.
    pub fn remove(&mut self, id: EventId) -> SimResult<()> {
        let Slot { kind, location, .. } = *self.slot(id)?;
        match location {
            Location::Detached => match kind {
                EventKind::Start | EventKind::Finish => Ok(()),
                kind => Err(SimulationError::UnknownEvent { event: id, kind }),
            },
            Location::Pending => {
                self.pending -= 1;
                self.slots[id.0].location = Location::Detached;
                Ok(())
            }
            Location::Heap(position) => {
                self.remove_at(position);
                Ok(())
            }
        }
    }

    /// Pop the most imminent event together with its time
    pub fn pop_min(&mut self) -> Option<(Event, SimTime)> {
        if self.heap.is_empty() {
            return None;
        }
        let id = self.remove_at(0);
        let slot = &self.slots[id.0];
        let time = slot.time?;
        Some((
            Event {
                id,
                kind: slot.kind,
                order: slot.order,
            },
            time,
        ))
    }

    /// True when no event is ready to pop. Pending events do not count.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of events ordered in the heap
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Number of events still waiting for a time
    pub fn pending_len(&self) -> usize {
        self.pending
    }

    /// Time of the next event without removing it
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.first().and_then(|id| self.slots[id.0].time)
    }

    /// Scheduled time of a live event, `None` if pending or already gone
    pub fn time_of(&self, id: EventId) -> Option<SimTime> {
        self.slots.get(id.0).and_then(|slot| match slot.location {
            Location::Heap(_) => slot.time,
            _ => None,
        })
    }

    /// Whether the event is still ordered or pending
    pub fn contains(&self, id: EventId) -> bool {
        self.slots
            .get(id.0)
            .map(|slot| slot.location != Location::Detached)
            .unwrap_or(false)
    }

    fn slot(&self, id: EventId) -> SimResult<&Slot> {
        self.slots.get(id.0).ok_or(SimulationError::ForeignEvent(id))
    }

    fn push_heap(&mut self, id: EventId) {
        let position = self.heap.len();
        self.heap.push(id);
        self.slots[id.0].location = Location::Heap(position);
        self.sift_up(position);
    }

    fn remove_at(&mut self, position: usize) -> EventId {
        let last = self.heap.len() - 1;
        self.swap(position, last);
        let removed = self.heap.pop().unwrap_or(EventId(usize::MAX));
        if let Some(slot) = self.slots.get_mut(removed.0) {
            slot.location = Location::Detached;
        }
        if position < self.heap.len() {
            let position = self.sift_up(position);
            self.sift_down(position);
        }
        removed
    }

    /// Ordering key: time, then kind rank, then insertion order
    fn compare(&self, a: EventId, b: EventId) -> Ordering {
        let left = &self.slots[a.0];
        let right = &self.slots[b.0];
        let left_time = left.time.unwrap_or(SimTime::INFINITY);
        let right_time = right.time.unwrap_or(SimTime::INFINITY);
        left_time
            .total_cmp(&right_time)
            .then_with(|| left.kind.tie_rank().cmp(&right.kind.tie_rank()))
            .then_with(|| a.cmp(&b))
    }

    fn sift_up(&mut self, mut position: usize) -> usize {
        while position > 0 {
            let parent = (position - 1) / 2;
            if self.compare(self.heap[position], self.heap[parent]) == Ordering::Less {
                self.swap(position, parent);
                position = parent;
            } else {
                break;
            }
        }
        position
    }

    fn sift_down(&mut self, mut position: usize) -> usize {
        let len = self.heap.len();
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut smallest = position;
            if left < len && self.compare(self.heap[left], self.heap[smallest]) == Ordering::Less {
                smallest = left;
            }
            if right < len && self.compare(self.heap[right], self.heap[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == position {
                return position;
            }
            self.swap(position, smallest);
            position = smallest;
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        let (a, b) = (self.heap[i], self.heap[j]);
        self.slots[a.0].location = Location::Heap(i);
        self.slots[b.0].location = Location::Heap(j);
    }
}
