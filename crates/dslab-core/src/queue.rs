use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use crate::component::Id;
use crate::event::{Event, EventData, EventId};

/// Position of a pending event in the queue.
#[derive(Clone, Copy)]
struct Slot {
    time: f64,
    id: EventId,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time).then(self.id.cmp(&other.id))
    }
}

/// Virtual clock and pending events shared by the simulation and component contexts.
///
/// Payloads are kept apart from the heap, so cancelling an event drops its payload at once
/// and the stale slot is skipped when it reaches the top of the heap.
pub(crate) struct EventQueue {
    clock: f64,
    slots: BinaryHeap<Reverse<Slot>>,
    pending: HashMap<EventId, Event>,
    created: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            clock: 0.,
            slots: BinaryHeap::new(),
            pending: HashMap::new(),
            created: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn push<T: EventData>(&mut self, data: T, src: Id, dst: Id, delay: f64) -> EventId {
        assert!(
            delay >= 0.,
            "event from {} to {} has negative delay {}",
            src,
            dst,
            delay
        );
        let id = self.created;
        self.created += 1;
        let time = self.clock + delay;
        self.slots.push(Reverse(Slot { time, id }));
        self.pending.insert(
            id,
            Event {
                id,
                time,
                src,
                dst,
                data: Box::new(data),
            },
        );
        id
    }

    /// Moves the clock forward to `time`. Never moves it back.
    pub fn advance_to(&mut self, time: f64) {
        self.clock = self.clock.max(time);
    }

    pub fn cancel(&mut self, id: EventId) {
        self.pending.remove(&id);
    }

    /// Time of the next pending event.
    pub fn peek_time(&mut self) -> Option<f64> {
        while let Some(Reverse(slot)) = self.slots.peek() {
            if self.pending.contains_key(&slot.id) {
                return Some(slot.time);
            }
            self.slots.pop();
        }
        None
    }

    /// Removes the next pending event and advances the clock to its time.
    pub fn pop(&mut self) -> Option<Event> {
        while let Some(Reverse(slot)) = self.slots.pop() {
            if let Some(event) = self.pending.remove(&slot.id) {
                self.clock = event.time;
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_by_time_then_creation() {
        let mut queue = EventQueue::new();
        let late = queue.push((), 0, 0, 2.);
        let first = queue.push((), 0, 0, 1.);
        let second = queue.push((), 0, 0, 1.);
        queue.cancel(second);
        assert_eq!(queue.peek_time(), Some(1.));
        assert_eq!(queue.pop().map(|e| e.id), Some(first));
        assert_eq!(queue.pop().map(|e| e.id), Some(late));
        assert_eq!(queue.time(), 2.);
        assert!(queue.pop().is_none());
        assert_eq!(queue.created(), 3);
    }
}
