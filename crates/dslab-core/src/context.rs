//! Component view of the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::queue::EventQueue;

/// Handle through which a component reads the clock and schedules events.
pub struct SimulationContext {
    id: Id,
    name: String,
    queue: Rc<RefCell<EventQueue>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, queue: Rc<RefCell<EventQueue>>, names: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            id,
            name: name.to_string(),
            queue,
            names,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.queue.borrow().time()
    }

    /// Schedules event for component `dst` after `delay`.
    pub fn emit<T: EventData>(&self, data: T, dst: Id, delay: f64) -> EventId {
        self.queue.borrow_mut().push(data, self.id, dst, delay)
    }

    pub fn emit_now<T: EventData>(&self, data: T, dst: Id) -> EventId {
        self.emit(data, dst, 0.)
    }

    pub fn emit_self<T: EventData>(&self, data: T, delay: f64) -> EventId {
        self.emit(data, self.id, delay)
    }

    pub fn emit_self_now<T: EventData>(&self, data: T) -> EventId {
        self.emit(data, self.id, 0.)
    }

    /// Drops a pending event. Does nothing if the event was already delivered.
    pub fn cancel_event(&self, id: EventId) {
        self.queue.borrow_mut().cancel(id);
    }

    /// Name of the component with given id, or `#id` for an unknown one.
    pub fn lookup_name(&self, id: Id) -> String {
        lookup(&self.names.borrow(), id)
    }
}

pub(crate) fn lookup(names: &[String], id: Id) -> String {
    names.get(id as usize).cloned().unwrap_or_else(|| format!("#{}", id))
}
