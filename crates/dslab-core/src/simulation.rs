//! Simulation driver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use colored::Color;
use log::Level::Trace;
use log::{debug, error, log_enabled, trace};

use crate::component::Id;
use crate::context::{lookup, SimulationContext};
use crate::event::Event;
use crate::handler::EventHandler;
use crate::log::{event_json, level_label};
use crate::queue::EventQueue;

/// Owns the event queue and the handlers of named components, and delivers events in time order.
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use serde::Serialize;
/// use dslab_core::{cast, Event, EventHandler, Simulation, SimulationContext};
///
/// #[derive(Serialize)]
/// struct Tick {}
///
/// struct Clock {
///     ticks: u32,
///     ctx: SimulationContext,
/// }
///
/// impl EventHandler for Clock {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             Tick {} => {
///                 self.ticks += 1;
///                 if self.ticks < 3 {
///                     self.ctx.emit_self(Tick {}, 10.);
///                 }
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("clock");
/// ctx.emit_self_now(Tick {});
/// let clock = Rc::new(RefCell::new(Clock { ticks: 0, ctx }));
/// sim.add_handler("clock", clock.clone());
/// sim.step_until_no_events();
/// assert_eq!(clock.borrow().ticks, 3);
/// assert_eq!(sim.time(), 20.);
/// ```
pub struct Simulation {
    queue: Rc<RefCell<EventQueue>>,
    names: Rc<RefCell<Vec<String>>>,
    ids: HashMap<String, Id>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(EventQueue::new())),
            names: Rc::new(RefCell::new(Vec::new())),
            ids: HashMap::new(),
            handlers: Vec::new(),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.handlers.len() as Id;
        self.ids.insert(name.to_string(), id);
        self.names.borrow_mut().push(name.to_string());
        self.handlers.push(None);
        id
    }

    /// Creates a context for component `name`. A name seen before keeps its id.
    pub fn create_context<S: AsRef<str>>(&mut self, name: S) -> SimulationContext {
        let name = name.as_ref();
        let id = self.register(name);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] created context: {}",
            self.time(),
            level_label("DEBUG", Color::Blue),
            serde_json::json!({"name": name, "id": id})
        );
        SimulationContext::new(id, name, self.queue.clone(), self.names.clone())
    }

    /// Installs the handler receiving events for component `name` and returns its id.
    pub fn add_handler<S: AsRef<str>>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id {
        let name = name.as_ref();
        let id = self.register(name);
        self.handlers[id as usize] = Some(handler);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] added handler: {}",
            self.time(),
            level_label("DEBUG", Color::Blue),
            serde_json::json!({"name": name, "id": id})
        );
        id
    }

    pub fn lookup_name(&self, id: Id) -> String {
        lookup(&self.names.borrow(), id)
    }

    pub fn time(&self) -> f64 {
        self.queue.borrow().time()
    }

    /// Number of events created so far, delivered and cancelled ones included.
    pub fn event_count(&self) -> u64 {
        self.queue.borrow().created()
    }

    /// Delivers the next event. Returns `false` if there are no pending events.
    pub fn step(&mut self) -> bool {
        // the queue must not stay borrowed while the handler emits new events
        let next = self.queue.borrow_mut().pop();
        let Some(event) = next else {
            return false;
        };
        if log_enabled!(Trace) {
            trace!(
                target: "simulation",
                "[{:.3} {} simulation] {}",
                event.time,
                level_label("EVENT", Color::BrightBlack),
                self.describe(&event)
            );
        }
        match self.handlers.get(event.dst as usize).cloned().flatten() {
            Some(handler) => handler.borrow_mut().on(event),
            None => error!(
                target: "simulation",
                "[{:.3} {} simulation] undelivered event: {}",
                event.time,
                level_label("ERROR", Color::Red),
                self.describe(&event)
            ),
        }
        true
    }

    fn describe(&self, event: &Event) -> serde_json::Value {
        let mut value = event_json(&self.lookup_name(event.src), event.data.as_ref());
        value["dst"] = self.lookup_name(event.dst).into();
        value
    }

    /// Delivers up to `count` events. Returns `true` if there are pending events left.
    pub fn steps(&mut self, count: u64) -> bool {
        for _ in 0..count {
            if !self.step() {
                return false;
            }
        }
        self.queue.borrow_mut().peek_time().is_some()
    }

    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Delivers every event with time not after `time`, then advances the clock to `time`
    /// unless it is already past it. Returns `true` if there are pending events left.
    pub fn step_until_time(&mut self, time: f64) -> bool {
        loop {
            let next = self.queue.borrow_mut().peek_time();
            match next {
                Some(t) if t <= time => {
                    self.step();
                }
                Some(_) => {
                    self.queue.borrow_mut().advance_to(time);
                    return true;
                }
                None => {
                    self.queue.borrow_mut().advance_to(time);
                    return false;
                }
            }
        }
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let end = self.time() + duration;
        self.step_until_time(end)
    }
}
