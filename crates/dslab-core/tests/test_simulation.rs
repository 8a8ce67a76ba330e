use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use env_logger::Builder;

use serde::Serialize;

use dslab_core::{cast, Event, EventHandler, Id, Simulation, SimulationContext};

#[derive(Clone, Serialize)]
struct Ping {
    seq: u32,
}

#[derive(Clone, Serialize)]
struct Unknown {}

struct Recorder {
    received: Vec<(f64, u32, Id)>,
    ctx: SimulationContext,
}

impl EventHandler for Recorder {
    fn on(&mut self, event: Event) {
        let src = event.src;
        cast!(match event.data {
            Ping { seq } => {
                self.received.push((self.ctx.time(), seq, src));
            }
        })
    }
}

fn init_logger() {
    let _ = Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

fn recorder(sim: &mut Simulation, name: &str) -> (Rc<RefCell<Recorder>>, Id) {
    init_logger();
    let ctx = sim.create_context(name);
    let recorder = Rc::new(RefCell::new(Recorder {
        received: Vec::new(),
        ctx,
    }));
    let id = sim.add_handler(name, recorder.clone());
    (recorder, id)
}

#[test]
// Events are delivered by time, events with equal time in order of creation.
fn test_event_order() {
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim, "recorder");
    let client = sim.create_context("client");
    client.emit(Ping { seq: 0 }, id, 2.);
    client.emit(Ping { seq: 1 }, id, 1.);
    client.emit(Ping { seq: 2 }, id, 1.);
    client.emit_now(Ping { seq: 3 }, id);
    sim.step_until_no_events();

    let seqs: Vec<u32> = recorder.borrow().received.iter().map(|r| r.1).collect();
    assert_eq!(seqs, vec![3, 1, 2, 0]);
    assert_eq!(recorder.borrow().received[0].2, client.id());
    assert_eq!(sim.time(), 2.);
    assert_eq!(sim.event_count(), 4);
}

#[test]
// Cancelled events are never delivered but still counted as created.
fn test_cancel_event() {
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim, "recorder");
    let client = sim.create_context("client");
    client.emit(Ping { seq: 0 }, id, 1.);
    let canceled = client.emit(Ping { seq: 1 }, id, 2.);
    client.emit(Ping { seq: 2 }, id, 3.);
    client.cancel_event(canceled);
    sim.step_until_no_events();

    let seqs: Vec<u32> = recorder.borrow().received.iter().map(|r| r.1).collect();
    assert_eq!(seqs, vec![0, 2]);
    assert_eq!(sim.event_count(), 3);
}

#[test]
// Stepping until time processes events at exactly that time.
fn test_step_until_time() {
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim, "recorder");
    let client = sim.create_context("client");
    for seq in 0..5 {
        client.emit(Ping { seq }, id, seq as f64);
    }
    assert!(sim.step_until_time(2.));
    assert_eq!(recorder.borrow().received.len(), 3);
    assert!(sim.step_for_duration(1.));
    assert_eq!(recorder.borrow().received.len(), 4);
    assert!(!sim.step_until_time(10.));
    assert_eq!(recorder.borrow().received.len(), 5);
    assert!(!sim.step());
}

#[test]
// Unknown payloads and events for components without handler are dropped without panics.
fn test_unhandled_events() {
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim, "recorder");
    let client = sim.create_context("client");
    client.emit(Unknown {}, id, 1.);
    client.emit_self(Ping { seq: 0 }, 2.);
    client.emit(Ping { seq: 1 }, id, 3.);
    sim.step_until_no_events();
    assert_eq!(recorder.borrow().received.len(), 1);
    assert_eq!(recorder.borrow().received[0].1, 1);
    assert_eq!(sim.lookup_name(id), "recorder");
    assert_eq!(client.lookup_name(client.id()), "client");
    assert_eq!(sim.lookup_name(7), "#7");
}

#[test]
// A context created again for a known name keeps the component id.
fn test_context_reuses_id() {
    let mut sim = Simulation::new();
    let first = sim.create_context("comp");
    let other = sim.create_context("other");
    let second = sim.create_context("comp");
    assert_eq!(first.id(), second.id());
    assert_ne!(first.id(), other.id());
    let (_, id) = recorder(&mut sim, "comp");
    assert_eq!(id, first.id());
}

#[test]
// Stepping to a time without events still advances the clock.
fn test_clock_advances_without_events() {
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim, "recorder");
    assert!(!sim.step_until_time(5.));
    assert_eq!(sim.time(), 5.);
    let client = sim.create_context("client");
    client.emit(Ping { seq: 0 }, id, 1.);
    assert!(!sim.steps(10));
    assert_eq!(recorder.borrow().received[0].0, 6.);
}
