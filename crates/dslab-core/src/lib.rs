//! Discrete-event simulation core.
//!
//! Components are registered by name in a [`Simulation`], exchange events through their
//! [`SimulationContext`] and receive them in an [`EventHandler`]. Events are delivered in
//! order of time, events with equal time in order of creation.

pub mod component;
pub mod context;
pub mod event;
pub mod handler;
pub mod log;
mod queue;
pub mod simulation;

pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use event::{Event, EventData, EventId};
pub use handler::EventHandler;
pub use simulation::Simulation;
