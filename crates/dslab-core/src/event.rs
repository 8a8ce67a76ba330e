//! Simulation events.

use downcast_rs::{impl_downcast, Downcast};
use serde::Serialize;

use crate::component::Id;

/// Event identifier. Identifiers grow with event creation and break ties between events with equal time.
pub type EventId = u64;

/// Payload of an event. Implemented for every `Serialize + 'static` type.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl<T: Serialize + 'static> EventData for T {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

/// Event delivered to the handler of component `dst`.
pub struct Event {
    pub id: EventId,
    /// Delivery time.
    pub time: f64,
    pub src: Id,
    pub dst: Id,
    pub data: Box<dyn EventData>,
}
