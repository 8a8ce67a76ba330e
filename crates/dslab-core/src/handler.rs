//! Event handling.

use crate::event::Event;

/// Component which consumes events.
pub trait EventHandler {
    fn on(&mut self, event: Event);
}

/// Dispatches an event by its payload type.
///
/// Each arm destructures one payload type. A payload matching no arm is logged as unhandled.
///
/// ```rust
/// use serde::Serialize;
/// use dslab_core::{cast, Event, EventHandler};
///
/// #[derive(Serialize)]
/// struct Resize {
///     pes: u32,
/// }
///
/// struct Vm {
///     pes: u32,
/// }
///
/// impl EventHandler for Vm {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             Resize { pes } => {
///                 self.pes = pes;
///             }
///         })
///     }
/// }
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($field:tt)* } => { $($body:tt)* } )+ } ) => {
        'cast: {
            let $crate::event::Event { time: __time, src: __src, dst: __dst, data: __data, .. } = $event;
            $(
                let __data = match __data.downcast::<$type>() {
                    Ok(__payload) => {
                        let $type { $($field)* } = *__payload;
                        { $($body)* }
                        break 'cast;
                    }
                    Err(__other) => __other,
                };
            )+
            $crate::log::log_unhandled_event(__time, __src, __dst, __data.as_ref());
        }
    };
}
