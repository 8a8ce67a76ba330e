//! Component logging.
//!
//! Records are written through the `log` facade with the component name as target,
//! so `RUST_LOG=broker=debug` enables debug records of a single component.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::event::EventData;

/// Colors the level label when logs go to a terminal.
pub fn level_label(label: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        label.color(color)
    } else {
        label.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_record {
    ($level:ident, $label:literal, $color:ident, $ctx:expr, $($arg:tt)+) => {
        log::$level!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::level_label($label, $crate::colored::Color::$color),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_record!(error, "ERROR", Red, $ctx, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_record!(warn, " WARN", Yellow, $ctx, $($arg)+) };
}

/// Logs a message of a component at the info level.
///
/// Takes the component context followed by `format!`-style arguments:
/// `log_info!(self.ctx, "created {} VMs", count)`.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_record!(info, " INFO", Green, $ctx, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_record!(debug, "DEBUG", Blue, $ctx, $($arg)+) };
}

#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_record!(trace, "TRACE", Cyan, $ctx, $($arg)+) };
}

pub(crate) fn event_json(src: &str, data: &dyn EventData) -> serde_json::Value {
    json!({"type": type_name(&data).unwrap_or("?"), "data": data, "src": src})
}

/// Reports a payload that no [`cast!`](crate::cast!) arm accepted.
pub fn log_unhandled_event(time: f64, src: Id, dst: Id, data: &dyn EventData) {
    log::error!(
        target: "simulation",
        "[{:.3} {} simulation] unhandled event for #{}: {}",
        time,
        level_label("ERROR", Color::Red),
        dst,
        event_json(&format!("#{}", src), data)
    );
}
