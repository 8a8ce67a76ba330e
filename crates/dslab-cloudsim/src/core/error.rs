//! Configuration errors.

use thiserror::Error;

/// Errors reported when a simulation is configured inconsistently.
///
/// These are the only failures surfaced to the caller as `Err`. Resource contention and dispatch
/// postponement are resolved inside the simulation and observed through listeners and broker lists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("can't parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cloudlet scheduler is already bound to VM {bound}, can't bind it to VM {requested}")]
    SchedulerAlreadyBound { bound: u32, requested: u32 },

    #[error("VM group {0} must contain at least one VM")]
    EmptyVmGroup(u32),

    #[error("{name} must not be negative, got {value}")]
    NegativeValue { name: String, value: f64 },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("unknown {kind}: {name}")]
    UnknownPolicy { kind: &'static str, name: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn negative(name: &str, value: f64) -> Self {
        Self::NegativeValue {
            name: name.to_string(),
            value,
        }
    }
}
