//! Config utils.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::core::error::ConfigError;

/// Parses config value string, which consists of two parts - name and options.
/// Example: `CompletelyFair[latency=2]` parts are name `CompletelyFair` and options string `latency=2`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.trim().split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.trim_end_matches(']').to_string())),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    options_str
        .split(',')
        .filter_map(|option_str| option_str.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Returns parsed value of the option or `default` if the option is absent.
pub fn parse_option_or<T>(options: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match options.get(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, format!("{} ({})", value, e))),
        None => Ok(default),
    }
}
