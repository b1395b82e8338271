use std::time::Duration;

use chrono::Utc;

use crate::error::{GhmonError, Result};

/// Milliseconds since the Unix epoch, taken from the wall clock.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| GhmonError::Parse(format!("invalid duration {input}: {e}")))
}

/// Accepts a bare number of seconds or a humantime string such as `10m`.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    parse_duration_str(trimmed)
}
