//! CLI command implementations.

pub mod backup;
pub mod config;
pub mod status;
pub mod sync;

/// Result type shared by all commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Formats Unix milliseconds as local time; 0 means never.
pub fn format_time(ms: u64) -> Option<String> {
    use chrono::{Local, TimeZone};

    if ms == 0 {
        return None;
    }
    let ms = i64::try_from(ms).ok()?;
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}
