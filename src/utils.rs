/// Utility functions for timestamps and formatting
use time::macros::format_description;
use time::OffsetDateTime;

/// Format a timestamp for the log file's datetime column
///
/// Converts an OffsetDateTime to YYYY:MM:DD:HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[year]:[month]:[day]:[hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Format a timestamp for embedding in a file name (no colons)
pub fn format_file_stamp(dt: &OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    dt.format(&format)
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

/// Milliseconds since the Unix epoch, as stored in the timestamp channel
pub fn unix_millis(dt: &OffsetDateTime) -> f64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as f64
}
