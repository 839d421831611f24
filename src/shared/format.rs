use chrono::{DateTime, Utc};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with 1024-based units and at most two decimals,
/// e.g. `1536` -> `"1.5 KB"`, `0` -> `"0 Bytes"`.
pub fn format_file_size(bytes: i64) -> String {
    if bytes <= 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut divisor = 1f64;
    while unit + 1 < SIZE_UNITS.len() && bytes as f64 >= divisor * 1024.0 {
        divisor *= 1024.0;
        unit += 1;
    }

    let value = (bytes as f64 / divisor * 100.0).round() / 100.0;
    format!("{} {}", value, SIZE_UNITS[unit])
}

/// Human-readable upload timestamp, e.g. `3/14/2025, 9:05:07 AM`
pub fn format_upload_date(at: DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
