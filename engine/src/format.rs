//! Human-readable byte counts, durations, and speeds.

use std::time::Duration;

use crate::model::TransferStats;

const UNIT: u64 = 1024;
const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Format a byte count with binary units, e.g. `1023 B`, `1.0 KiB`, `1.5 MiB`.
pub fn human_bytes(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}iB", bytes as f64 / div as f64, PREFIXES[exp])
}

/// Format as `HH:MM:SS`, rounded to the nearest second.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = (elapsed.as_millis() + 500) / 1000;
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Average speed such as `1.5 MiB/s`.
pub fn format_speed(stats: &TransferStats) -> String {
    format!("{}/s", human_bytes(stats.average_speed() as u64))
}
