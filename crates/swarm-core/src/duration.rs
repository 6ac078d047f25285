// SPDX-License-Identifier: MIT

//! Parsing and formatting for the free-form duration strings used in control
//! commands (`pause`'s `duration`, rate-limit evidence's `retry_after`) and
//! the heartbeat's `idle_for` field.

use std::time::Duration;

/// Parse a duration string like `"30s"`, `"5m"`, `"1h"`, or a bare integer
/// (seconds). Returns `None` on malformed input rather than erroring, since
/// callers treat an unparsable duration as "no evidence" / "use default".
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (number_part, unit) = match input.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&input[..input.len() - 1], c.to_ascii_lowercase()),
        _ => (input, 's'),
    };

    let value: f64 = number_part.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }

    let seconds = match unit {
        's' => value,
        'm' => value * 60.0,
        'h' => value * 3_600.0,
        'd' => value * 86_400.0,
        _ => return None,
    };

    Some(Duration::from_secs_f64(seconds))
}

/// Format a duration as a short human string, e.g. `"2h3m"`, `"45s"`, `"0s"`.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_minutes_hours() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn bare_integer_means_seconds() {
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("-5s"), None);
    }

    #[test]
    fn formats_round_trip_for_common_values() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(3_723)), "1h2m3s");
    }
}
