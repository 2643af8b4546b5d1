use std::time::Duration;

use anyhow::{bail, Result};

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

/// Parse duration strings like "5s", "988.82ms", "2m", "1h", "0ns"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.trim().parse()?;
            if !val.is_finite() || val < 0.0 {
                bail!("Duration must be a non-negative number: {}", s);
            }
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    bail!("Unknown duration format: {}", s)
}

/// Format a duration for display
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0ns".to_string()
    } else if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// Format a long span as at most two coarse units ("2 days, 3 hours").
pub fn format_span(d: Duration) -> String {
    let seconds = d.as_secs();
    if seconds == 0 {
        return "0 seconds".to_string();
    }

    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    let unit = |n: u64, name: &str| format!("{} {}{}", n, name, if n == 1 { "" } else { "s" });

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(unit(days, "day"));
    }
    if hours > 0 {
        parts.push(unit(hours, "hour"));
    }
    // Minutes and seconds only matter for short spans
    if minutes > 0 && days == 0 {
        parts.push(unit(minutes, "minute"));
    }
    if secs > 0 && days == 0 && hours == 0 {
        parts.push(unit(secs, "second"));
    }

    parts.truncate(2);
    parts.join(", ")
}

/// Serde adapter for human-readable durations in configuration.
///
/// Accepts either a string understood by [`parse_duration`] or a bare
/// integer number of seconds (as produced by environment variables).
pub mod human {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Seconds(u64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => super::parse_duration(&s).map_err(de::Error::custom),
            Repr::Seconds(secs) => Ok(Duration::from_secs(secs)),
        }
    }

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        let d = parse_duration("29.992671083s").unwrap();
        assert!((d.as_secs_f64() - 29.992671083).abs() < 0.0001);
    }

    #[test]
    fn test_parse_milliseconds() {
        let d = parse_duration("988.82775ms").unwrap();
        assert!((d.as_secs_f64() - 0.98882775).abs() < 0.0001);
    }

    #[test]
    fn test_parse_minutes_and_hours() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("60").is_err());
    }

    #[test]
    fn test_format_span() {
        assert_eq!(format_span(Duration::ZERO), "0 seconds");
        assert_eq!(format_span(Duration::from_secs(45)), "45 seconds");
        assert_eq!(format_span(Duration::from_secs(125)), "2 minutes, 5 seconds");
        assert_eq!(format_span(Duration::from_secs(3 * 86_400 + 7_300)), "3 days, 2 hours");
        assert_eq!(format_span(Duration::from_secs(86_400)), "1 day");
    }

    #[test]
    fn test_human_accepts_string_and_seconds() {
        #[derive(serde::Deserialize)]
        struct Probe {
            #[serde(with = "human")]
            d: Duration,
        }
        let a: Probe = serde_json::from_str(r#"{"d":"500ms"}"#).unwrap();
        assert_eq!(a.d, Duration::from_millis(500));
        let b: Probe = serde_json::from_str(r#"{"d":7}"#).unwrap();
        assert_eq!(b.d, Duration::from_secs(7));
    }
}
