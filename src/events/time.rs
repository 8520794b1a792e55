//! Timestamp handling for feed payloads

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Epoch values above this are treated as milliseconds rather than seconds.
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// Point in time reported by the control plane.
///
/// Accepts RFC 3339 strings, ISO-8601 strings with a compact `+hhmm` offset, naive ISO-8601 strings (read as UTC) and numeric
/// Unix epoch values. Always serializes as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    /// Build from Unix epoch seconds (fractional part kept to the microsecond).
    pub fn from_unix_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let micros = (seconds * 1_000_000.0).round() as i64;
        let secs = micros.div_euclid(1_000_000);
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
        Utc.timestamp_opt(secs, nanos).single().map(Self)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parse the textual forms emitted by the control plane.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
            if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
                return Ok(Self(parsed.with_timezone(&Utc)));
            }
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Self(Utc.from_utc_datetime(&naive)));
            }
        }
        Err(format!("unrecognized timestamp: {raw}"))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Epoch(value) => {
                let seconds = if value.abs() > MILLIS_THRESHOLD {
                    value / 1000.0
                } else {
                    value
                };
                Timestamp::from_unix_seconds(seconds)
                    .ok_or_else(|| serde::de::Error::custom(format!("epoch out of range: {value}")))
            }
            RawTimestamp::Text(text) => Timestamp::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}
