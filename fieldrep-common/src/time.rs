//! Timestamp utilities
//!
//! Stored documents carry timestamps in several shapes depending on which
//! client wrote them. [`Timestamp::from_value`] accepts all of them and
//! normalises to UTC milliseconds since the epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Milliseconds since the Unix epoch (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The epoch; effective timestamp of a record that carries none
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// The next representable millisecond, `None` at the end of the range
    pub fn successor(self) -> Option<Self> {
        self.0.checked_add(1).map(Timestamp)
    }

    /// Parse a stored timestamp value
    ///
    /// Accepted shapes:
    /// - integer or floating milliseconds
    /// - RFC 3339 strings (Firestore `timestampValue`, ISO exports)
    /// - numeric strings holding milliseconds
    /// - `{seconds, nanoseconds}` / `{_seconds, _nanoseconds}` objects
    ///
    /// Returns `None` for anything else, including `null` and values out of
    /// the millisecond range.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .map(Timestamp),
            Value::String(s) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(Timestamp(dt.with_timezone(&Utc).timestamp_millis()));
                }
                s.trim().parse::<i64>().ok().map(Timestamp)
            }
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(json_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(json_i64)
                    .unwrap_or(0);
                seconds
                    .checked_mul(1000)
                    .and_then(|ms| ms.checked_add(nanos / 1_000_000))
                    .map(Timestamp)
            }
            _ => None,
        }
    }

    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as a [`Timestamp`]
pub fn now_timestamp() -> Timestamp {
    Timestamp(now().timestamp_millis())
}
