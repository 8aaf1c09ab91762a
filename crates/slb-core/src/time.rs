//! Timestamp newtype over `chrono::DateTime<Utc>`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC timestamp. Serializes as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// The current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Check whether this timestamp is in the future.
    #[must_use]
    pub fn is_future(&self) -> bool {
        self.0 > Utc::now()
    }

    /// Check whether this timestamp lies before `now - threshold`.
    #[must_use]
    pub fn is_older_than(&self, threshold: Duration, now: Timestamp) -> bool {
        now.0.signed_duration_since(self.0) >= threshold
    }

    /// This timestamp shifted forward by `delta`.
    #[must_use]
    pub fn plus(&self, delta: Duration) -> Self {
        Self(self.0 + delta)
    }

    /// RFC 3339 rendering with seconds precision, used for MAC inputs and
    /// canonical exports where byte stability matters.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    /// Milliseconds since the Unix epoch, used for order-stable store columns.
    #[must_use]
    pub fn epoch_ms(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}
