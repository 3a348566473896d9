//! Server-side timestamps and document ids.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Source of write timestamps for a store.
///
/// Timestamps are strictly increasing for a given clock: if the wall clock
/// has not moved past the previous value, the previous value plus one
/// microsecond is used instead.
#[derive(Debug, Default)]
pub struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    /// Create a new clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next write timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let mut now = truncate_to_micros(Utc::now());
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    /// The next write timestamp in its stored form.
    pub fn now_string(&self) -> String {
        format_timestamp(self.now())
    }
}

fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let micros = dt.timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or(dt)
}

/// Render a timestamp the way stores keep it: RFC 3339, UTC, microseconds.
///
/// The fixed width keeps lexicographic and chronological order identical.
#[must_use]
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Generate a fresh document id.
#[must_use]
pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}
