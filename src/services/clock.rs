/// Logical clock for local timestamps and normalization of remote ones
use chrono::{DateTime, NaiveDateTime};
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Per-client clock: follows wall time but never repeats or goes backwards
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicI64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp, strictly greater than every previous one
    pub fn tick(&self) -> i64 {
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let next = now_millis().max(last + 1);
            match self
                .last
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Advance past a timestamp seen elsewhere (stored rows, server rows)
    pub fn observe(&self, ts: i64) {
        self.last.fetch_max(ts, Ordering::SeqCst);
    }

    pub fn last(&self) -> i64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Converts a remote timestamp to epoch milliseconds.
///
/// Accepts integers (already ms), numeric strings, RFC 3339 strings and
/// `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC). Anything else, including
/// negative values, becomes 0 so it never beats a valid local timestamp.
pub fn normalize_timestamp(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                ms.max(0)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f > 0.0 && f < i64::MAX as f64 => f as i64,
                    _ => 0,
                }
            }
        }
        serde_json::Value::String(s) => parse_timestamp_str(s.trim()).unwrap_or(0).max(0),
        _ => 0,
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    if let Ok(ms) = s.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
