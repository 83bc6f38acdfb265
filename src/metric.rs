use chrono::{DateTime, Utc};

/// Seconds in one day, the unit of every duration metric.
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// A derived metric record, persisted as one row of the metrics table.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub time: DateTime<Utc>,
    pub name: String,
    pub segment: String,
    pub value: f64,
    pub comment: String,
}

impl Metric {
    /// Creates a metric with an empty comment.
    pub fn new(
        time: DateTime<Utc>,
        name: impl Into<String>,
        segment: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            time,
            name: name.into(),
            segment: segment.into(),
            value,
            comment: String::new(),
        }
    }

    /// Attaches a free-form comment (the issue key for per-issue metrics).
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Whole days between `start` and `end`, truncated toward zero.
pub fn whole_days(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_days() as f64
}

/// Fractional days between `start` and `end`.
pub fn fractional_days(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / (SECONDS_PER_DAY as f64 * 1_000_000.0),
        None => delta.num_seconds() as f64 / SECONDS_PER_DAY as f64,
    }
}

/// Prefixes a segment label with the run-wide segment prefix, if any.
pub fn prefixed_segment(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    }
}
