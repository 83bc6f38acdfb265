use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::info;

use crate::event::{Event, Stage};
use crate::generator::GeneratorError;
use crate::metric::{prefixed_segment, Metric};

/// Age bucket of an issue in a daily snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBucket {
    LessThanDay,
    LessThanWeek,
    LessThanMonth,
    Older,
}

impl AgeBucket {
    /// Buckets an age using the ascending thresholds 24h, 7d and 730h.
    pub fn for_age(age: Duration) -> Self {
        if age < Duration::hours(24) {
            Self::LessThanDay
        } else if age < Duration::days(7) {
            Self::LessThanWeek
        } else if age < Duration::hours(730) {
            Self::LessThanMonth
        } else {
            Self::Older
        }
    }

    /// Human-readable label, carried in the metric comment.
    pub const fn label(self) -> &'static str {
        match self {
            Self::LessThanDay => "<1 day",
            Self::LessThanWeek => "<1 week",
            Self::LessThanMonth => "<1 month",
            Self::Older => "else",
        }
    }

    /// Short form used in metric names.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::LessThanDay => "1d",
            Self::LessThanWeek => "1w",
            Self::LessThanMonth => "1m",
            Self::Older => "more",
        }
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    entered_at: DateTime<Utc>,
    segment: String,
}

/// Emits one daily snapshot of backlog and wip issue ages.
///
/// Events must arrive in ascending time. Crossing into a later UTC day emits
/// a snapshot for every day from the cursor up to the event's day; an event
/// dated before the cursor day is an ordering error.
#[derive(Debug)]
pub struct IssuesAge {
    segment_prefix: String,
    current_day: Option<NaiveDate>,
    backlog: HashMap<String, Tracked>,
    wip: HashMap<String, Tracked>,
    snapshots: u64,
}

impl IssuesAge {
    pub fn new(segment_prefix: String) -> Self {
        Self {
            segment_prefix,
            current_day: None,
            backlog: HashMap::new(),
            wip: HashMap::new(),
            snapshots: 0,
        }
    }

    pub fn process(&mut self, event: &Event, out: &mut Vec<Metric>) -> Result<(), GeneratorError> {
        let day = event.time.date_naive();

        match self.current_day {
            None => self.current_day = Some(day),
            Some(current) if day < current => {
                return Err(GeneratorError::OutOfOrder {
                    issue_key: event.issue_key.clone(),
                    event_day: day,
                    current_day: current,
                });
            }
            Some(current) if day > current => {
                for snapshot_day in current.iter_days().take_while(|d| *d < day) {
                    self.snapshot(snapshot_day, out);
                }
                self.current_day = Some(day);
            }
            Some(_) => {}
        }

        self.apply(event);
        Ok(())
    }

    fn apply(&mut self, event: &Event) {
        self.backlog.remove(&event.issue_key);
        self.wip.remove(&event.issue_key);

        let (set, entered_at) = match event.to {
            Some(Stage::Backlog) => (&mut self.backlog, event.issue_created_at),
            Some(Stage::Wip) => (&mut self.wip, event.time),
            _ => return,
        };
        set.insert(
            event.issue_key.clone(),
            Tracked {
                entered_at,
                segment: event.segment.clone(),
            },
        );
    }

    fn snapshot(&mut self, day: NaiveDate, out: &mut Vec<Metric>) {
        let day_start = day.and_time(NaiveTime::MIN).and_utc();

        let mut counts: BTreeMap<(Stage, AgeBucket, &str), u64> = BTreeMap::new();
        for (stage, set) in [(Stage::Backlog, &self.backlog), (Stage::Wip, &self.wip)] {
            for tracked in set.values() {
                let bucket = AgeBucket::for_age(day_start - tracked.entered_at);
                *counts
                    .entry((stage, bucket, tracked.segment.as_str()))
                    .or_insert(0) += 1;
            }
        }

        out.extend(counts.into_iter().map(|((stage, bucket, segment), count)| {
            Metric::new(
                day_start,
                format!("issues_age/{}_{}", stage, bucket.slug()),
                prefixed_segment(&self.segment_prefix, segment),
                count as f64,
            )
            .with_comment(bucket.label())
        }));
        self.snapshots += 1;
    }

    pub fn finish(&mut self, out: &mut Vec<Metric>) {
        if let Some(day) = self.current_day {
            self.snapshot(day, out);
        }
        info!(
            snapshots = self.snapshots,
            backlog = self.backlog.len(),
            wip = self.wip.len(),
            "issues_age generator finished",
        );
    }

    /// Number of snapshots emitted so far.
    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }
}
