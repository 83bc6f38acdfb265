use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::event::{Event, Stage};
use crate::metric::{prefixed_segment, whole_days, Metric};

/// Cycle bounds of one issue.
#[derive(Debug, Clone, Copy)]
struct CycleBounds {
    wip_seen: bool,
    done_seen: bool,
    /// First `wip` transition, or first observation if none happened yet.
    start: DateTime<Utc>,
}

/// Emits `cycle_time` (whole days from the first `wip` transition to the
/// first `done` transition) once per issue.
#[derive(Debug)]
pub struct CycleTime {
    segment_prefix: String,
    issues: HashMap<String, CycleBounds>,
    metrics: u64,
}

impl CycleTime {
    pub fn new(segment_prefix: String) -> Self {
        Self {
            segment_prefix,
            issues: HashMap::new(),
            metrics: 0,
        }
    }

    pub fn process(&mut self, event: &Event, out: &mut Vec<Metric>) {
        // As in lead time, the first event is also evaluated as a transition.
        let bounds = self
            .issues
            .entry(event.issue_key.clone())
            .or_insert(CycleBounds {
                wip_seen: false,
                done_seen: false,
                start: event.time,
            });

        if bounds.done_seen {
            return;
        }

        match event.to {
            Some(Stage::Wip) if !bounds.wip_seen => {
                bounds.wip_seen = true;
                bounds.start = event.time;
            }
            Some(Stage::Done) => {
                bounds.done_seen = true;
                self.metrics += 1;
                out.push(
                    Metric::new(
                        event.time,
                        "cycle_time",
                        prefixed_segment(&self.segment_prefix, &event.segment),
                        whole_days(bounds.start, event.time),
                    )
                    .with_comment(event.issue_key.as_str()),
                );
            }
            _ => {}
        }
    }

    pub fn finish(&mut self) {
        info!(
            metrics = self.metrics,
            issues = self.issues.len(),
            "cycle_time generator finished",
        );
    }
}
