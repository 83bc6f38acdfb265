use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::event::{Event, Stage};
use crate::metric::{prefixed_segment, whole_days, Metric};

/// Lead time state of one issue.
#[derive(Debug, Clone, Copy)]
enum LeadState {
    Open { start: DateTime<Utc> },
    Resolved,
}

/// Emits `lead_time` (whole days from first observation to `done`) once per
/// issue, at the moment the issue first reaches `done`.
#[derive(Debug)]
pub struct LeadTime {
    segment_prefix: String,
    issues: HashMap<String, LeadState>,
    /// Issues that kept changing after their lead time was emitted.
    reopened: HashSet<String>,
    metrics: u64,
}

impl LeadTime {
    pub fn new(segment_prefix: String) -> Self {
        Self {
            segment_prefix,
            issues: HashMap::new(),
            reopened: HashSet::new(),
            metrics: 0,
        }
    }

    pub fn process(&mut self, event: &Event, out: &mut Vec<Metric>) {
        // The first event both opens the issue and counts as its first
        // transition, so an issue first seen entering `done` measures 0 days.
        let state = self
            .issues
            .entry(event.issue_key.clone())
            .or_insert(LeadState::Open { start: event.time });

        match *state {
            LeadState::Resolved => {
                self.reopened.insert(event.issue_key.clone());
            }
            LeadState::Open { start } => {
                if event.to != Some(Stage::Done) {
                    return;
                }
                *state = LeadState::Resolved;
                self.metrics += 1;
                out.push(
                    Metric::new(
                        event.time,
                        "lead_time",
                        prefixed_segment(&self.segment_prefix, &event.segment),
                        whole_days(start, event.time),
                    )
                    .with_comment(event.issue_key.as_str()),
                );
            }
        }
    }

    pub fn finish(&mut self) {
        info!(
            metrics = self.metrics,
            issues = self.issues.len(),
            reopened_pct = format_args!("{:.1}", self.reopened_pct()),
            "lead_time generator finished",
        );
    }

    /// Share of issues with status changes after resolution, in percent.
    pub fn reopened_pct(&self) -> f64 {
        if self.issues.is_empty() {
            return 0.0;
        }
        self.reopened.len() as f64 / self.issues.len() as f64 * 100.0
    }
}
