use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::event::{Event, Stage};
use crate::metric::{fractional_days, prefixed_segment, Metric};

#[derive(Debug, Clone)]
struct Intervals {
    first_seen: DateTime<Utc>,
    segment: String,
    resolved_at: Option<DateTime<Utc>>,
    wip_at: Option<DateTime<Utc>>,
    done_at: Option<DateTime<Utc>>,
}

/// Accumulates lead and cycle intervals per issue and emits them, in
/// fractional days, once the input is exhausted.
///
/// Lead runs from first observation to the latest `resolved` transition.
/// Cycle runs from the first `wip` transition (or first observation) to the
/// latest `done` transition.
#[derive(Debug)]
pub struct LeadAndCycleTime {
    segment_prefix: String,
    issues: HashMap<String, Intervals>,
    /// Issue keys in first-seen order, so emission order is deterministic.
    order: Vec<String>,
}

impl LeadAndCycleTime {
    pub fn new(segment_prefix: String) -> Self {
        Self {
            segment_prefix,
            issues: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn process(&mut self, event: &Event) {
        if !self.issues.contains_key(&event.issue_key) {
            self.order.push(event.issue_key.clone());
        }
        let intervals = self
            .issues
            .entry(event.issue_key.clone())
            .or_insert_with(|| Intervals {
                first_seen: event.time,
                segment: String::new(),
                resolved_at: None,
                wip_at: None,
                done_at: None,
            });
        intervals.segment.clone_from(&event.segment);

        match event.to {
            Some(Stage::Wip) if intervals.wip_at.is_none() => intervals.wip_at = Some(event.time),
            Some(Stage::Done) => intervals.done_at = Some(event.time),
            Some(Stage::Resolved) => intervals.resolved_at = Some(event.time),
            _ => {}
        }
    }

    pub fn finish(&mut self, out: &mut Vec<Metric>) {
        let before = out.len();

        for key in &self.order {
            let Some(intervals) = self.issues.get(key) else {
                continue;
            };
            let segment = prefixed_segment(&self.segment_prefix, &intervals.segment);

            if let Some(end) = intervals.resolved_at {
                out.push(
                    Metric::new(
                        end,
                        "lead_time",
                        segment.clone(),
                        fractional_days(intervals.first_seen, end),
                    )
                    .with_comment(key.as_str()),
                );
            }

            if let Some(end) = intervals.done_at {
                let start = intervals.wip_at.unwrap_or(intervals.first_seen);
                out.push(
                    Metric::new(end, "cycle_time", segment, fractional_days(start, end))
                        .with_comment(key.as_str()),
                );
            }
        }

        info!(
            metrics = out.len() - before,
            issues = self.order.len(),
            "lead_and_cycle_time generator finished",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testutil::{at_hours, event, t0};

    fn run(events: &[Event]) -> Vec<Metric> {
        let mut g = LeadAndCycleTime::new(String::new());
        for e in events {
            g.process(e);
        }
        let mut out = Vec::new();
        g.finish(&mut out);
        out
    }

    #[test]
    fn test_emits_fractional_days_at_finish() {
        let out = run(&[
            event("A", t0(), None, Some(Stage::Backlog)),
            event("A", at_hours(12), Some(Stage::Backlog), Some(Stage::Wip)),
            event("A", at_hours(48), Some(Stage::Wip), Some(Stage::Done)),
            event("A", at_hours(60), Some(Stage::Done), Some(Stage::Resolved)),
        ]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "lead_time");
        assert!((out[0].value - 2.5).abs() < 1e-9);
        assert_eq!(out[0].time, at_hours(60));
        assert_eq!(out[1].name, "cycle_time");
        assert!((out[1].value - 1.5).abs() < 1e-9);
        assert_eq!(out[1].comment, "A");
    }

    #[test]
    fn test_latest_end_wins() {
        let out = run(&[
            event("A", t0(), None, Some(Stage::Wip)),
            event("A", at_hours(24), Some(Stage::Wip), Some(Stage::Done)),
            event("A", at_hours(36), Some(Stage::Done), Some(Stage::Wip)),
            event("A", at_hours(72), Some(Stage::Wip), Some(Stage::Done)),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "cycle_time");
        assert!((out[0].value - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_bounds_emit_nothing() {
        let out = run(&[
            event("A", t0(), None, Some(Stage::Backlog)),
            event("A", at_hours(5), Some(Stage::Backlog), Some(Stage::Wip)),
        ]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_first_seen_order() {
        let out = run(&[
            event("B", t0(), None, Some(Stage::Wip)),
            event("A", at_hours(1), None, Some(Stage::Wip)),
            event("A", at_hours(2), Some(Stage::Wip), Some(Stage::Done)),
            event("B", at_hours(3), Some(Stage::Wip), Some(Stage::Done)),
        ]);
        let keys: Vec<_> = out.iter().map(|m| m.comment.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
    }
}
