use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::event::{stage_label, Event, Stage};
use crate::metric::{prefixed_segment, Metric};

/// Identifies one counter bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct BucketKey {
    stage: Stage,
    issue_type: String,
    segment: String,
}

impl BucketKey {
    fn metric_name(&self) -> String {
        format!("counter/{}_{}", self.stage, self.issue_type)
    }
}

/// Counts issues per `(stage, type group, segment)` and emits the full table
/// after every event.
///
/// Each issue is recorded with the bucket it was counted under, so a later
/// change of type or segment still decrements the right bucket. Buckets are
/// never removed: once created they are reported even at zero.
#[derive(Debug)]
pub struct Counters {
    segment_prefix: String,
    log_stage_mismatches: bool,
    issues: HashMap<String, BucketKey>,
    buckets: BTreeMap<BucketKey, u64>,
    snapshots: u64,
    mismatches: u64,
}

impl Counters {
    pub fn new(segment_prefix: String, log_stage_mismatches: bool) -> Self {
        Self {
            segment_prefix,
            log_stage_mismatches,
            issues: HashMap::new(),
            buckets: BTreeMap::new(),
            snapshots: 0,
            mismatches: 0,
        }
    }

    pub fn process(&mut self, event: &Event, out: &mut Vec<Metric>) {
        let previous = self.issues.remove(&event.issue_key);

        let recorded = previous.as_ref().map(|key| key.stage);
        if recorded != event.from {
            self.mismatches += 1;
            if self.log_stage_mismatches {
                warn!(
                    issue = %event.issue_key,
                    recorded = stage_label(recorded),
                    from = stage_label(event.from),
                    "Event source stage disagrees with recorded stage",
                );
            }
        }

        if let Some(key) = previous {
            if let Some(count) = self.buckets.get_mut(&key) {
                *count -= 1;
            }
        }

        if let Some(stage) = event.to {
            let key = BucketKey {
                stage,
                issue_type: event.issue_type.clone(),
                segment: event.segment.clone(),
            };
            *self.buckets.entry(key.clone()).or_insert(0) += 1;
            self.issues.insert(event.issue_key.clone(), key);
        }

        self.snapshot(event.time, out);
    }

    fn snapshot(&mut self, time: DateTime<Utc>, out: &mut Vec<Metric>) {
        self.snapshots += 1;
        out.extend(self.buckets.iter().map(|(key, count)| {
            Metric::new(
                time,
                key.metric_name(),
                prefixed_segment(&self.segment_prefix, &key.segment),
                *count as f64,
            )
        }));
    }

    pub fn finish(&mut self) {
        info!(
            snapshots = self.snapshots,
            buckets = self.buckets.len(),
            issues = self.issues.len(),
            stage_mismatches = self.mismatches,
            "counters generator finished",
        );
    }

    /// Number of issues currently counted in `stage`, summed over buckets.
    pub fn stage_total(&self, stage: Stage) -> u64 {
        self.buckets
            .iter()
            .filter(|(key, _)| key.stage == stage)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Number of issues whose recorded stage is `stage`.
    pub fn issues_in(&self, stage: Stage) -> usize {
        self.issues.values().filter(|key| key.stage == stage).count()
    }
}
