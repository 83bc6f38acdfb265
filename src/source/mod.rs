pub mod clickhouse;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::classify::{ClassifyError, Classifier};
use crate::event::{Event, EventKind};

/// Errors that end event production.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SourceError {
    #[error("classifying event for issue {issue_key}")]
    Classify {
        issue_key: String,
        #[source]
        source: ClassifyError,
    },

    #[error(
        "event for issue {issue_key} at {time} precedes the previous event at {previous}: \
         events must be ordered by time ascending"
    )]
    OutOfOrder {
        issue_key: String,
        time: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

/// An unclassified row of the lifecycle events relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub time: DateTime<Utc>,
    pub kind: String,
    pub issue_key: String,
    pub issue_type: String,
    pub issue_tribe: Option<String>,
    pub status_from: Option<String>,
    pub status_to: Option<String>,
    pub issue_created_at: DateTime<Utc>,
}

/// Row counters of one source run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub rows: u64,
    pub forwarded: u64,
}

/// Turns raw rows into classified events.
///
/// Only `status_changed` rows whose classified stages differ are forwarded.
/// Rows must arrive in non-decreasing time order.
pub struct RowClassifier {
    classifier: Classifier,
    last_time: Option<DateTime<Utc>>,
    stats: SourceStats,
}

impl RowClassifier {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            last_time: None,
            stats: SourceStats::default(),
        }
    }

    /// Classifies one row. Returns `None` for rows that carry no stage change.
    pub fn classify(&mut self, raw: &RawEvent) -> Result<Option<Event>, SourceError> {
        self.stats.rows += 1;

        if let Some(previous) = self.last_time {
            if raw.time < previous {
                return Err(SourceError::OutOfOrder {
                    issue_key: raw.issue_key.clone(),
                    time: raw.time,
                    previous,
                });
            }
        }
        self.last_time = Some(raw.time);

        let Some(kind) = EventKind::from_raw(&raw.kind) else {
            return Ok(None);
        };

        let with_key = |source| SourceError::Classify {
            issue_key: raw.issue_key.clone(),
            source,
        };

        let from = self
            .classifier
            .stage(raw.status_from.as_deref())
            .map_err(with_key)?;
        let to = self
            .classifier
            .stage(raw.status_to.as_deref())
            .map_err(with_key)?;
        if from == to {
            return Ok(None);
        }

        let issue_type = self
            .classifier
            .type_group(&raw.issue_type)
            .map_err(with_key)?
            .to_string();

        self.stats.forwarded += 1;

        Ok(Some(Event {
            time: raw.time,
            kind,
            issue_key: raw.issue_key.clone(),
            issue_type,
            segment: self.classifier.segment(raw.issue_tribe.as_deref()),
            from,
            to,
            issue_created_at: raw.issue_created_at,
        }))
    }

    /// Classifies `raw` and sends the result downstream.
    ///
    /// Returns `Ok(false)` once the receiver is gone: the consumer stopped
    /// and will report its own error.
    pub async fn forward(
        &mut self,
        raw: &RawEvent,
        tx: &mpsc::Sender<Event>,
    ) -> Result<bool, SourceError> {
        let Some(event) = self.classify(raw)? else {
            return Ok(true);
        };
        Ok(tx.send(event).await.is_ok())
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }
}

/// Forwards in-memory rows, in order, until exhausted or the receiver closes.
pub async fn forward_rows<I>(
    rows: I,
    mut classifier: RowClassifier,
    tx: mpsc::Sender<Event>,
) -> Result<SourceStats, SourceError>
where
    I: IntoIterator<Item = RawEvent>,
{
    for raw in rows {
        if !classifier.forward(&raw, &tx).await? {
            break;
        }
    }
    Ok(classifier.stats())
}
