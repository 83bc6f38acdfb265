use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Canonical lifecycle stage of an issue.
///
/// Raw workflow statuses are mapped onto these by the classifier. The empty
/// stage (an issue with no status yet) is represented as `None` wherever an
/// `Option<Stage>` appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Backlog,
    Wip,
    Done,
    Resolved,
}

/// All stages, in lifecycle order.
pub const ALL_STAGES: [Stage; 4] = [Stage::Backlog, Stage::Wip, Stage::Done, Stage::Resolved];

impl Stage {
    /// Returns the canonical label used in metric names and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Wip => "wip",
            Self::Done => "done",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of lifecycle change carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StatusChanged,
}

impl EventKind {
    /// Raw `event_kind` value in the events relation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusChanged => "status_changed",
        }
    }

    /// Parses a raw `event_kind`; kinds the engine ignores return `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "status_changed" => Some(Self::StatusChanged),
            _ => None,
        }
    }
}

/// A classified issue lifecycle change.
///
/// Events are produced by the source already classified: `issue_type` is a
/// type group and `segment` a segment label, both from the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub kind: EventKind,
    pub issue_key: String,
    pub issue_type: String,
    pub segment: String,
    pub from: Option<Stage>,
    pub to: Option<Stage>,
    pub issue_created_at: DateTime<Utc>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{EVENT:{} - {} - issue:{} - from:{} - to:{}}}",
            self.kind.as_str(),
            self.time.to_rfc3339(),
            self.issue_key,
            stage_label(self.from),
            stage_label(self.to),
        )
    }
}

/// Label for an optional stage, empty for `None`.
pub fn stage_label(stage: Option<Stage>) -> &'static str {
    stage.map_or("", Stage::as_str)
}
