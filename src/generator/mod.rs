pub mod counters;
pub mod cycle_time;
pub mod issues_age;
pub mod lead_and_cycle_time;
pub mod lead_time;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;
use crate::event::Event;
use crate::metric::Metric;

use self::counters::Counters;
use self::cycle_time::CycleTime;
use self::issues_age::IssuesAge;
use self::lead_and_cycle_time::LeadAndCycleTime;
use self::lead_time::LeadTime;

/// Identifies a generator variant in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    LeadTime,
    CycleTime,
    Counters,
    IssuesAge,
    LeadAndCycleTime,
}

impl GeneratorKind {
    /// Returns the configuration/log label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeadTime => "lead_time",
            Self::CycleTime => "cycle_time",
            Self::Counters => "counters",
            Self::IssuesAge => "issues_age",
            Self::LeadAndCycleTime => "lead_and_cycle_time",
        }
    }
}

/// Errors that abort a generator.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeneratorError {
    #[error(
        "received an event dated {event_day} (issue {issue_key}) while processing {current_day}: \
         events must be ordered by time ascending"
    )]
    OutOfOrder {
        issue_key: String,
        event_day: NaiveDate,
        current_day: NaiveDate,
    },
}

/// Options shared by every generator of a run.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Prepended to every emitted segment.
    pub segment_prefix: String,
    /// Counters: warn when `from` disagrees with the recorded stage.
    pub log_stage_mismatches: bool,
}

impl GeneratorOptions {
    /// Extracts generator options from the run configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            segment_prefix: cfg.metrics.segment_prefix.clone(),
            log_stage_mismatches: cfg.counters.log_stage_mismatches,
        }
    }
}

/// A stateful metric generator.
///
/// Uses enum dispatch: each worker owns exactly one generator and drives it
/// with [`Generator::process`] for every event, then [`Generator::finish`]
/// once the input is exhausted. Metrics are appended to the caller's buffer.
#[derive(Debug)]
pub enum Generator {
    LeadTime(LeadTime),
    CycleTime(CycleTime),
    Counters(Counters),
    IssuesAge(IssuesAge),
    LeadAndCycleTime(LeadAndCycleTime),
}

impl Generator {
    /// Creates a fresh generator of the given kind.
    pub fn new(kind: GeneratorKind, opts: &GeneratorOptions) -> Self {
        let prefix = opts.segment_prefix.clone();
        match kind {
            GeneratorKind::LeadTime => Self::LeadTime(LeadTime::new(prefix)),
            GeneratorKind::CycleTime => Self::CycleTime(CycleTime::new(prefix)),
            GeneratorKind::Counters => {
                Self::Counters(Counters::new(prefix, opts.log_stage_mismatches))
            }
            GeneratorKind::IssuesAge => Self::IssuesAge(IssuesAge::new(prefix)),
            GeneratorKind::LeadAndCycleTime => {
                Self::LeadAndCycleTime(LeadAndCycleTime::new(prefix))
            }
        }
    }

    /// Creates one generator per configured kind, in configuration order.
    pub fn from_config(cfg: &Config) -> Vec<Self> {
        let opts = GeneratorOptions::from_config(cfg);
        cfg.generators
            .iter()
            .map(|kind| Self::new(*kind, &opts))
            .collect()
    }

    /// Returns the generator kind.
    pub fn kind(&self) -> GeneratorKind {
        match self {
            Self::LeadTime(_) => GeneratorKind::LeadTime,
            Self::CycleTime(_) => GeneratorKind::CycleTime,
            Self::Counters(_) => GeneratorKind::Counters,
            Self::IssuesAge(_) => GeneratorKind::IssuesAge,
            Self::LeadAndCycleTime(_) => GeneratorKind::LeadAndCycleTime,
        }
    }

    /// Returns the generator name for logging.
    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Feeds one event, appending any resulting metrics to `out`.
    pub fn process(&mut self, event: &Event, out: &mut Vec<Metric>) -> Result<(), GeneratorError> {
        match self {
            Self::LeadTime(g) => {
                g.process(event, out);
                Ok(())
            }
            Self::CycleTime(g) => {
                g.process(event, out);
                Ok(())
            }
            Self::Counters(g) => {
                g.process(event, out);
                Ok(())
            }
            Self::IssuesAge(g) => g.process(event, out),
            Self::LeadAndCycleTime(g) => {
                g.process(event);
                Ok(())
            }
        }
    }

    /// Signals end of input, appending any drain-time metrics to `out`.
    pub fn finish(&mut self, out: &mut Vec<Metric>) {
        match self {
            Self::LeadTime(g) => g.finish(),
            Self::CycleTime(g) => g.finish(),
            Self::Counters(g) => g.finish(),
            Self::IssuesAge(g) => g.finish(out),
            Self::LeadAndCycleTime(g) => g.finish(out),
        }
    }
}
