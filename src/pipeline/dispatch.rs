use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::Event;
use crate::generator::Generator;
use crate::metric::Metric;
use crate::sink::MetricSender;

/// Counters of one generator worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub events: u64,
    pub metrics: u64,
    /// Whether end-of-stream metrics were emitted.
    pub finished: bool,
}

/// Message on a generator input.
///
/// A worker only runs its end-of-stream step after `EndOfStream`. An input
/// that closes without it means the run was aborted.
#[derive(Debug)]
enum WorkerInput {
    Event(Event),
    EndOfStream,
}

struct Worker {
    name: &'static str,
    input: mpsc::Sender<WorkerInput>,
    task: JoinHandle<Result<WorkerStats>>,
}

/// Replicates the event stream to one task per generator.
///
/// Every generator sees every event in the original order through its own
/// bounded channel. A full channel suspends the dispatcher, so the slowest
/// generator paces the whole run.
pub struct Dispatcher {
    workers: Vec<Worker>,
    forwarded: u64,
    exhausted: bool,
}

impl Dispatcher {
    /// Spawns one worker task per generator.
    pub fn start(generators: Vec<Generator>, sink: &MetricSender, channel_capacity: usize) -> Self {
        let workers = generators
            .into_iter()
            .map(|generator| {
                let (input, rx) = mpsc::channel(channel_capacity);
                let name = generator.name();
                let task = tokio::spawn(run_worker(generator, rx, sink.clone()));
                Worker { name, input, task }
            })
            .collect();

        Self {
            workers,
            forwarded: 0,
            exhausted: false,
        }
    }

    /// Forwards `events` until the sender side closes.
    ///
    /// Stops as soon as a generator goes away; the stream then counts as
    /// not exhausted and [`Dispatcher::complete`] aborts instead.
    pub async fn forward(&mut self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            for worker in &self.workers {
                if worker.input.send(WorkerInput::Event(event.clone())).await.is_err() {
                    tracing::warn!(
                        forwarded = self.forwarded,
                        generator = worker.name,
                        "generator stopped early, no longer dispatching events",
                    );
                    return;
                }
            }
            self.forwarded += 1;
        }
        self.exhausted = true;
    }

    /// Signals end of stream to every generator, then waits for all of them.
    ///
    /// Generators only emit their end-of-stream metrics when `source_ok` is
    /// set and the stream was forwarded in full. Returns the first worker
    /// error in generator order.
    pub async fn complete(self, source_ok: bool) -> Result<Vec<(&'static str, WorkerStats)>> {
        let end = source_ok && self.exhausted;
        if end {
            tracing::debug!(forwarded = self.forwarded, "event stream exhausted, finishing generators");
            for worker in &self.workers {
                // A worker that already failed reports through its task.
                let _ = worker.input.send(WorkerInput::EndOfStream).await;
            }
        } else {
            tracing::warn!(forwarded = self.forwarded, "event stream aborted, skipping end-of-stream metrics");
        }

        let (inputs, tasks): (Vec<_>, Vec<_>) = self
            .workers
            .into_iter()
            .map(|w| (w.input, (w.name, w.task)))
            .unzip();
        drop(inputs);

        let mut stats = Vec::with_capacity(tasks.len());
        let mut first_err = None;
        for (name, task) in tasks {
            let result = task
                .await
                .with_context(|| format!("joining {name} generator task"))
                .and_then(|r| r);
            match result {
                Ok(s) => stats.push((name, s)),
                Err(e) => {
                    tracing::error!(generator = name, error = %format!("{e:#}"), "generator failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None if stats.is_empty() => Err(anyhow!("no generators configured")),
            None => Ok(stats),
        }
    }
}

async fn run_worker(
    mut generator: Generator,
    mut rx: mpsc::Receiver<WorkerInput>,
    sink: MetricSender,
) -> Result<WorkerStats> {
    let name = generator.name();
    let mut stats = WorkerStats::default();
    let mut out: Vec<Metric> = Vec::new();

    while let Some(input) = rx.recv().await {
        match input {
            WorkerInput::Event(event) => {
                stats.events += 1;
                generator
                    .process(&event, &mut out)
                    .with_context(|| format!("{name} generator"))?;
                stats.metrics += submit_all(&sink, &mut out).await?;
            }
            WorkerInput::EndOfStream => {
                generator.finish(&mut out);
                stats.metrics += submit_all(&sink, &mut out).await?;
                stats.finished = true;
                break;
            }
        }
    }

    tracing::debug!(
        generator = name,
        events = stats.events,
        metrics = stats.metrics,
        finished = stats.finished,
        "generator worker done",
    );

    Ok(stats)
}

async fn submit_all(sink: &MetricSender, out: &mut Vec<Metric>) -> Result<u64> {
    let count = out.len() as u64;
    for metric in out.drain(..) {
        sink.submit(metric).await?;
    }
    Ok(count)
}
