pub mod clickhouse;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SinkConfig;
use crate::metric::Metric;

/// Persists batches of metrics.
///
/// Each call is one atomic bulk write. Implementations are driven by a
/// single sink task and never shared.
pub trait MetricWriter: Send + 'static {
    /// Returns the writer's name for logging.
    fn name(&self) -> &str;

    /// Writes one non-empty batch.
    fn write_batch(
        &mut self,
        batch: &[Metric],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Totals of a drained sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub metrics: u64,
    pub batches: u64,
}

/// Producer handle onto the sink's ingestion channel.
#[derive(Clone)]
pub struct MetricSender {
    tx: mpsc::Sender<Metric>,
}

impl MetricSender {
    /// Submits one metric, waiting while the channel is full.
    pub async fn submit(&self, metric: Metric) -> Result<()> {
        self.tx
            .send(metric)
            .await
            .map_err(|_| anyhow!("metric sink closed"))
    }
}

/// Batches metrics from any number of producers into bulk writes.
///
/// A single task owns the writer and the batch buffer. Full batches are
/// written as they fill; the trailing partial batch is written on drain.
pub struct MetricSink {
    tx: mpsc::Sender<Metric>,
    task: JoinHandle<Result<SinkStats>>,
}

impl MetricSink {
    /// Spawns the sink task around `writer`.
    pub fn start<W: MetricWriter>(writer: W, cfg: &SinkConfig) -> Self {
        let (tx, rx) = mpsc::channel(cfg.channel_capacity);
        let task = tokio::spawn(run_sink(writer, rx, cfg.batch_size));
        Self { tx, task }
    }

    /// Returns a new producer handle.
    pub fn sender(&self) -> MetricSender {
        MetricSender {
            tx: self.tx.clone(),
        }
    }

    /// Closes ingestion and waits until every accepted metric is written.
    ///
    /// Returns only after all producer handles are dropped.
    pub async fn drain(self) -> Result<SinkStats> {
        drop(self.tx);
        self.task.await.context("joining metric sink task")?
    }
}

async fn run_sink<W: MetricWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<Metric>,
    batch_size: usize,
) -> Result<SinkStats> {
    let mut batch = Vec::with_capacity(batch_size);
    let mut stats = SinkStats::default();

    while let Some(metric) = rx.recv().await {
        batch.push(metric);
        if batch.len() >= batch_size {
            flush(&mut writer, &mut batch, &mut stats).await?;
        }
    }

    if !batch.is_empty() {
        flush(&mut writer, &mut batch, &mut stats).await?;
    }

    tracing::info!(
        writer = writer.name(),
        metrics = stats.metrics,
        batches = stats.batches,
        "metric sink drained",
    );

    Ok(stats)
}

async fn flush<W: MetricWriter>(
    writer: &mut W,
    batch: &mut Vec<Metric>,
    stats: &mut SinkStats,
) -> Result<()> {
    writer
        .write_batch(batch)
        .await
        .with_context(|| format!("writing batch of {} metrics to {}", batch.len(), writer.name()))?;

    stats.metrics += batch.len() as u64;
    stats.batches += 1;
    tracing::debug!(rows = batch.len(), total = stats.metrics, "metrics batch written");

    batch.clear();
    Ok(())
}
