pub mod dispatch;

use std::future::Future;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::classify::Classifier;
use crate::config::{Config, DispatchConfig, SinkConfig};
use crate::event::Event;
use crate::generator::Generator;
use crate::sink::clickhouse::ClickHouseMetricWriter;
use crate::sink::{MetricSink, MetricWriter, SinkStats};
use crate::source::clickhouse::ClickHouseEventSource;
use crate::source::{RowClassifier, SourceStats};
use crate::store::schema::MetricsSchema;
use crate::store::ClickHouseStore;

use self::dispatch::{Dispatcher, WorkerStats};

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub source: SourceStats,
    pub generators: Vec<(&'static str, WorkerStats)>,
    pub sink: SinkStats,
}

/// Runs `generators` over the events produced by `source` and persists
/// their metrics via `writer`.
///
/// `source` is handed the sending side of the event channel and runs on its
/// own task. Generators emit their end-of-stream metrics only once the
/// source has completed successfully and every event was dispatched. A
/// source failure is reported first, then a sink failure, then a generator
/// failure.
pub async fn process<W, F, Fut, E>(
    source: F,
    generators: Vec<Generator>,
    writer: W,
    sink_cfg: &SinkConfig,
    dispatch_cfg: &DispatchConfig,
) -> Result<RunSummary>
where
    W: MetricWriter,
    F: FnOnce(mpsc::Sender<Event>) -> Fut,
    Fut: Future<Output = std::result::Result<SourceStats, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(dispatch_cfg.channel_capacity);
    let source_task = tokio::spawn(source(tx));

    let sink = MetricSink::start(writer, sink_cfg);
    let mut dispatcher = Dispatcher::start(generators, &sink.sender(), dispatch_cfg.channel_capacity);
    dispatcher.forward(rx).await;

    let sourced = source_task
        .await
        .context("joining event source task")
        .and_then(|r| r.map_err(Into::into))
        .context("streaming events");
    let dispatched = dispatcher.complete(sourced.is_ok()).await;
    let drained = sink.drain().await.context("draining metric sink");

    let source = sourced?;
    let sink = drained?;
    let generators = dispatched?;

    Ok(RunSummary {
        source,
        generators,
        sink,
    })
}

/// Recreates the metrics table, then derives metrics from every event.
pub async fn reset(cfg: &Config) -> Result<RunSummary> {
    let store = ClickHouseStore::connect(cfg.clickhouse.clone()).await?;
    let database = store.database().to_string();

    MetricsSchema::new(store.pool().clone(), &database, &cfg.metrics.table)
        .reset()
        .await?;

    let source = ClickHouseEventSource::new(store.pool().clone(), &database, cfg.source.clone());
    let rows = RowClassifier::new(Classifier::new(&cfg.classification));
    let writer = ClickHouseMetricWriter::new(store.pool().clone(), &database, &cfg.metrics.table);

    let summary = process(
        move |tx| async move { source.run(rows, tx).await },
        Generator::from_config(cfg),
        writer,
        &cfg.sink,
        &cfg.dispatch,
    )
    .await?;

    tracing::info!(
        rows = summary.source.rows,
        events = summary.source.forwarded,
        metrics = summary.sink.metrics,
        batches = summary.sink.batches,
        "reset completed",
    );

    Ok(summary)
}

/// Drops the metrics table.
pub async fn cleanup(cfg: &Config) -> Result<()> {
    let store = ClickHouseStore::connect(cfg.clickhouse.clone()).await?;

    MetricsSchema::new(store.pool().clone(), store.database(), &cfg.metrics.table)
        .drop_table()
        .await
}
