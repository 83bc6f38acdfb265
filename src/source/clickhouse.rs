use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clickhouse_rs::Pool;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::config::SourceConfig;
use crate::event::Event;
use crate::store::{escape_sql, qualified_table};

use super::{RawEvent, RowClassifier, SourceStats};

/// Streams lifecycle events from ClickHouse in ascending time order.
pub struct ClickHouseEventSource {
    pool: Pool,
    database: String,
    cfg: SourceConfig,
}

impl ClickHouseEventSource {
    pub fn new(pool: Pool, database: impl Into<String>, cfg: SourceConfig) -> Self {
        Self {
            pool,
            database: database.into(),
            cfg,
        }
    }

    /// Streams every matching row through `rows` into `tx`.
    ///
    /// Stops early, without error, when the receiver is dropped.
    pub async fn run(&self, mut rows: RowClassifier, tx: mpsc::Sender<Event>) -> Result<SourceStats> {
        let sql = build_query(&self.database, &self.cfg);

        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("getting handle for events query")?;

        tracing::info!(
            table = %self.cfg.table,
            filter_column = %self.cfg.filter_column,
            filter_value = %self.cfg.filter_value,
            "streaming events",
        );

        let mut stream = Box::pin(handle.query(sql.as_str()).stream());

        while let Some(row) = stream.next().await {
            let raw = {
                let row = row.context("reading events row")?;

                let time_ms: i64 = row.get("event_time_ms").context("reading event_time_ms")?;
                let created_ms: i64 = row.get("created_at_ms").context("reading created_at_ms")?;

                RawEvent {
                    time: from_millis(time_ms)?,
                    kind: row.get("kind").context("reading kind")?,
                    issue_key: row.get("key").context("reading key")?,
                    issue_type: row.get("type_name").context("reading type_name")?,
                    issue_tribe: row.get("tribe").context("reading tribe")?,
                    status_from: row.get("status_from").context("reading status_from")?,
                    status_to: row.get("status_to").context("reading status_to")?,
                    issue_created_at: from_millis(created_ms)?,
                }
            };

            if !rows.forward(&raw, &tx).await? {
                tracing::debug!("event receiver closed, stopping source");
                break;
            }
        }

        let stats = rows.stats();
        tracing::info!(rows = stats.rows, forwarded = stats.forwarded, "event source finished");

        Ok(stats)
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("timestamp out of range: {ms}ms"))
}

/// Builds the ordered, filtered events query.
///
/// Timestamps are read as epoch milliseconds so both `DateTime` and
/// `DateTime64` columns are accepted; optional labels are read as
/// `Nullable(String)`. Aliases differ from column names, as ClickHouse
/// rejects an alias that shadows the column it is computed from.
fn build_query(database: &str, cfg: &SourceConfig) -> String {
    let table = qualified_table(database, &cfg.table);
    let value = escape_sql(&cfg.filter_value);

    let mut sql = String::with_capacity(512);
    sql.push_str(
        "SELECT \
         toInt64(toUnixTimestamp64Milli(toDateTime64(event_time, 3))) AS event_time_ms, \
         toString(event_kind) AS kind, \
         toString(issue_key) AS key, \
         toString(issue_type) AS type_name, \
         CAST(issue_tribe AS Nullable(String)) AS tribe, \
         CAST(status_change_from AS Nullable(String)) AS status_from, \
         CAST(status_change_to AS Nullable(String)) AS status_to, \
         toInt64(toUnixTimestamp64Milli(toDateTime64(issue_created_at, 3))) AS created_at_ms ",
    );
    let _ = write!(
        sql,
        "FROM {table} WHERE {} = '{value}' ORDER BY event_time ASC",
        cfg.filter_column,
    );
    sql
}
