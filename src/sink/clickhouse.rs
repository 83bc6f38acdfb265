use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clickhouse_rs::Pool;

use crate::metric::Metric;
use crate::store::{escape_sql, qualified_table};

use super::MetricWriter;

/// Column list of every metrics insert.
const COLUMNS: &str = "time, name, segment, value, comment";

/// Writes metric batches into the ClickHouse metrics table, one
/// `INSERT ... VALUES` statement per batch.
pub struct ClickHouseMetricWriter {
    pool: Pool,
    table: String,
}

impl ClickHouseMetricWriter {
    pub fn new(pool: Pool, database: &str, table: &str) -> Self {
        Self {
            pool,
            table: qualified_table(database, table),
        }
    }
}

impl MetricWriter for ClickHouseMetricWriter {
    fn name(&self) -> &str {
        "clickhouse"
    }

    async fn write_batch(&mut self, batch: &[Metric]) -> Result<()> {
        let sql = build_insert(&self.table, batch);

        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("getting handle for metrics insert")?;

        handle
            .execute(sql.as_str())
            .await
            .with_context(|| format!("inserting into {}", self.table))?;

        Ok(())
    }
}

fn build_insert(table: &str, batch: &[Metric]) -> String {
    let mut sql = String::with_capacity(64 + table.len() + COLUMNS.len() + batch.len() * 96);
    let _ = write!(sql, "INSERT INTO {table} ({COLUMNS}) VALUES ");

    for (idx, m) in batch.iter().enumerate() {
        if idx > 0 {
            sql.push_str(", ");
        }
        let _ = write!(
            sql,
            "({}, '{}', '{}', {}, '{}')",
            format_datetime(m.time),
            escape_sql(&m.name),
            escape_sql(&m.segment),
            m.value,
            escape_sql(&m.comment),
        );
    }

    sql
}

/// Formats a timestamp as a quoted DateTime64(3) literal.
fn format_datetime(t: DateTime<Utc>) -> String {
    format!("'{}'", t.format("%Y-%m-%d %H:%M:%S%.3f"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_format_datetime() {
        let t = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(format_datetime(t), "'1970-01-01 00:00:00.000'");

        let t = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(format_datetime(t), "'2023-11-14 22:13:20.123'");
    }

    #[test]
    fn test_build_insert() {
        let t = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let batch = vec![
            Metric::new(t, "lead_time", "jt/tribe_core", 3.0).with_comment("JT-1"),
            Metric::new(t, "issues_age/wip_1w", "jt/tribe_o'neil", 2.5).with_comment("<1 week"),
        ];

        let sql = build_insert("default.metrics", &batch);
        assert_eq!(
            sql,
            "INSERT INTO default.metrics (time, name, segment, value, comment) VALUES \
             ('2024-05-02 00:00:00.000', 'lead_time', 'jt/tribe_core', 3, 'JT-1'), \
             ('2024-05-02 00:00:00.000', 'issues_age/wip_1w', 'jt/tribe_o\\'neil', 2.5, '<1 week')"
        );
    }
}
