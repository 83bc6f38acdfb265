pub mod schema;

use anyhow::{Context, Result};
use clickhouse_rs::Pool;

use crate::config::ClickHouseConfig;

/// Manages a ClickHouse native TCP connection pool.
///
/// The events source, the metrics writer and the schema manager all share
/// the same pool.
pub struct ClickHouseStore {
    cfg: ClickHouseConfig,
    pool: Pool,
}

impl ClickHouseStore {
    /// Opens the connection pool and verifies connectivity with a ping.
    pub async fn connect(cfg: ClickHouseConfig) -> Result<Self> {
        let pool = Pool::new(cfg.dsn());

        let mut handle = pool
            .get_handle()
            .await
            .context("opening ClickHouse connection")?;

        handle.ping().await.context("pinging ClickHouse")?;

        tracing::info!(
            endpoint = %cfg.endpoint,
            database = %cfg.database,
            "ClickHouse store connected",
        );

        Ok(Self { cfg, pool })
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Returns the database holding every table of a run.
    pub fn database(&self) -> &str {
        &self.cfg.database
    }
}

/// Qualifies a table name with its database.
pub fn qualified_table(database: &str, table: &str) -> String {
    format!("{database}.{table}")
}

/// Escapes a string value for SQL insertion (single-quote escaping).
pub fn escape_sql(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_sql() {
        assert_eq!(escape_sql("hello"), "hello");
        assert_eq!(escape_sql("it's"), "it\\'s");
        assert_eq!(escape_sql("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_qualified_table() {
        assert_eq!(qualified_table("default", "metrics"), "default.metrics");
    }
}
