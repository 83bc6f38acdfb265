use anyhow::{Context, Result};
use clickhouse_rs::Pool;

/// Creates the metrics table. `{database}` and `{table}` are substituted.
const CREATE_METRICS_SQL: &str = include_str!("sql/metrics.up.sql");

/// Drops the metrics table if present.
const DROP_METRICS_SQL: &str = include_str!("sql/metrics.down.sql");

/// Manages the lifecycle of the metrics table.
pub struct MetricsSchema {
    pool: Pool,
    database: String,
    table: String,
}

impl MetricsSchema {
    pub fn new(pool: Pool, database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
            table: table.into(),
        }
    }

    /// Creates the metrics table if it does not exist.
    pub async fn create(&self) -> Result<()> {
        self.execute_sql(&self.render(CREATE_METRICS_SQL))
            .await
            .with_context(|| format!("creating table {}.{}", self.database, self.table))?;

        tracing::info!(database = %self.database, table = %self.table, "metrics table created");

        Ok(())
    }

    /// Drops the metrics table if it exists.
    pub async fn drop_table(&self) -> Result<()> {
        self.execute_sql(&self.render(DROP_METRICS_SQL))
            .await
            .with_context(|| format!("dropping table {}.{}", self.database, self.table))?;

        tracing::info!(database = %self.database, table = %self.table, "metrics table dropped");

        Ok(())
    }

    /// Drops then recreates the metrics table.
    pub async fn reset(&self) -> Result<()> {
        self.drop_table().await?;
        self.create().await
    }

    fn render(&self, template: &str) -> String {
        render(template, &self.database, &self.table)
    }

    /// Splits a SQL string into individual statements and executes each.
    async fn execute_sql(&self, sql: &str) -> Result<()> {
        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("getting ClickHouse handle for schema change")?;

        for statement in split_statements(sql) {
            handle.execute(statement).await.with_context(|| {
                let preview: String = statement.chars().take(80).collect();
                format!("executing schema statement: {preview}...")
            })?;
        }

        Ok(())
    }
}

fn render(template: &str, database: &str, table: &str) -> String {
    template
        .replace("{database}", database)
        .replace("{table}", table)
}

/// Splits SQL text into individual statements by semicolons.
fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements_basic() {
        let sql = "DROP TABLE foo; CREATE TABLE bar (id Int32);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("DROP TABLE foo"));
        assert!(stmts[1].starts_with("CREATE TABLE bar"));
    }

    #[test]
    fn test_split_statements_blank_and_trailing() {
        assert!(split_statements("").is_empty());
        assert_eq!(split_statements("\n  SELECT 1;;;\n\n").len(), 1);
    }

    #[test]
    fn test_render_create_template() {
        let sql = render(CREATE_METRICS_SQL, "analytics", "metrics");
        let stmts = split_statements(&sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].starts_with("CREATE TABLE IF NOT EXISTS analytics.metrics ("));
        for column in ["time", "name", "segment", "value", "comment"] {
            assert!(sql.contains(&format!("    {column} ")), "missing column {column}");
        }
        assert!(!sql.contains('{'));
    }

    #[test]
    fn test_render_drop_template() {
        let sql = render(DROP_METRICS_SQL, "default", "jt_metrics");
        assert_eq!(
            split_statements(&sql),
            vec!["DROP TABLE IF EXISTS default.jt_metrics"]
        );
    }
}
