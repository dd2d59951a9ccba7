use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{Row, SqlExecutor};

/// Executes SQL against PostgreSQL, returning each row as a JSON object.
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub async fn new(uri: &str, pool_size: u32) -> anyhow::Result<Self> {
        let clean_uri = uri
            .replace("postgresql+psycopg2://", "postgresql://")
            .replace("postgresql+asyncpg://", "postgresql://");
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(&clean_uri)
            .await?;

        info!("Connected to PostgreSQL (pool_size={pool_size})");
        Ok(Self { pool })
    }
}

/// Wrap a statement so Postgres serializes every row to a JSON object. Only
/// statements that yield a row set are accepted by this form.
pub fn wrap_as_json_rows(sql: &str) -> String {
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("SELECT to_jsonb(q) AS row FROM (\n{statement}\n) AS q")
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    fn is_ready(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn execute(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
        let wrapped = wrap_as_json_rows(sql);
        let values = sqlx::query_scalar::<_, serde_json::Value>(&wrapped)
            .fetch_all(&self.pool)
            .await?;

        debug!("Query returned {} rows", values.len());
        values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::Object(row) => Ok(row),
                other => anyhow::bail!("unexpected row shape: {other}"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_strips_trailing_semicolons() {
        let wrapped = wrap_as_json_rows("SELECT COUNT(*) FROM customers;  \n");
        assert_eq!(
            wrapped,
            "SELECT to_jsonb(q) AS row FROM (\nSELECT COUNT(*) FROM customers\n) AS q"
        );
    }

    #[test]
    fn test_wrap_keeps_ctes() {
        let wrapped = wrap_as_json_rows("WITH t AS (SELECT 1 AS n) SELECT n FROM t;;");
        assert!(wrapped.contains("(\nWITH t AS (SELECT 1 AS n) SELECT n FROM t\n)"));
    }
}
