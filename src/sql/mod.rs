pub mod approval;
pub mod executor;
pub mod generator;
pub mod training;

use async_trait::async_trait;

/// A single result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Turns a natural-language question into a SQL string.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Whether the generator has been trained and can accept questions.
    fn is_ready(&self) -> bool;

    /// Generate SQL for the given question.
    async fn generate(&self, question: &str) -> anyhow::Result<String>;
}

/// Runs SQL against a database and returns the resulting rows.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    fn is_ready(&self) -> bool {
        true
    }

    async fn execute(&self, sql: &str) -> anyhow::Result<Vec<Row>>;
}
