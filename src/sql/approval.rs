use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{Row, SqlExecutor, SqlGenerator};

const REVIEW_EXPLANATION: &str =
    "This SQL will retrieve data from your database. Please review before approving.";
const REJECTION_MESSAGE: &str = "Query execution cancelled by user";

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("SQL service not initialized: {0}")]
    NotInitialized(&'static str),
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("SQL generation failed: {0}")]
    Generation(String),
    #[error("Query ID not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    PendingApproval,
    Rejected,
    Executed,
    Error,
}

/// A generated SQL statement awaiting an approve/reject decision.
#[derive(Debug, Clone, Serialize)]
pub struct PendingQuery {
    #[serde(rename = "query_id")]
    pub id: String,
    pub question: String,
    pub sql: String,
    pub status: QueryStatus,
    #[serde(rename = "generated_at")]
    pub created_at: DateTime<Utc>,
}

/// Returned to the caller after a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub query_id: String,
    pub question: String,
    pub sql: String,
    pub explanation: String,
    pub status: QueryStatus,
}

/// Outcome of resolving a pending query. Execution failures are reported here
/// rather than raised.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Executed {
        query_id: String,
        question: String,
        sql: String,
        results: Vec<Row>,
        result_count: usize,
    },
    Rejected {
        query_id: String,
        message: String,
    },
    Error {
        query_id: String,
        error: String,
    },
}

impl Resolution {
    pub fn status(&self) -> QueryStatus {
        match self {
            Resolution::Executed { .. } => QueryStatus::Executed,
            Resolution::Rejected { .. } => QueryStatus::Rejected,
            Resolution::Error { .. } => QueryStatus::Error,
        }
    }
}

#[derive(Default)]
struct Entries {
    next_seq: u64,
    by_id: HashMap<String, (u64, PendingQuery)>,
}

/// In-memory store that separates SQL generation from SQL execution.
///
/// Entries live only while pending: resolving an entry (approve or reject)
/// removes it, and the removal is atomic with the existence check, so a given
/// identifier can be resolved at most once.
pub struct ApprovalStore {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn SqlExecutor>,
    timeout: Duration,
    entries: Mutex<Entries>,
}

impl ApprovalStore {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn SqlExecutor>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            executor,
            timeout,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Generate SQL for `question` and park it until someone approves or rejects it.
    pub async fn submit_for_approval(&self, question: &str) -> Result<Submission, ApprovalError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApprovalError::EmptyQuestion);
        }
        if !self.generator.is_ready() {
            return Err(ApprovalError::NotInitialized(
                "SQL generator has not been trained",
            ));
        }

        let sql = match tokio::time::timeout(self.timeout, self.generator.generate(question)).await
        {
            Ok(Ok(sql)) => sql,
            Ok(Err(e)) => {
                error!("SQL generation error: {e:#}");
                return Err(ApprovalError::Generation(format!("{e:#}")));
            }
            Err(_) => {
                warn!("SQL generation timed out after {:?}", self.timeout);
                return Err(ApprovalError::Generation(format!(
                    "generator timed out after {:?}",
                    self.timeout
                )));
            }
        };
        if sql.trim().is_empty() {
            return Err(ApprovalError::Generation(
                "generator returned empty SQL".to_string(),
            ));
        }

        let mut entries = self.entries.lock().await;
        let mut id = Uuid::new_v4().to_string();
        while entries.by_id.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.by_id.insert(
            id.clone(),
            (
                seq,
                PendingQuery {
                    id: id.clone(),
                    question: question.to_string(),
                    sql: sql.clone(),
                    status: QueryStatus::PendingApproval,
                    created_at: Utc::now(),
                },
            ),
        );
        drop(entries);

        info!("Stored pending query {id}");
        Ok(Submission {
            query_id: id,
            question: question.to_string(),
            sql,
            explanation: REVIEW_EXPLANATION.to_string(),
            status: QueryStatus::PendingApproval,
        })
    }

    /// Approve (execute) or reject a pending query. The entry is consumed on
    /// every branch, including a failed execution.
    pub async fn resolve(
        &self,
        query_id: &str,
        approved: bool,
    ) -> Result<Resolution, ApprovalError> {
        if approved && !self.executor.is_ready() {
            return Err(ApprovalError::NotInitialized(
                "SQL executor is not connected",
            ));
        }

        let pending = self
            .take(query_id)
            .await
            .ok_or_else(|| ApprovalError::NotFound(query_id.to_string()))?;

        if !approved {
            info!("Pending query {query_id} rejected");
            return Ok(Resolution::Rejected {
                query_id: pending.id,
                message: REJECTION_MESSAGE.to_string(),
            });
        }

        match tokio::time::timeout(self.timeout, self.executor.execute(&pending.sql)).await {
            Ok(Ok(results)) => {
                info!("Executed query {query_id} ({} rows)", results.len());
                Ok(Resolution::Executed {
                    query_id: pending.id,
                    question: pending.question,
                    sql: pending.sql,
                    result_count: results.len(),
                    results,
                })
            }
            Ok(Err(e)) => {
                error!("Execution of query {query_id} failed: {e:#}");
                Ok(Resolution::Error {
                    query_id: pending.id,
                    error: format!("Failed to execute SQL: {e:#}"),
                })
            }
            Err(_) => {
                warn!("Execution of query {query_id} timed out after {:?}", self.timeout);
                Ok(Resolution::Error {
                    query_id: pending.id,
                    error: format!("SQL execution timed out after {:?}", self.timeout),
                })
            }
        }
    }

    /// Snapshot of pending queries in submission order.
    pub async fn list_pending(&self) -> Vec<PendingQuery> {
        let entries = self.entries.lock().await;
        let mut pending: Vec<&(u64, PendingQuery)> = entries.by_id.values().collect();
        pending.sort_by_key(|(seq, _)| *seq);
        pending.into_iter().map(|(_, q)| q.clone()).collect()
    }

    async fn take(&self, query_id: &str) -> Option<PendingQuery> {
        self.entries
            .lock()
            .await
            .by_id
            .remove(query_id)
            .map(|(_, q)| q)
    }
}
