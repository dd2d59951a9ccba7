use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::training::{introspect_schema, TrainingCorpus, TrainingExample};
use super::{SqlExecutor, SqlGenerator};
use crate::completion::{CompletionModel, Message};

const SYSTEM_PROMPT: &str = "You are a PostgreSQL expert. Generate a single SQL query that \
answers the user's question. Use only the tables and columns described below. \
Respond with the SQL only, inside a ```sql code block, without explanation.";

/// Text-to-SQL generator backed by a chat completion model.
///
/// The generator refuses questions until training has completed. Training
/// gathers the database schema, free-form documentation, and example
/// question/SQL pairs; all of it is placed in the prompt for every question.
pub struct LlmSqlGenerator {
    completion: Arc<dyn CompletionModel>,
    corpus: RwLock<TrainingCorpus>,
    trained: AtomicBool,
    max_examples: usize,
}

impl LlmSqlGenerator {
    pub fn new(completion: Arc<dyn CompletionModel>, max_examples: usize) -> Self {
        Self {
            completion,
            corpus: RwLock::new(TrainingCorpus::default()),
            trained: AtomicBool::new(false),
            max_examples,
        }
    }

    pub async fn train_on_schema(&self, executor: &dyn SqlExecutor) {
        match introspect_schema(executor).await {
            Ok(ddl) => {
                info!("Trained on {} tables", ddl.len());
                self.corpus.write().await.ddl.extend(ddl);
            }
            Err(e) => warn!("Failed to train on schema: {e:#}"),
        }
    }

    pub async fn train_on_documentation(&self, documentation: &str) {
        let documentation = documentation.trim();
        if documentation.is_empty() {
            warn!("Skipping empty documentation");
            return;
        }
        self.corpus
            .write()
            .await
            .documentation
            .push(documentation.to_string());
        info!("Trained on documentation");
    }

    pub async fn train_on_examples(&self, examples: Vec<TrainingExample>) {
        let count = examples.len();
        self.corpus.write().await.examples.extend(examples);
        info!("Trained on {count} example queries");
    }

    /// Run every training step and mark the generator ready. A failing step is
    /// logged and skipped.
    pub async fn complete_training(
        &self,
        executor: &dyn SqlExecutor,
        documentation: &str,
        examples: Vec<TrainingExample>,
    ) {
        self.train_on_schema(executor).await;
        self.train_on_documentation(documentation).await;
        self.train_on_examples(examples).await;
        self.trained.store(true, Ordering::SeqCst);
        info!("SQL generator training complete");
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    fn is_ready(&self) -> bool {
        self.trained.load(Ordering::SeqCst)
    }

    async fn generate(&self, question: &str) -> anyhow::Result<String> {
        if !self.is_ready() {
            anyhow::bail!("SQL generator has not been trained yet");
        }

        let messages = {
            let corpus = self.corpus.read().await;
            build_messages(&corpus, question, self.max_examples)
        };
        let result = self.completion.complete(&messages, None, Some(0.0)).await?;

        extract_sql(&result.content).ok_or_else(|| {
            anyhow::anyhow!("model response did not contain SQL: {}", result.content.trim())
        })
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Assemble the prompt: schema and documentation in the system message, the
/// most similar examples as prior turns, then the question.
pub fn build_messages(
    corpus: &TrainingCorpus,
    question: &str,
    max_examples: usize,
) -> Vec<Message> {
    let mut system = SYSTEM_PROMPT.to_string();
    if !corpus.ddl.is_empty() {
        system.push_str("\n\n===Tables\n");
        system.push_str(&corpus.ddl.join("\n\n"));
    }
    if !corpus.documentation.is_empty() {
        system.push_str("\n\n===Additional Context\n");
        system.push_str(&corpus.documentation.join("\n\n"));
    }

    let question_words = words(question);
    let mut ranked: Vec<(usize, &TrainingExample)> = corpus
        .examples
        .iter()
        .map(|e| (words(&e.question).intersection(&question_words).count(), e))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut messages = vec![Message::system(system)];
    for (_, example) in ranked.into_iter().take(max_examples) {
        messages.push(Message::user(example.question.clone()));
        messages.push(Message::assistant(example.sql.clone()));
    }
    messages.push(Message::user(question));
    messages
}

/// Pull the SQL statement out of a model response.
pub fn extract_sql(response: &str) -> Option<String> {
    let sql = if let Some(start) = response.find("```sql") {
        let body = &response[start + "```sql".len()..];
        body.split("```").next().unwrap_or(body)
    } else if let Some(start) = response.find("```") {
        let body = &response[start + 3..];
        body.split("```").next().unwrap_or(body)
    } else {
        statement_start(response).map(|i| {
            let rest = &response[i..];
            match rest.find(';') {
                Some(end) => &rest[..=end],
                None => rest,
            }
        })?
    };

    let sql = sql.trim();
    if sql.is_empty() {
        None
    } else {
        Some(sql.to_string())
    }
}

fn statement_start(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();

    let mut offset = 0;
    for line in lower.split_inclusive('\n') {
        let start = offset + (line.len() - line.trim_start().len());
        if is_cte_start(&lower[start..]) {
            return Some(start);
        }
        offset += line.len();
    }

    lower.match_indices("select").map(|(i, _)| i).find(|&i| {
        let before_ok = i == 0 || !lower.as_bytes()[i - 1].is_ascii_alphanumeric();
        let after = lower.as_bytes().get(i + "select".len());
        let after_ok = after.map_or(true, |b| !b.is_ascii_alphanumeric());
        before_ok && after_ok
    })
}

/// `with [recursive] <name> [(<columns>)] as (` in lowercase text.
fn is_cte_start(text: &str) -> bool {
    let Some(rest) = text.strip_prefix("with ") else {
        return false;
    };
    let rest = rest.trim_start();
    if rest.starts_with("recursive ") {
        return true;
    }

    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return false;
    }
    let mut rest = rest[name_len..].trim_start();
    if rest.starts_with('(') {
        match rest.find(')') {
            Some(end) => rest = rest[end + 1..].trim_start(),
            None => return false,
        }
    }
    rest.strip_prefix("as")
        .is_some_and(|after| after.trim_start().starts_with('('))
}
