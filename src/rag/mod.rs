//! Document ingestion and retrieval-augmented answering.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::completion::{CompletionModel, Message};
use crate::embedding::EmbeddingModel;
use crate::models::chunk::ScoredChunk;
use crate::parser::{DocumentParser, ParseError};
use crate::vector_store::VectorStore;

const PREVIEW_CHARS: usize = 200;

const NO_DOCUMENTS_ANSWER: &str =
    "I couldn't find any relevant documents to answer this question. Try uploading documents first.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the \
document excerpts provided as context. Cite the excerpts you rely on as [Source n]. If the \
context does not contain the answer, say that you don't know instead of guessing.";

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub chunks_created: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub filename: String,
    pub chunk_index: usize,
    pub score: f64,
    pub text_preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub chunks_retrieved: usize,
    pub model: String,
}

pub struct RagService {
    parser: DocumentParser,
    embedding_model: Arc<dyn EmbeddingModel>,
    vector_store: Arc<dyn VectorStore>,
    completion_model: Arc<dyn CompletionModel>,
}

impl RagService {
    pub fn new(
        parser: DocumentParser,
        embedding_model: Arc<dyn EmbeddingModel>,
        vector_store: Arc<dyn VectorStore>,
        completion_model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            parser,
            embedding_model,
            vector_store,
            completion_model,
        }
    }

    /// Parse, chunk, embed and upsert a document.
    pub async fn ingest_document(
        &self,
        file_bytes: &[u8],
        filename: &str,
        namespace: &str,
    ) -> Result<IngestSummary, RagError> {
        let chunks = self.parser.parse_and_chunk(file_bytes, filename).await?;
        if chunks.is_empty() {
            info!("No text extracted from {filename}; nothing to index");
            return Ok(IngestSummary {
                chunks_created: 0,
                total_tokens: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedding_model.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(anyhow::anyhow!(
                "embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            )
            .into());
        }

        let total_tokens = chunks.iter().map(|c| c.token_count).sum();
        let records: Vec<_> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk.into_record(filename, embedding))
            .collect();
        let chunks_created = records.len();

        let written = self.vector_store.upsert(&records, namespace).await?;
        info!("Indexed {filename}: {chunks_created} chunks, {written} vectors written");

        Ok(IngestSummary {
            chunks_created,
            total_tokens,
        })
    }

    /// Answer a question from the `top_k` most similar chunks.
    pub async fn generate_answer(
        &self,
        question: &str,
        top_k: usize,
        namespace: &str,
    ) -> anyhow::Result<RagAnswer> {
        let query_embedding = self.embedding_model.embed_query(question).await?;
        let matches = self
            .vector_store
            .query(&query_embedding, top_k, namespace)
            .await?;
        debug!("Retrieved {} chunks for question", matches.len());

        let model = self.completion_model.model_name().to_string();
        if matches.is_empty() {
            return Ok(RagAnswer {
                question: question.to_string(),
                answer: NO_DOCUMENTS_ANSWER.to_string(),
                sources: vec![],
                chunks_retrieved: 0,
                model,
            });
        }

        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "Context:\n\n{}\n\nQuestion: {question}\n\nAnswer:",
                build_context(&matches)
            )),
        ];
        let completion = self.completion_model.complete(&messages, None, None).await?;
        if let Some(usage) = &completion.usage {
            debug!(
                "RAG completion used {} tokens ({} prompt, {} completion)",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(RagAnswer {
            question: question.to_string(),
            answer: completion.content.trim().to_string(),
            chunks_retrieved: matches.len(),
            sources: matches.iter().map(source_ref).collect(),
            model,
        })
    }
}

fn build_context(matches: &[ScoredChunk]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("[Source {}: {}]\n{}", i + 1, m.metadata.filename, m.metadata.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn source_ref(chunk: &ScoredChunk) -> SourceRef {
    let text = &chunk.metadata.text;
    let text_preview = if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.clone()
    };
    SourceRef {
        filename: chunk.metadata.filename.clone(),
        chunk_index: chunk.metadata.chunk_index,
        score: chunk.score,
        text_preview,
    }
}
