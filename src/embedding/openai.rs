use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingModel;

/// OpenAI embedding model via API.
pub struct OpenAIEmbeddingModel {
    model_name: String,
    api_key: String,
    base_url: String,
    dimensions: u32,
    http_client: reqwest::Client,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbeddingModel {
    pub fn new(
        model_name: &str,
        api_key: &str,
        base_url: &str,
        dimensions: u32,
        batch_size: usize,
    ) -> Self {
        Self {
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
            http_client: reqwest::Client::new(),
            batch_size: batch_size.max(1),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
        };

        let resp = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embedding API error ({status}): {body}");
        }

        let response: EmbeddingResponse = resp.json().await?;
        if response.data.len() != texts.len() {
            anyhow::bail!(
                "OpenAI returned {} embeddings for {} inputs",
                response.data.len(),
                texts.len()
            );
        }

        let embeddings: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        for emb in &embeddings {
            if emb.len() != self.dimensions as usize {
                anyhow::bail!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    emb.len()
                );
            }
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            debug!("Embedding batch of {} texts", batch.len());
            all_embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, query: &str) -> anyhow::Result<Vec<f32>> {
        let results = self.embed_batch(&[query.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned for query"))
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }
}
