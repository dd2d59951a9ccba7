pub mod pinecone;

use async_trait::async_trait;

use crate::models::chunk::{ScoredChunk, VectorRecord};

/// Abstract vector store interface.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store chunk vectors in `namespace`. Returns the number of vectors written.
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> anyhow::Result<usize>;

    /// Find the `top_k` chunks most similar to `embedding`, best first.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> anyhow::Result<Vec<ScoredChunk>>;
}
