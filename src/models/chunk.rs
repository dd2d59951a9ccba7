use serde::{Deserialize, Deserializer, Serialize};

/// A raw chunk from parsing (before embedding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub chunk_index: usize,
    pub token_count: usize,
}

impl Chunk {
    pub fn new(text: String, chunk_index: usize) -> Self {
        let token_count = estimate_tokens(&text);
        Self {
            text,
            chunk_index,
            token_count,
        }
    }

    /// Convert to a vector record keyed by source file and position.
    pub fn into_record(self, filename: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: format!("{filename}-chunk-{}", self.chunk_index),
            values: embedding,
            metadata: ChunkMetadata {
                text: self.text,
                filename: filename.to_string(),
                chunk_index: self.chunk_index,
                token_count: self.token_count,
            },
        }
    }
}

/// Rough token estimate (about four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Metadata stored alongside each vector in the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub chunk_index: usize,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub token_count: usize,
}

/// The vector index hands numeric metadata back as floats.
fn lenient_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .map(|n| n as usize)
        .ok_or_else(|| {
            serde::de::Error::custom(format!("expected a non-negative number, got {value}"))
        })
}

/// A chunk with its embedding, ready to upsert.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}
