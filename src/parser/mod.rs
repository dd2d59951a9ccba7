pub mod api;
pub mod extract;

use thiserror::Error;
use tracing::info;

use crate::models::chunk::Chunk;
use api::ApiParser;
use extract::ExtractError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("parser API error: {0:#}")]
    Remote(anyhow::Error),
}

/// Turns uploaded files into chunks. Extraction runs locally unless parse API
/// endpoints are configured.
pub struct DocumentParser {
    remote: Option<ApiParser>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentParser {
    pub fn new(api_endpoints: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Self {
        let remote = if api_endpoints.is_empty() {
            None
        } else {
            Some(ApiParser::new(api_endpoints))
        };
        Self {
            remote,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Extract plain text from a document.
    pub async fn parse_document(
        &self,
        file_bytes: &[u8],
        filename: &str,
    ) -> Result<String, ParseError> {
        match &self.remote {
            Some(api) => api
                .parse_document(file_bytes, filename)
                .await
                .map_err(ParseError::Remote),
            None => Ok(extract::extract_text(file_bytes, filename)?),
        }
    }

    /// Parse a document and split into chunks.
    pub async fn parse_and_chunk(
        &self,
        file_bytes: &[u8],
        filename: &str,
    ) -> Result<Vec<Chunk>, ParseError> {
        let text = self.parse_document(file_bytes, filename).await?;
        let chunks = chunk_text(&text, self.chunk_size, self.chunk_overlap);
        info!("Parsed {} into {} chunks", filename, chunks.len());
        Ok(chunks)
    }
}

/// Split text and number the resulting chunks, dropping blank ones.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    split_text(text, chunk_size, chunk_overlap)
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .enumerate()
        .map(|(i, c)| Chunk::new(c, i))
        .collect()
}

/// Text chunking using recursive character splitting.
/// Splits text into chunks of approximately `chunk_size` characters
/// with `chunk_overlap` character overlap.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    let chunk_size = chunk_size.max(1);
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let separators = ["\n\n", "\n", ". ", " ", ""];
    recursive_split(text, &separators, chunk_size, chunk_overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s`.
fn char_tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

fn recursive_split(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    if char_len(text) <= chunk_size || separators.is_empty() {
        return vec![text.to_string()];
    }

    let separator = separators[0];
    let remaining_separators = &separators[1..];

    if separator.is_empty() {
        // Character-level split as fallback.
        let chars: Vec<char> = text.chars().collect();
        let step = chunk_size.saturating_sub(chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end >= chars.len() {
                break;
            }
            start += step;
        }
        return chunks;
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for part in text.split(separator) {
        let candidate = if current.is_empty() {
            part.to_string()
        } else {
            format!("{current}{separator}{part}")
        };

        if char_len(&candidate) > chunk_size {
            if !current.is_empty() {
                if char_len(&current) > chunk_size {
                    chunks.extend(recursive_split(
                        &current,
                        remaining_separators,
                        chunk_size,
                        chunk_overlap,
                    ));
                } else {
                    chunks.push(current.clone());
                }
                // Start new chunk with overlap.
                current = format!("{}{separator}{part}", char_tail(&current, chunk_overlap));
            } else {
                // Single part bigger than chunk_size.
                chunks.extend(recursive_split(
                    part,
                    remaining_separators,
                    chunk_size,
                    chunk_overlap,
                ));
                current = String::new();
            }
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        if char_len(&current) > chunk_size {
            chunks.extend(recursive_split(
                &current,
                remaining_separators,
                chunk_size,
                chunk_overlap,
            ));
        } else {
            chunks.push(current);
        }
    }

    chunks
}
