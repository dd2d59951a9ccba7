use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::chunk::{ScoredChunk, VectorRecord};
use crate::vector_store::VectorStore;

const UPSERT_BATCH_SIZE: usize = 100;

/// Pinecone serverless index accessed over its REST data plane.
pub struct PineconeStore {
    api_key: String,
    index_url: String,
    http_client: reqwest::Client,
}

/// Index description returned by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: u32,
    pub host: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredChunk>,
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

impl PineconeStore {
    pub fn new(api_key: &str, index_host: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            index_url: normalize_host(index_host),
            http_client: reqwest::Client::new(),
        }
    }

    /// Look up the index by name on the control plane and connect to its host.
    pub async fn connect(
        api_key: &str,
        index_name: &str,
        control_plane_url: &str,
    ) -> anyhow::Result<(Self, IndexDescription)> {
        let url = format!(
            "{}/indexes/{index_name}",
            control_plane_url.trim_end_matches('/')
        );
        let resp = reqwest::Client::new()
            .get(&url)
            .header("Api-Key", api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone describe_index error ({status}): {body}");
        }

        let description: IndexDescription = resp.json().await?;
        info!(
            "Connected to Pinecone index {} (dimension={}, host={})",
            description.name, description.dimension, description.host
        );
        Ok((Self::new(api_key, &description.host), description))
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> anyhow::Result<reqwest::Response> {
        let resp = self
            .http_client
            .post(format!("{}{path}", self.index_url))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone API error on {path} ({status}): {body}");
        }
        Ok(resp)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> anyhow::Result<usize> {
        let mut total = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch,
                namespace,
            };
            let response: UpsertResponse = self
                .post("/vectors/upsert", &request)
                .await?
                .json()
                .await?;
            debug!("Upserted {} vectors into namespace {namespace}", response.upserted_count);
            total += response.upserted_count;
        }
        Ok(total)
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let request = QueryRequest {
            vector: embedding,
            top_k,
            namespace,
            include_metadata: true,
            include_values: false,
        };
        let response: QueryResponse = self.post("/query", &request).await?.json().await?;
        Ok(response.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk::Chunk;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[tokio::test]
    async fn test_connect_resolves_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/docs"))
            .and(header("Api-Key", "pc-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "docs",
                "dimension": 1536,
                "metric": "cosine",
                "host": server.uri(),
                "status": {"ready": true, "state": "Ready"}
            })))
            .mount(&server)
            .await;

        let (store, description) = PineconeStore::connect("pc-key", "docs", &server.uri())
            .await
            .unwrap();
        assert_eq!(description.dimension, 1536);
        assert_eq!(store.index_url, server.uri());
    }

    #[tokio::test]
    async fn test_upsert_batches_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(body_partial_json(serde_json::json!({"namespace": "default"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"upsertedCount": 100})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"upsertedCount": 50})),
            )
            .mount(&server)
            .await;

        let records: Vec<VectorRecord> = (0..150)
            .map(|i| Chunk::new(format!("chunk {i}"), i).into_record("doc.txt", vec![0.1, 0.2]))
            .collect();
        let store = PineconeStore::new("pc-key", &server.uri());
        let written = store.upsert(&records, "default").await.unwrap();
        assert_eq!(written, 150);
    }

    #[tokio::test]
    async fn test_query_returns_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({
                "topK": 2,
                "namespace": "default",
                "includeMetadata": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [
                    {
                        "id": "a.txt-chunk-0",
                        "score": 0.92,
                        "metadata": {"text": "first", "filename": "a.txt", "chunk_index": 0.0, "token_count": 2.0}
                    },
                    {
                        "id": "b.txt-chunk-4",
                        "score": 0.71,
                        "metadata": {"text": "second", "filename": "b.txt", "chunk_index": 4.0, "token_count": 3.0}
                    }
                ],
                "namespace": "default"
            })))
            .mount(&server)
            .await;

        let store = PineconeStore::new("pc-key", &server.uri());
        let matches = store.query(&[0.1, 0.2], 2, "default").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].metadata.filename, "b.txt");
        assert_eq!(matches[1].metadata.chunk_index, 4);
    }

    #[tokio::test]
    async fn test_query_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Vector dimension 2 does not match"),
            )
            .mount(&server)
            .await;

        let store = PineconeStore::new("pc-key", &server.uri());
        let err = store.query(&[0.1, 0.2], 3, "default").await.unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
