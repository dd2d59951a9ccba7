use tracing::{info, warn};

/// API-mode parser that offloads text extraction to external parse servers.
pub struct ApiParser {
    api_endpoints: Vec<String>,
    http_client: reqwest::Client,
}

impl ApiParser {
    pub fn new(api_endpoints: Vec<String>) -> Self {
        Self {
            api_endpoints: api_endpoints
                .into_iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Send the document to each endpoint in turn until one returns text.
    pub async fn parse_document(
        &self,
        file_bytes: &[u8],
        filename: &str,
    ) -> anyhow::Result<String> {
        if self.api_endpoints.is_empty() {
            anyhow::bail!("No API endpoints configured for parser");
        }

        let mut last_error = None;
        for endpoint in &self.api_endpoints {
            match self.parse_with(endpoint, file_bytes, filename).await {
                Ok(text) => {
                    info!("Parsed {filename} via {endpoint} ({} chars)", text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Parser endpoint {endpoint} failed: {e:#}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no parser endpoint succeeded")))
    }

    async fn parse_with(
        &self,
        endpoint: &str,
        file_bytes: &[u8],
        filename: &str,
    ) -> anyhow::Result<String> {
        let part = reqwest::multipart::Part::bytes(file_bytes.to_vec())
            .file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http_client
            .post(format!("{endpoint}/parse"))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Parser API error ({status}): {body}");
        }

        let result: serde_json::Value = resp.json().await?;
        Ok(result
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_parse_document_via_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "parsed body"})),
            )
            .mount(&server)
            .await;

        let parser = ApiParser::new(vec![format!("{}/", server.uri())]);
        let text = parser.parse_document(b"%PDF-1.4", "doc.pdf").await.unwrap();
        assert_eq!(text, "parsed body");
    }

    #[tokio::test]
    async fn test_falls_back_to_next_endpoint() {
        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&broken)
            .await;
        let healthy = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "ok"})),
            )
            .mount(&healthy)
            .await;

        let parser = ApiParser::new(vec![broken.uri(), healthy.uri()]);
        assert_eq!(parser.parse_document(b"data", "a.docx").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_all_endpoints_failing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let parser = ApiParser::new(vec![server.uri()]);
        let err = parser.parse_document(b"data", "a.pdf").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
