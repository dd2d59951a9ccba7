use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sql::approval::PendingQuery;
use crate::storage::StoredFile;

// ──────────────────────────── Service ────────────────────────────

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub documentation: String,
    pub health_check: String,
    pub system_info: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub application: ApplicationInfo,
    pub features: BTreeMap<String, String>,
    pub system: SystemInfo,
    pub endpoints: BTreeMap<String, String>,
}

// ──────────────────────────── Documents ────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub filename: String,
    pub file_size_bytes: u64,
    pub chunks_created: usize,
    pub total_tokens: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub total_documents: usize,
    pub documents: Vec<StoredFile>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQueryParams {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

// ──────────────────────────── SQL ────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateSqlParams {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSqlParams {
    pub query_id: String,
    #[serde(default = "default_true")]
    pub approved: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub total_pending: usize,
    pub pending_queries: Vec<PendingQuery>,
}
