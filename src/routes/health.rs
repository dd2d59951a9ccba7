use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::models::api::{ApplicationInfo, HealthResponse, InfoResponse, RootResponse, SystemInfo};

const SERVICE_NAME: &str = "Multi-Source RAG + Text-to-SQL API";

/// Service metadata routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/info", get(info))
}

/// GET /
async fn root(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("Welcome to {SERVICE_NAME}"),
        version: state.settings.version.clone(),
        status: "running".to_string(),
        documentation: "/info".to_string(),
        health_check: "/health".to_string(),
        system_info: "/info".to_string(),
    })
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: state.settings.version.clone(),
    })
}

fn availability(enabled: bool) -> String {
    let status = if enabled { "available" } else { "not configured" };
    status.to_string()
}

/// GET /info
async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let features = BTreeMap::from([
        ("document_rag".to_string(), availability(state.rag.is_some())),
        ("text_to_sql".to_string(), availability(state.sql.is_some())),
        ("query_routing".to_string(), "not implemented".to_string()),
        ("evaluation".to_string(), "not implemented".to_string()),
    ]);

    let endpoints = [
        ("health", "GET /health"),
        ("info", "GET /info"),
        ("upload_document", "POST /upload"),
        ("query_documents", "POST /query/documents"),
        ("list_documents", "GET /documents"),
        ("generate_sql", "POST /query/sql/generate"),
        ("execute_sql", "POST /query/sql/execute"),
        ("pending_sql_queries", "GET /query/sql/pending"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(InfoResponse {
        application: ApplicationInfo {
            name: "Multi-Source RAG + Text-to-SQL".to_string(),
            version: state.settings.version.clone(),
            environment: state.settings.environment.clone(),
        },
        features,
        system: SystemInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        },
        endpoints,
    })
}
