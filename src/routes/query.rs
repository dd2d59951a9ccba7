use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::models::api::DocumentQueryParams;
use crate::rag::RagAnswer;
use crate::routes::ApiQuery;

/// Document question-answering routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/query/documents", post(query_documents))
}

/// POST /query/documents - Answer a question from the indexed documents.
async fn query_documents(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<DocumentQueryParams>,
) -> Result<Json<RagAnswer>, ApiError> {
    let rag = state.rag()?;

    let question = params.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }
    let top_k = params.top_k.unwrap_or(state.settings.default_top_k);
    if top_k == 0 {
        return Err(ApiError::bad_request("top_k must be at least 1"));
    }

    let answer = rag
        .generate_answer(question, top_k, &state.settings.namespace)
        .await
        .map_err(|e| ApiError::internal("Query failed", format!("{e:#}")))?;
    Ok(Json(answer))
}
