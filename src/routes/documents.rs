use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::models::api::{DocumentListResponse, UploadResponse};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Document upload and listing routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_document))
        .route("/documents", get(list_documents))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// POST /upload - Save, parse, chunk, embed and index a document.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let rag = state.rag()?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Uploaded file has no filename"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        upload = Some((filename, data));
        break;
    }
    let (filename, data) =
        upload.ok_or_else(|| ApiError::bad_request("Missing multipart field 'file'"))?;

    let stored = state.storage.save(&filename, &data).await?;
    info!("Saved upload {} ({} bytes)", stored.filename, stored.size_bytes);

    let summary = rag
        .ingest_document(&data, &stored.filename, &state.settings.namespace)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            status: "success".to_string(),
            message: format!(
                "Document processed and {} chunks stored in Pinecone",
                summary.chunks_created
            ),
            filename: stored.filename,
            file_size_bytes: stored.size_bytes,
            chunks_created: summary.chunks_created,
            total_tokens: summary.total_tokens,
        }),
    ))
}

/// GET /documents - List uploaded files.
async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = state
        .storage
        .list()
        .await
        .map_err(|e| ApiError::internal("Failed to list documents", e))?;

    Ok(Json(DocumentListResponse {
        total_documents: documents.len(),
        documents,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;

    #[tokio::test]
    async fn test_list_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("sales.csv"), b"region,total\nwest,10\n").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"").unwrap();

        let state = test_support::state(dir.path(), None, None);
        let Json(body) = list_documents(State(state)).await.unwrap();
        assert_eq!(body.total_documents, 1);
        assert_eq!(body.documents[0].filename, "sales.csv");
        assert_eq!(body.documents[0].size_bytes, 21);
    }
}
