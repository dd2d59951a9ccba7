use std::sync::Arc;

use crate::config::Settings;
use crate::error::ApiError;
use crate::rag::RagService;
use crate::sql::approval::ApprovalStore;
use crate::storage::Storage;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub settings: Settings,
    pub storage: Arc<dyn Storage>,
    /// Present when OpenAI and Pinecone are configured.
    pub rag: Option<Arc<RagService>>,
    /// Present when the database is reachable and OpenAI is configured.
    pub sql: Option<Arc<ApprovalStore>>,
}

impl AppState {
    pub fn rag(&self) -> Result<&RagService, ApiError> {
        self.rag.as_deref().ok_or_else(|| {
            ApiError::unavailable(
                "RAG service not initialized. Please configure API keys in .env file.",
            )
        })
    }

    pub fn sql(&self) -> Result<&ApprovalStore, ApiError> {
        self.sql.as_deref().ok_or_else(|| {
            ApiError::unavailable(
                "SQL service not initialized. Please configure DATABASE_URL in .env file.",
            )
        })
    }
}
