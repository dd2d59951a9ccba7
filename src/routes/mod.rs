pub mod documents;
pub mod health;
pub mod query;
pub mod sql;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::Router;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

/// Query-string extractor whose rejection is rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Build all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(query::routes())
        .merge(sql::routes())
        .with_state(state)
}
