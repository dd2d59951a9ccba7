use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::models::api::{ExecuteSqlParams, GenerateSqlParams, PendingListResponse};
use crate::routes::ApiQuery;
use crate::sql::approval::{QueryStatus, Submission};

/// Approval-gated text-to-SQL routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/query/sql/generate", post(generate_sql))
        .route("/query/sql/execute", post(execute_sql))
        .route("/query/sql/pending", get(list_pending))
}

/// POST /query/sql/generate - Generate SQL and hold it for approval.
async fn generate_sql(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<GenerateSqlParams>,
) -> Result<Json<Submission>, ApiError> {
    let submission = state.sql()?.submit_for_approval(&params.question).await?;
    Ok(Json(submission))
}

/// POST /query/sql/execute - Approve (run) or reject a pending query.
///
/// A failed execution still consumes the query and is returned as a 400 with
/// the structured result as body.
async fn execute_sql(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ExecuteSqlParams>,
) -> Result<Response, ApiError> {
    let resolution = state
        .sql()?
        .resolve(&params.query_id, params.approved)
        .await?;

    let status = match resolution.status() {
        QueryStatus::Error => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    Ok((status, Json(resolution)).into_response())
}

/// GET /query/sql/pending - List queries awaiting approval.
async fn list_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PendingListResponse>, ApiError> {
    let pending_queries = state.sql()?.list_pending().await;
    Ok(Json(PendingListResponse {
        total_pending: pending_queries.len(),
        pending_queries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{build_router, test_support};
    use crate::sql::approval::ApprovalStore;
    use crate::sql::{Row, SqlExecutor, SqlGenerator};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct CountingGenerator;

    #[async_trait]
    impl SqlGenerator for CountingGenerator {
        fn is_ready(&self) -> bool {
            true
        }

        async fn generate(&self, _question: &str) -> anyhow::Result<String> {
            Ok("SELECT COUNT(*) AS customer_count FROM customers".to_string())
        }
    }

    struct FixedExecutor {
        fail: bool,
    }

    #[async_trait]
    impl SqlExecutor for FixedExecutor {
        async fn execute(&self, _sql: &str) -> anyhow::Result<Vec<Row>> {
            if self.fail {
                anyhow::bail!("relation \"customers\" does not exist");
            }
            let mut row = Row::new();
            row.insert("customer_count".to_string(), serde_json::json!(42));
            Ok(vec![row])
        }
    }

    fn sql_state(dir: &std::path::Path, fail: bool) -> Arc<AppState> {
        let store = ApprovalStore::new(
            Arc::new(CountingGenerator),
            Arc::new(FixedExecutor { fail }),
            Duration::from_secs(5),
        );
        test_support::state(dir, None, Some(store))
    }

    async fn submit(state: &Arc<AppState>) -> String {
        let params = GenerateSqlParams {
            question: "How many customers do we have?".to_string(),
        };
        let Json(submission) = generate_sql(State(state.clone()), ApiQuery(params))
            .await
            .unwrap();
        submission.query_id
    }

    fn execute_params(query_id: &str, approved: bool) -> ApiQuery<ExecuteSqlParams> {
        ApiQuery(ExecuteSqlParams {
            query_id: query_id.to_string(),
            approved,
        })
    }

    #[tokio::test]
    async fn test_generate_list_execute_flow() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = sql_state(dir.path(), false);
        let query_id = submit(&state).await;

        let Json(pending) = list_pending(State(state.clone())).await.unwrap();
        assert_eq!(pending.total_pending, 1);
        assert_eq!(pending.pending_queries[0].id, query_id);

        let response = execute_sql(State(state.clone()), execute_params(&query_id, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::json_body(response).await;
        assert_eq!(body["status"], "executed");
        assert_eq!(body["result_count"], 1);
        assert_eq!(body["results"][0]["customer_count"], 42);

        let err = execute_sql(State(state.clone()), execute_params(&query_id, true))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reject_returns_ok() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = sql_state(dir.path(), false);
        let query_id = submit(&state).await;

        let response = execute_sql(State(state.clone()), execute_params(&query_id, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::json_body(response).await;
        assert_eq!(body["status"], "rejected");

        let Json(pending) = list_pending(State(state)).await.unwrap();
        assert_eq!(pending.total_pending, 0);
    }

    #[tokio::test]
    async fn test_execution_error_is_structured_bad_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = sql_state(dir.path(), true);
        let query_id = submit(&state).await;

        let response = execute_sql(State(state), execute_params(&query_id, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::json_body(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["query_id"], query_id.as_str());
        assert!(body["error"].as_str().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_empty_question_is_bad_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = sql_state(dir.path(), false);
        let params = GenerateSqlParams {
            question: "   ".to_string(),
        };
        let err = generate_sql(State(state), ApiQuery(params)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_string_is_json_bad_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = Request::post("/query/sql/execute?query_id=abc&approved=maybe")
            .body(Body::empty())
            .unwrap();
        let response = build_router(sql_state(dir.path(), false))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body = test_support::json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("approved"));
    }

    #[tokio::test]
    async fn test_missing_question_is_json_bad_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = Request::post("/query/sql/generate").body(Body::empty()).unwrap();
        let response = build_router(sql_state(dir.path(), false))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("missing field `question`"));
    }

    #[tokio::test]
    async fn test_sql_routes_unavailable_without_service() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = test_support::state(dir.path(), None, None);
        let err = list_pending(State(state)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
