use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use trace2pass_common::{AnomalyReport, Fingerprint};

use crate::error::CollectorError;
use crate::metrics::Metrics;
use crate::store::{CollectorRecord, CollectorStats, CollectorStore};

pub struct AppState {
    pub store: CollectorStore,
    pub metrics: Metrics,
    pub default_queue_limit: i64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/report", post(submit_report))
        .route("/api/v1/queue", get(get_queue))
        .route("/api/v1/reports/{id}", get(get_report))
        .route("/api/v1/reports/{id}", delete(delete_report))
        .route("/api/v1/reports", delete(delete_all_reports))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/health", get(healthz))
        .with_state(state)
}

#[derive(Serialize)]
struct SubmitResponse {
    id: String,
    is_new: bool,
}

async fn submit_report(
    State(state): State<Arc<AppState>>,
    Json(report): Json<AnomalyReport>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let fingerprint = Fingerprint::of(&report).to_string();
    let now_ns = report.timestamp_ns as i64;

    let is_new = state
        .store
        .upsert(&fingerprint, &report, now_ns)
        .await
        .inspect_err(|_| state.metrics.record_rejected())?;
    state.metrics.record_report(report.kind, is_new);

    Ok(Json(SubmitResponse {
        id: fingerprint,
        is_new,
    }))
}

#[derive(Deserialize)]
struct QueueQuery {
    limit: Option<i64>,
}

async fn get_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Vec<CollectorRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(state.default_queue_limit);
    let records = state.store.queue(limit).await?;
    Ok(Json(records))
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CollectorRecord>, ApiError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(CollectorError::NotFound(id)))
}

async fn delete_report(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if state.store.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(CollectorError::NotFound(id)))
    }
}

#[derive(Serialize)]
struct PurgeResponse {
    deleted: u64,
}

async fn delete_all_reports(State(state): State<Arc<AppState>>) -> Result<Json<PurgeResponse>, ApiError> {
    let deleted = state.store.delete_all().await?;
    Ok(Json(PurgeResponse { deleted }))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<CollectorStats>, ApiError> {
    Ok(Json(state.store.stats().await?))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Wraps [`CollectorError`] so it can be returned directly from axum
/// handlers; carries a stable error code alongside the message (§6).
struct ApiError(CollectorError);

impl From<CollectorError> for ApiError {
    fn from(err: CollectorError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CollectorError::Rejected(_) => (StatusCode::BAD_REQUEST, "rejected"),
            CollectorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CollectorError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        };
        let body = ErrorBody {
            code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;
    use trace2pass_common::{AnomalyReportBuilder, CheckDetails};

    async fn test_state() -> Arc<AppState> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let store = CollectorStore::from_pool(pool).await.unwrap();
        Arc::new(AppState {
            store,
            metrics: Metrics::new(),
            default_queue_limit: 50,
        })
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_then_lookup_round_trips() {
        let app = router(test_state().await);
        let report = AnomalyReportBuilder::new(
            CheckDetails::ArithOverflow {
                expr: "a * b".to_string(),
                lhs: 1,
                rhs: 2,
            },
            0,
            1,
            1,
        )
        .finish();
        let body = serde_json::to_vec(&report).unwrap();

        let submit_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/report")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(submit_response.status(), StatusCode::OK);

        let queue_response = app
            .oneshot(Request::builder().uri("/api/v1/queue").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(queue_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_report_returns_not_found() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/api/v1/reports/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
