//! HTTP API handlers for the AI Manager.
//!
//! - **POST /ai-manager**: Runs the job once and returns the summary.
//! - **GET /reports/recent**: Latest persisted reports.
//! - **GET /referral-logs/recent**: Latest fraud audit entries.
//! - **GET /sellers/:seller_id/suggestions**: Suggestions for one seller.
//!
//! All routes accept cross-origin requests from any origin so the admin
//! dashboard can call them directly.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::error::JobError;
use crate::insight::InsightProvider;
use crate::job::{JobSettings, run_ai_manager};
use crate::model::{RecentQuery, ReferralLog, Report, RunRequest, RunSummary, Suggestion};
use crate::storage::{MarketplaceStore, Storage};

/// Reports returned by /reports/recent when no limit is given.
const DEFAULT_REPORT_LIMIT: u32 = 10;

/// Log entries returned by /referral-logs/recent when no limit is given.
const DEFAULT_LOG_LIMIT: u32 = 50;

/// Upper bound for any `limit` query parameter.
const MAX_LIMIT: u32 = 500;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub insight: Arc<dyn InsightProvider>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<JobSettings>,
}

/// Build the application router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ai-manager", post(run_job))
        .route("/reports/recent", get(get_recent_reports))
        .route("/referral-logs/recent", get(get_recent_referral_logs))
        .route("/sellers/:seller_id/suggestions", get(get_seller_suggestions))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// POST /ai-manager - Run fraud detection and reporting once.
///
/// # Request Body
///
/// ```json
/// { "action": "run" }
/// ```
///
/// # Response
///
/// ```json
/// {
///     "success": true,
///     "report": "AI MANAGER WEEKLY REPORT\n...",
///     "fraudDetected": 2,
///     "lowPerformingAds": 1
/// }
/// ```
///
/// A body that is not JSON or lacks `action`, or a run that dies, yields
/// `500` with `{ "error": "<message>" }`.
#[instrument(skip(state, body))]
pub async fn run_job(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RunSummary>, JobError> {
    let request: RunRequest = serde_json::from_slice(&body)?;
    info!(action = %request.action, "AI Manager triggered");

    // Run on its own task so a panic becomes an error response
    let now = state.clock.now();
    let summary = tokio::spawn(async move {
        run_ai_manager(
            &state.storage,
            state.insight.as_ref(),
            now,
            &state.settings,
        )
        .await
    })
    .await
    .map_err(|e| anyhow::anyhow!("AI Manager run aborted: {e}"))?;

    Ok(Json(summary))
}

/// GET /reports/recent - Latest reports, newest first.
///
/// # Query Parameters
///
/// - `limit` (optional): Number of reports (default: 10)
#[instrument(skip(state))]
pub async fn get_recent_reports(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Report>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT).min(MAX_LIMIT);

    match state.storage.list_recent_reports(limit).await {
        Ok(reports) => {
            info!(count = reports.len(), "Reports queried");
            Ok(Json(reports))
        }
        Err(e) => {
            warn!(error = %e, "Failed to list reports");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /referral-logs/recent - Latest fraud audit entries, newest first.
///
/// # Query Parameters
///
/// - `limit` (optional): Number of entries (default: 50)
#[instrument(skip(state))]
pub async fn get_recent_referral_logs(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ReferralLog>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LIMIT);

    match state.storage.list_recent_referral_logs(limit).await {
        Ok(logs) => {
            info!(count = logs.len(), "Referral logs queried");
            Ok(Json(logs))
        }
        Err(e) => {
            warn!(error = %e, "Failed to list referral logs");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /sellers/:seller_id/suggestions - Suggestions addressed to a seller.
#[instrument(skip(state))]
pub async fn get_seller_suggestions(
    State(state): State<AppState>,
    Path(seller_id): Path<String>,
) -> Result<Json<Vec<Suggestion>>, StatusCode> {
    match state.storage.list_suggestions_for_seller(&seller_id).await {
        Ok(suggestions) => {
            info!(
                seller_id = %seller_id,
                count = suggestions.len(),
                "Seller suggestions queried"
            );
            Ok(Json(suggestions))
        }
        Err(e) => {
            warn!(seller_id = %seller_id, error = %e, "Failed to list suggestions");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
