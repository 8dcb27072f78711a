use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{
    compute, compute_chunked, preview, validate, ComputationResult, ComputeParams, LiteParams,
    LiteResult, Preview, Validation,
};

const DEFAULT_PREVIEW_ROWS: usize = 5;

// =====================
// Application state
// =====================
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub defaults: ComputeParams,
    pub lite_defaults: LiteParams,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            defaults: ComputeParams::default(),
            lite_defaults: LiteParams::default(),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

pub struct AppState {
    pub config: ServerConfig,
}

// =====================
// API types
// =====================
#[derive(Debug, Default, Deserialize)]
pub struct ComputeQuery {
    pub segment_length: Option<u32>,
    pub cutoff_freq: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiteQuery {
    pub segment_length: Option<u32>,
    pub chunk_hint: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub rows: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub service: String,
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

// =====================
// Router builder
// =====================

pub fn build_app_with_state(config: ServerConfig) -> (Router, Arc<AppState>) {
    let body_limit = config.max_body_bytes;
    let state = Arc::new(AppState { config });

    let app: Router<Arc<AppState>> = Router::new()
        // Health & info
        .route("/api/health", get(health_check))
        .route("/api/iri/status", get(service_status))
        // Computation
        .route("/api/iri/compute", post(compute_iri))
        .route("/api/iri/compute-lite", post(compute_iri_lite))
        // Inspection
        .route("/api/iri/validate", post(validate_file))
        .route("/api/iri/preview", post(preview_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive());

    let app: Router = app.with_state::<()>(state.clone());

    (app, state)
}

pub fn build_app(config: ServerConfig) -> Router {
    build_app_with_state(config).0
}

// =====================
// Handlers
// =====================

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn service_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        service: "IRI Computation Service".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Runs CPU-bound work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("IRI computation failed: {e}")))
}

pub async fn compute_iri(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ComputeQuery>,
    body: Bytes,
) -> Result<Json<ComputationResult>, ApiError> {
    let defaults = state.config.defaults;
    let params = ComputeParams::new(
        q.segment_length.unwrap_or(defaults.segment_length),
        q.cutoff_freq.unwrap_or(defaults.cutoff_freq),
    );

    let result = blocking(move || compute(Cursor::new(body), &params)).await?;
    if !result.success {
        return Err(api_error(StatusCode::BAD_REQUEST, result.message));
    }
    Ok(Json(result))
}

pub async fn compute_iri_lite(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LiteQuery>,
    body: Bytes,
) -> Result<Json<LiteResult>, ApiError> {
    let defaults = state.config.lite_defaults;
    let params = LiteParams::new(
        q.segment_length.unwrap_or(defaults.segment_length),
        q.chunk_hint.unwrap_or(defaults.chunk_hint),
    );

    let result = blocking(move || compute_chunked(Cursor::new(body), &params)).await?;
    if !result.success {
        return Err(api_error(StatusCode::BAD_REQUEST, result.message));
    }
    Ok(Json(result))
}

pub async fn validate_file(body: Bytes) -> Result<Json<Validation>, ApiError> {
    let v = blocking(move || validate(Cursor::new(body))).await?;
    Ok(Json(v))
}

pub async fn preview_file(
    Query(q): Query<PreviewQuery>,
    body: Bytes,
) -> Result<Json<Preview>, ApiError> {
    let rows = q.rows.unwrap_or(DEFAULT_PREVIEW_ROWS);
    blocking(move || preview(Cursor::new(body), rows))
        .await?
        .map(Json)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Error getting file preview: {e}")))
}
