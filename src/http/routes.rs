//! Axum router and request handlers
//!
//! Routes:
//! - `GET /accounts` - JSON object mapping code to name, insertion-ordered
//! - `GET /tags` - JSON array of `"{name} / {code}"` strings
//! - `POST /cache/purge` - drop the durable cache entry
//! - `POST /cache/refresh` - force an upstream fetch and cache write
//! - `GET /health` - liveness check
//!
//! Every chart response carries a `Cache-Control: public, max-age=...`
//! directive bounding the edge layer's TTL, and an `x-chart-source` header
//! naming the backing source. Degraded (cache-fallback) responses use the
//! shorter stale TTL so the edge re-checks sooner.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::{ChartService, DurableCache, OutputMode, RawAccountSource};
use crate::http::error::ApiError;
use crate::types::{ChartOrigin, RequestOptions};

/// Shared application state
///
/// Generic over the collaborator seams so tests can run the full router
/// against in-memory stubs.
pub struct AppState<S, D> {
    pub service: Arc<ChartService<S, D>>,

    /// Edge-cache TTL for fresh responses, in seconds
    pub ttl_secs: u64,

    /// Edge-cache TTL for degraded (cache-fallback) responses, in seconds
    pub stale_ttl_secs: u64,
}

impl<S, D> Clone for AppState<S, D> {
    fn clone(&self) -> Self {
        AppState {
            service: Arc::clone(&self.service),
            ttl_secs: self.ttl_secs,
            stale_ttl_secs: self.stale_ttl_secs,
        }
    }
}

/// Build the API router
pub fn router<S, D>(state: AppState<S, D>) -> Router
where
    S: RawAccountSource + 'static,
    D: DurableCache + 'static,
{
    Router::new()
        .route("/accounts", get(list_accounts::<S, D>))
        .route("/tags", get(list_tags::<S, D>))
        .route("/cache/purge", post(purge_cache::<S, D>))
        .route("/cache/refresh", post(refresh_cache::<S, D>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /accounts - the processed chart as a code-to-name mapping
async fn list_accounts<S, D>(
    State(state): State<AppState<S, D>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError>
where
    S: RawAccountSource,
    D: DurableCache,
{
    let options = RequestOptions::from_query(&params);
    let payload = state.service.chart(&options, OutputMode::Accounts).await?;

    // preserve_order keeps the transform's ordering in the JSON object
    let mut chart = serde_json::Map::with_capacity(payload.entries.len());
    for entry in payload.entries {
        chart.insert(entry.code, Value::String(entry.label));
    }

    Ok(chart_response(
        Json(Value::Object(chart)),
        payload.origin,
        &state,
    ))
}

/// GET /tags - the processed chart as a list of tag strings
async fn list_tags<S, D>(
    State(state): State<AppState<S, D>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError>
where
    S: RawAccountSource,
    D: DurableCache,
{
    let options = RequestOptions::from_query(&params);
    let payload = state.service.chart(&options, OutputMode::Tags).await?;

    let tags: Vec<String> = payload.entries.into_iter().map(|e| e.label).collect();
    Ok(chart_response(Json(tags), payload.origin, &state))
}

#[derive(Serialize)]
struct PurgeResponse {
    status: &'static str,
}

/// POST /cache/purge - invalidate the durable cache entry
async fn purge_cache<S, D>(
    State(state): State<AppState<S, D>>,
) -> Result<Json<PurgeResponse>, ApiError>
where
    S: RawAccountSource,
    D: DurableCache,
{
    state.service.purge().await?;
    Ok(Json(PurgeResponse { status: "purged" }))
}

#[derive(Serialize)]
struct RefreshResponse {
    status: &'static str,
    version: uuid::Uuid,
    fetched_at: chrono::DateTime<chrono::Utc>,
}

/// POST /cache/refresh - cache-warming fetch, serves no chart payload
async fn refresh_cache<S, D>(
    State(state): State<AppState<S, D>>,
) -> Result<Json<RefreshResponse>, ApiError>
where
    S: RawAccountSource,
    D: DurableCache,
{
    let record = state.service.refresh().await?;
    Ok(Json(RefreshResponse {
        status: "refreshed",
        version: record.version,
        fetched_at: record.fetched_at,
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health - liveness check
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Attach cache-control metadata for the edge layer
fn chart_response<S, D>(
    body: impl IntoResponse,
    origin: ChartOrigin,
    state: &AppState<S, D>,
) -> Response {
    let (max_age, source) = match origin {
        ChartOrigin::Upstream => (state.ttl_secs, "upstream"),
        ChartOrigin::DurableCache => (state.stale_ttl_secs, "durable-cache"),
    };

    (
        [
            (
                header::CACHE_CONTROL,
                format!("public, max-age={max_age}"),
            ),
            (header::HeaderName::from_static("x-chart-source"), source.to_string()),
        ],
        body,
    )
        .into_response()
}
