//! HTTP server for the snow depth service.
//!
//! Provides endpoints for:
//! - `GET /snow?lat=..&lon=..` - Corrected snow depth and display parameters
//! - `GET /display?depth=..` - Display parameters for a depth
//! - `POST /refresh` - Trigger a rebuild in the background
//! - `GET /status` - Published field summary
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics

use axum::{
    extract::{Extension, Json, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use snow_processor::{ClassStats, DiffusionStats, DisplayParams, LoadStats, SnowDepthService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::refresh::{RefreshOutcome, RefreshPipeline};

/// Shared state for the HTTP server.
pub struct ServerState {
    pub service: Arc<SnowDepthService>,
    pub pipeline: Arc<RefreshPipeline>,
    /// Absent when no recorder is installed (tests)
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    pub depth: f32,
}

/// Response for /snow.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnowResponse {
    pub lat: f64,
    pub lon: f64,
    /// Corrected depth in meters
    pub depth: f32,
    #[serde(flatten)]
    pub display: DisplayParams,
    /// None until a field has been published
    pub generation: Option<u64>,
}

/// Response for /status.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ready: bool,
    pub building: bool,
    pub generation: u64,
    pub built_at: Option<DateTime<Utc>>,
    pub load: Option<LoadStats>,
    pub diffusion: Option<DiffusionStats>,
    pub coast: ClassStats,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

fn bad_request(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

/// GET /snow - Snow depth at a point
async fn snow_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<PointQuery>,
) -> impl IntoResponse {
    counter!("snow_queries_total", "endpoint" => "snow").increment(1);

    if !query.lat.is_finite() || !(-90.0..=90.0).contains(&query.lat) {
        return bad_request(format!("lat must be within [-90, 90], got {}", query.lat)).into_response();
    }
    if !query.lon.is_finite() {
        return bad_request(format!("lon must be finite, got {}", query.lon)).into_response();
    }

    let generation = state.service.snapshot().map(|p| p.generation);
    let depth = state.service.query(query.lat, query.lon);
    Json(SnowResponse {
        lat: query.lat,
        lon: query.lon,
        depth,
        display: state.service.map_to_display(depth),
        generation,
    })
    .into_response()
}

/// GET /display - Display parameters for a depth
async fn display_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<DepthQuery>,
) -> impl IntoResponse {
    counter!("snow_queries_total", "endpoint" => "display").increment(1);
    Json(state.service.map_to_display(query.depth))
}

/// POST /refresh - Start a rebuild without waiting for it
async fn refresh_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    if state.service.is_building() {
        return (
            StatusCode::CONFLICT,
            Json(RefreshResponse {
                accepted: false,
                message: "A build is already running".to_string(),
            }),
        );
    }

    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        match pipeline.run_once().await {
            Ok(RefreshOutcome::Published { generation, cycle }) => {
                info!(generation, cycle = %cycle, "Manual refresh published");
            }
            Ok(RefreshOutcome::Skipped) => info!("Manual refresh skipped"),
            Err(e) => error!(error = %e, "Manual refresh failed"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            accepted: true,
            message: "Refresh started".to_string(),
        }),
    )
}

/// GET /status - Published field summary
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let snapshot = state.service.snapshot();
    Json(StatusResponse {
        ready: snapshot.is_some(),
        building: state.service.is_building(),
        generation: snapshot.as_ref().map_or(0, |p| p.generation),
        built_at: snapshot.as_ref().map(|p| p.built_at),
        load: snapshot.as_ref().map(|p| p.load),
        diffusion: snapshot.as_ref().map(|p| p.diffusion),
        coast: state.service.coast().stats(),
        refresh_interval_secs: state.pipeline.interval().as_secs(),
    })
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "snow-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed\n".to_string(),
        ),
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/snow", get(snow_handler))
        .route("/display", get(display_handler))
        .route("/refresh", post(refresh_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting snow-service HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
