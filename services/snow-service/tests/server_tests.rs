//! HTTP handlers, driven through the router without binding a socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{gated_pipeline, inland_snow_csv, pipeline, service, wait_until};
use serde::de::DeserializeOwned;
use snow_processor::{DisplayParams, SnowDepthService};
use snow_service::server::{HealthResponse, RefreshResponse, SnowResponse, StatusResponse};
use snow_service::{build_router, RefreshPipeline, ServerState};
use std::sync::Arc;
use test_utils::assert_approx_eq;
use tower::ServiceExt;

fn router(service: Arc<SnowDepthService>, pipeline: RefreshPipeline) -> Router {
    build_router(Arc::new(ServerState {
        service,
        pipeline: Arc::new(pipeline),
        metrics: None,
    }))
}

fn default_router() -> (Router, Arc<SnowDepthService>) {
    let svc = service();
    let app = router(Arc::clone(&svc), pipeline(Arc::clone(&svc), &inland_snow_csv()));
    (app, svc)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json<T: DeserializeOwned>(app: &Router, uri: &str) -> T {
    let (status, body) = send(app, "GET", uri).await;
    assert_eq!(status, StatusCode::OK, "GET {}", uri);
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Health and status
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (app, _) = default_router();
    let health: HealthResponse = get_json(&app, "/health").await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.service, "snow-service");
}

#[tokio::test]
async fn test_status_before_and_after_build() {
    let (app, svc) = default_router();

    let status: StatusResponse = get_json(&app, "/status").await;
    assert!(!status.ready);
    assert_eq!(status.generation, 0);
    assert!(status.diffusion.is_none());
    assert_eq!(status.refresh_interval_secs, 3600);
    assert_eq!(status.coast.coast, 2 * 18);

    svc.build_from_reader(std::io::Cursor::new(inland_snow_csv()))
        .unwrap();

    let status: StatusResponse = get_json(&app, "/status").await;
    assert!(status.ready);
    assert!(!status.building);
    assert_eq!(status.generation, 1);
    assert_eq!(status.load.unwrap().accepted, 1);
    assert_eq!(status.diffusion.unwrap().cells_raised, 3);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let (app, _) = default_router();
    let (status, _) = send(&app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_snow_response_fields() {
    let (app, _) = default_router();
    let (_, body) = send(&app, "GET", "/snow?lat=0&lon=190").await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    for key in ["lat", "lon", "depth", "snow_now", "snow_area_width", "ice_now"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert!(json["generation"].is_null());
}

#[tokio::test]
async fn test_snow_before_publication() {
    let (app, svc) = default_router();
    let snow: SnowResponse = get_json(&app, "/snow?lat=0&lon=190").await;
    assert_eq!(snow.depth, 0.0);
    assert_eq!(snow.generation, None);
    assert_eq!(snow.display, svc.map_to_display(0.0));
}

#[tokio::test]
async fn test_snow_serves_corrected_depth() {
    let (app, svc) = default_router();
    svc.build_from_reader(std::io::Cursor::new(inland_snow_csv()))
        .unwrap();

    let snow: SnowResponse = get_json(&app, "/snow?lat=0&lon=-170").await;
    assert_eq!(snow.generation, Some(1));
    assert_approx_eq!(snow.depth, 0.1536, 1e-6);
    assert_eq!(snow.display, svc.map_to_display(snow.depth));
}

#[tokio::test]
async fn test_snow_rejects_bad_coordinates() {
    let (app, _) = default_router();

    let (status, _) = send(&app, "GET", "/snow?lat=95&lon=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/snow?lat=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/snow?lat=north&lon=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_display_endpoint() {
    let (app, svc) = default_router();

    let display: DisplayParams = get_json(&app, "/display?depth=0").await;
    assert_eq!(display, svc.map_to_display(0.0));

    let display: DisplayParams = get_json(&app, "/display?depth=0.15").await;
    assert_eq!(display, svc.map_to_display(0.15));
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_runs_in_background() {
    let (app, svc) = default_router();

    let (status, body) = send(&app, "POST", "/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let response: RefreshResponse = serde_json::from_slice(&body).unwrap();
    assert!(response.accepted);

    wait_until(|| svc.generation() == 1).await;
    assert_approx_eq!(svc.query(0.0, 190.0), 0.1536, 1e-6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresh_conflict_while_building() {
    let svc = service();
    let (gated, gate) = gated_pipeline(Arc::clone(&svc), &inland_snow_csv());
    let app = router(Arc::clone(&svc), gated);

    let (status, _) = send(&app, "POST", "/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_until(|| svc.is_building()).await;

    let (status, body) = send(&app, "POST", "/refresh").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let response: RefreshResponse = serde_json::from_slice(&body).unwrap();
    assert!(!response.accepted);

    gate.send(()).unwrap();
    wait_until(|| svc.generation() == 1).await;
    assert!(!svc.is_building());
}
