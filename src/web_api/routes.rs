//! Route table and handlers

use crate::models::{DashboardResponse, HealthResponse};
use crate::state::AppState;
use crate::stream_publisher::{mjpeg_chunk, FpsGovernor, STREAM_BOUNDARY};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Instant;

const MAX_QUERY_LIMIT: u32 = 100;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/video_feed", get(video_feed))
        .route("/data", get(dashboard_data))
        .route("/health", get(health_check))
        .route("/api/detections", get(recent_detections))
        .with_state(state)
}

/// GET /video_feed - multipart/x-mixed-replace MJPEG stream.
///
/// Each subscriber gets its own FPS governor; a slow client only drops its
/// own frames.
async fn video_feed(State(state): State<AppState>) -> impl IntoResponse {
    let mut rx = state.publisher.subscribe();
    let mut governor = FpsGovernor::new(state.config.max_fps);

    let stream = async_stream::stream! {
        loop {
            if rx.changed().await.is_err() {
                break;
            }
            let frame = rx.borrow_and_update().clone();
            if let Some(jpeg) = frame {
                let pause = governor.pause_before_emit(Instant::now());
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                yield Ok::<Bytes, Infallible>(mjpeg_chunk(&jpeg));
            }
        }
    };

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={STREAM_BOUNDARY}"),
        )],
        Body::from_stream(stream),
    )
}

/// GET /data - dashboard snapshot.
///
/// Degrades to an empty payload on store errors so the dashboard keeps
/// rendering through a database outage.
async fn dashboard_data(State(state): State<AppState>) -> impl IntoResponse {
    match state.aggregator.snapshot(state.config.device_id).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(DashboardResponse {
                human_count: snapshot.latest_human_count,
                total_detections: snapshot.total_detections,
                recent_detections: snapshot.recent_events,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Dashboard query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(DashboardResponse::empty()))
        }
    }
}

/// GET /health - per-dependency health probe
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let camera = state
        .source_status
        .is_connected(state.config.device_id)
        .await;
    let database = state.store.health_check().await;
    let model = state.detector.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "ok".to_string(),
        camera: if camera { "connected" } else { "disconnected" }.to_string(),
        database: if database { "connected" } else { "disconnected" }.to_string(),
        model: if model { "loaded" } else { "not_loaded" }.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<u32>,
}

/// GET /api/detections?limit=N - recent events, newest first
async fn recent_detections(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, crate::Error> {
    let limit = query.limit.unwrap_or(10).min(MAX_QUERY_LIMIT);
    let events = state
        .store
        .query_recent(state.config.device_id, limit)
        .await?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_capped() {
        let query = RecentQuery { limit: Some(5000) };
        assert_eq!(query.limit.unwrap_or(10).min(MAX_QUERY_LIMIT), 100);
    }

    #[test]
    fn test_limit_defaults_to_ten() {
        let query = RecentQuery { limit: None };
        assert_eq!(query.limit.unwrap_or(10).min(MAX_QUERY_LIMIT), 10);
    }
}
