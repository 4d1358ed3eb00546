//! edgecam-server entry point
//!
//! Wires the capture pipeline to the HTTP surface: connects MySQL, resolves
//! the detection allowlist from the model's class names, starts the frame
//! loop and serves the API.

use edgecam::dashboard::DashboardAggregator;
use edgecam::detection_gate::{resolve_allowlist, DetectionGate};
use edgecam::detector_client::{Detect, HttpDetector};
use edgecam::event_recorder::RateLimitedRecorder;
use edgecam::event_store::EventStore;
use edgecam::frame_source::SourceStatusTracker;
use edgecam::pipeline::{CapturePipeline, PipelineContext};
use edgecam::state::{AppConfig, AppState};
use edgecam::stream_publisher::StreamPublisher;
use edgecam::web_api;
use sqlx::mysql::MySqlPoolOptions;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edgecam=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::default();
    tracing::info!(
        device_id = config.device_id,
        stream_url = %config.stream_url,
        detector_url = %config.detector_url,
        "Starting edgecam server"
    );

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;
    tracing::info!("Database connected");

    let store = Arc::new(EventStore::new(pool.clone()));
    let detector: Arc<dyn Detect> = Arc::new(HttpDetector::new(config.detector_url.clone()));
    let publisher = Arc::new(StreamPublisher::new());
    let aggregator = Arc::new(DashboardAggregator::new(store.clone()));
    let source_status = Arc::new(SourceStatusTracker::new());

    // Allowlist comes from the live model; an unreachable detector falls
    // back to the permissive empty set and the pipeline starts anyway.
    let allowlist = match detector.class_names().await {
        Ok(names) => {
            tracing::info!(classes = names.len(), "Model class names loaded");
            resolve_allowlist(&names)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not load model classes, treating every class as a person");
            HashSet::new()
        }
    };

    let gate = DetectionGate::new(
        detector.clone(),
        config.detect_options(),
        allowlist,
        config.skip_rate,
    );
    let recorder = RateLimitedRecorder::new(
        store.clone(),
        config.device_id,
        Duration::from_secs(config.cooldown_secs),
    );

    let pipeline = CapturePipeline::new();
    pipeline
        .start(PipelineContext {
            device_id: config.device_id,
            source_config: config.source_config(),
            gate,
            recorder,
            publisher: publisher.clone(),
            status: source_status.clone(),
        })
        .await;

    let state = AppState {
        pool,
        config: config.clone(),
        store,
        detector,
        publisher,
        aggregator,
        source_status,
    };

    let app = web_api::create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
