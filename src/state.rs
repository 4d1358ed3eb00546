//! Application state
//!
//! Holds configuration and all shared components

use crate::dashboard::DashboardAggregator;
use crate::detector_client::{Detect, DetectOptions};
use crate::event_store::EventStore;
use crate::frame_source::{SourceConfig, SourceStatusTracker};
use crate::stream_publisher::StreamPublisher;
use sqlx::MySqlPool;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration (env-driven, with local defaults)
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL
    pub database_url: String,
    /// Camera MJPEG stream URL
    pub stream_url: String,
    /// Use local webcam instead of the network stream
    pub use_webcam: bool,
    /// Webcam device index (/dev/video{N})
    pub webcam_index: u32,
    /// Inference server URL
    pub detector_url: String,
    /// Monitored device identifier (devices table row)
    pub device_id: i64,
    /// Run detection every Nth frame
    pub skip_rate: u64,
    /// Output stream FPS cap
    pub max_fps: u32,
    /// Minimum seconds between two persisted events
    pub cooldown_secs: u64,
    /// Detector confidence threshold
    pub confidence: f32,
    /// Detector IoU/NMS threshold
    pub iou: f32,
    /// Max detections per frame
    pub max_detections: u32,
    /// Snapshot interval for the offline capture tool (seconds)
    pub capture_interval_secs: u64,
    /// Output directory for the offline capture tool
    pub capture_output_dir: PathBuf,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "mysql://root:@localhost/yolo_edge".to_string()),
            stream_url: std::env::var("CAMERA_STREAM_URL")
                .unwrap_or_else(|_| "http://172.20.10.2:81/stream".to_string()),
            use_webcam: std::env::var("USE_WEBCAM")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            webcam_index: env_parsed("WEBCAM_INDEX", 0),
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            device_id: env_parsed("DEVICE_ID", 1),
            skip_rate: env_parsed("SKIP_RATE", 5),
            max_fps: env_parsed("MAX_FPS", 10),
            cooldown_secs: env_parsed("COOLDOWN_SECS", 60),
            confidence: env_parsed("DETECT_CONFIDENCE", 0.25),
            iou: env_parsed("DETECT_IOU", 0.45),
            max_detections: env_parsed("DETECT_MAX", 5),
            capture_interval_secs: env_parsed("CAPTURE_INTERVAL", 30),
            capture_output_dir: std::env::var("CAPTURE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("captures")),
            port: env_parsed("PORT", 5000),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}

impl AppConfig {
    /// Frame source settings derived from this config
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            stream_url: self.stream_url.clone(),
            use_webcam: self.use_webcam,
            webcam_index: self.webcam_index,
        }
    }

    /// Detector thresholds derived from this config
    pub fn detect_options(&self) -> DetectOptions {
        DetectOptions {
            confidence: self.confidence,
            iou: self.iou,
            max_detections: self.max_detections,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub pool: MySqlPool,
    /// Application config
    pub config: AppConfig,
    /// EventStore (MySQL persistence)
    pub store: Arc<EventStore>,
    /// Detector adapter
    pub detector: Arc<dyn Detect>,
    /// Latest annotated frame fan-out
    pub publisher: Arc<StreamPublisher>,
    /// Dashboard read model
    pub aggregator: Arc<DashboardAggregator>,
    /// Camera connection status (updated by the pipeline loop)
    pub source_status: Arc<SourceStatusTracker>,
}
