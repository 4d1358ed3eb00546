//! Edgecam Server
//!
//! Human-detection pipeline for a single edge camera.
//!
//! ## Architecture
//!
//! 1. FrameSource - MJPEG stream ingest with bounded retry + reconnect
//! 2. DetectionGate - frame-skip policy, allowlist filter, latency/jitter
//! 3. DetectorClient - external inference server adapter
//! 4. RateLimitedRecorder - one persisted event per cooldown window
//! 5. EventStore - MySQL persistence (detections + device counters)
//! 6. StreamPublisher - latest annotated frame, FPS-capped MJPEG fan-out
//! 7. DashboardAggregator - recent events + running totals snapshot
//! 8. WebAPI - HTTP endpoints (/video_feed, /data, /health)
//!
//! ## Design Principles
//!
//! - Availability over completeness: no pipeline error is fatal
//! - One sequential loop per device owns all mutable pipeline state
//! - Stream consumers read the latest frame only, never queue

pub mod dashboard;
pub mod detection_gate;
pub mod detector_client;
pub mod event_recorder;
pub mod event_store;
pub mod frame_source;
pub mod models;
pub mod pipeline;
pub mod stream_publisher;
pub mod web_api;
pub mod error;
pub mod state;

pub use error::{Error, Result};
pub use state::AppState;
