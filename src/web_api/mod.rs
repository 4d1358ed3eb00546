//! Web API - HTTP surface
//!
//! ## Endpoints
//!
//! - `GET /video_feed` - live annotated MJPEG stream (FPS-capped)
//! - `GET /data` - dashboard snapshot (recent events + totals)
//! - `GET /health` - camera/database/model health probe
//! - `GET /api/detections` - recent detection events
//!
//! Handlers read shared state only; the capture pipeline is the sole
//! writer of frames and events.

mod routes;

pub use routes::create_router;
