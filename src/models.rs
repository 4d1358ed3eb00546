//! Shared API response types

use crate::event_store::DetectionEvent;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// "connected" | "disconnected"
    pub camera: String,
    /// "connected" | "disconnected"
    pub database: String,
    /// "loaded" | "not_loaded"
    pub model: String,
}

/// Dashboard data response (`GET /data`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    /// Human count of the most recent event (0 when none)
    pub human_count: i64,
    /// Total persisted events for the device
    pub total_detections: i64,
    /// Recent events, newest first
    pub recent_detections: Vec<DetectionEvent>,
}

impl DashboardResponse {
    /// Zero-valued payload used when the store is unreachable
    pub fn empty() -> Self {
        Self {
            human_count: 0,
            total_detections: 0,
            recent_detections: Vec::new(),
        }
    }
}
