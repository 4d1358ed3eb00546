//! Camera connection status tracking
//!
//! Tracks connection status changes so lost/recovered transitions are
//! logged once instead of on every failed read. The health endpoint reads
//! the current status from here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Camera connection status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceConnectionStatus {
    /// Initial state (no read attempted yet)
    Unknown,
    /// Frames are being read
    Connected,
    /// Reads are failing
    Disconnected,
}

/// Status transition event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatusEvent {
    /// Connected -> Disconnected (or first status is Disconnected)
    Lost,
    /// Disconnected -> Connected
    Recovered,
}

/// Tracks per-device connection status and detects transitions
pub struct SourceStatusTracker {
    statuses: RwLock<HashMap<i64, SourceConnectionStatus>>,
}

impl SourceStatusTracker {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Update status and return the transition event, if any.
    ///
    /// An initial failing read counts as `Lost`; an initial successful
    /// read produces no event.
    pub async fn update_status(
        &self,
        device_id: i64,
        connected: bool,
    ) -> Option<SourceStatusEvent> {
        let mut statuses = self.statuses.write().await;
        let prev = statuses
            .get(&device_id)
            .cloned()
            .unwrap_or(SourceConnectionStatus::Unknown);

        let next = if connected {
            SourceConnectionStatus::Connected
        } else {
            SourceConnectionStatus::Disconnected
        };
        statuses.insert(device_id, next.clone());

        match (&prev, &next) {
            (SourceConnectionStatus::Connected, SourceConnectionStatus::Disconnected) => {
                tracing::warn!(device_id = device_id, "Camera connection lost");
                Some(SourceStatusEvent::Lost)
            }
            (SourceConnectionStatus::Disconnected, SourceConnectionStatus::Connected) => {
                tracing::info!(device_id = device_id, "Camera connection recovered");
                Some(SourceStatusEvent::Recovered)
            }
            (SourceConnectionStatus::Unknown, SourceConnectionStatus::Disconnected) => {
                tracing::warn!(device_id = device_id, "Camera initial read failed");
                Some(SourceStatusEvent::Lost)
            }
            _ => None,
        }
    }

    /// Current status for a device
    pub async fn get_status(&self, device_id: i64) -> SourceConnectionStatus {
        self.statuses
            .read()
            .await
            .get(&device_id)
            .cloned()
            .unwrap_or(SourceConnectionStatus::Unknown)
    }

    /// True when the device is currently connected
    pub async fn is_connected(&self, device_id: i64) -> bool {
        self.get_status(device_id).await == SourceConnectionStatus::Connected
    }
}

impl Default for SourceStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_connected_no_event() {
        let tracker = SourceStatusTracker::new();
        assert!(tracker.update_status(1, true).await.is_none());
    }

    #[tokio::test]
    async fn test_initial_disconnected_is_lost() {
        let tracker = SourceStatusTracker::new();
        assert_eq!(
            tracker.update_status(1, false).await,
            Some(SourceStatusEvent::Lost)
        );
    }

    #[tokio::test]
    async fn test_lost_then_recovered() {
        let tracker = SourceStatusTracker::new();
        tracker.update_status(1, true).await;
        assert_eq!(
            tracker.update_status(1, false).await,
            Some(SourceStatusEvent::Lost)
        );
        assert_eq!(
            tracker.update_status(1, true).await,
            Some(SourceStatusEvent::Recovered)
        );
    }

    #[tokio::test]
    async fn test_repeated_failures_single_event() {
        let tracker = SourceStatusTracker::new();
        tracker.update_status(1, false).await;
        assert!(tracker.update_status(1, false).await.is_none());
        assert!(tracker.update_status(1, false).await.is_none());
    }

    #[tokio::test]
    async fn test_devices_tracked_independently() {
        let tracker = SourceStatusTracker::new();
        tracker.update_status(1, true).await;
        tracker.update_status(2, false).await;
        assert!(tracker.is_connected(1).await);
        assert!(!tracker.is_connected(2).await);
    }
}
