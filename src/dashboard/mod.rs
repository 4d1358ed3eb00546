//! DashboardAggregator - Read models for the dashboard endpoints
//!
//! Combines the recent-event list with device totals into one snapshot.
//! Queries run per request; nothing is cached.

use crate::error::Result;
use crate::event_store::{DetectionEvent, DeviceTotals, EventStore};
use serde::Serialize;
use std::sync::Arc;

const RECENT_EVENT_LIMIT: u32 = 10;

/// One dashboard read: recent events plus lifetime totals
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub recent_events: Vec<DetectionEvent>,
    pub total_detections: i64,
    pub total_humans: i64,
    /// Human count of the newest event, 0 with no events
    pub latest_human_count: i64,
}

impl DashboardSnapshot {
    pub fn from_parts(recent_events: Vec<DetectionEvent>, totals: DeviceTotals) -> Self {
        let latest_human_count = recent_events.first().map(|e| e.human_count).unwrap_or(0);
        Self {
            recent_events,
            total_detections: totals.total_detections,
            total_humans: totals.total_humans,
            latest_human_count,
        }
    }
}

/// Builds dashboard snapshots from the event store
pub struct DashboardAggregator {
    store: Arc<EventStore>,
    recent_limit: u32,
}

impl DashboardAggregator {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            recent_limit: RECENT_EVENT_LIMIT,
        }
    }

    /// Snapshot for one device
    pub async fn snapshot(&self, device_id: i64) -> Result<DashboardSnapshot> {
        let recent = self.store.query_recent(device_id, self.recent_limit).await?;
        let totals = self.store.query_totals(device_id).await?;
        Ok(DashboardSnapshot::from_parts(recent, totals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: i64, human_count: i64) -> DetectionEvent {
        DetectionEvent {
            id,
            timestamp: Utc::now(),
            status: "HUMAN".to_string(),
            delay: 80.0,
            jitter: 3.0,
            human_count,
        }
    }

    #[test]
    fn test_empty_snapshot_defaults_to_zero() {
        let snapshot = DashboardSnapshot::from_parts(Vec::new(), DeviceTotals::default());
        assert_eq!(snapshot.total_detections, 0);
        assert_eq!(snapshot.total_humans, 0);
        assert_eq!(snapshot.latest_human_count, 0);
        assert!(snapshot.recent_events.is_empty());
    }

    #[test]
    fn test_latest_human_count_comes_from_newest_event() {
        // query_recent returns newest first
        let recent = vec![event(12, 3), event(11, 1)];
        let totals = DeviceTotals {
            total_detections: 12,
            total_humans: 20,
        };
        let snapshot = DashboardSnapshot::from_parts(recent, totals);
        assert_eq!(snapshot.latest_human_count, 3);
        assert_eq!(snapshot.total_detections, 12);
        assert_eq!(snapshot.total_humans, 20);
    }
}
