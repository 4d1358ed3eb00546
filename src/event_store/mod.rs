//! EventStore - Detection event persistence
//!
//! ## Responsibilities
//!
//! - Record detections: event append (detections table) plus counter
//!   increment (devices table) in a single transaction, so the two can no
//!   longer diverge under partial failure
//! - Query recent events and aggregate totals for the dashboard
//!
//! Writes that fail are logged by the caller and the event is lost; there
//! is no buffering or retry queue.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlPool;
use sqlx::Row;

/// Event status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStatus {
    Human,
    Idle,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStatus::Human => "HUMAN",
            DetectionStatus::Idle => "IDLE",
        }
    }
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted detection event (detections table row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    /// Inference latency in milliseconds
    pub delay: f64,
    /// |latency - previous gated latency| in milliseconds
    pub jitter: f64,
    pub human_count: i64,
}

/// Aggregate totals for one device
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeviceTotals {
    pub total_detections: i64,
    pub total_humans: i64,
}

/// Write seam used by the rate-limited recorder; lets tests substitute a
/// failing or counting store.
#[async_trait]
pub trait RecordDetections: Send + Sync {
    /// Persist one event and bump the device counter atomically
    async fn record_detection(
        &self,
        device_id: i64,
        status: DetectionStatus,
        jitter_ms: f64,
        delay_ms: f64,
        human_count: i64,
    ) -> Result<u64>;
}

/// MySQL-backed event store
pub struct EventStore {
    pool: MySqlPool,
}

impl EventStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Recent events for a device, newest first
    pub async fn query_recent(&self, device_id: i64, limit: u32) -> Result<Vec<DetectionEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, status, delay_ms AS delay, jitter, human_count
            FROM detections
            WHERE device_id = ?
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DetectionEvent {
                    id: row.try_get("id")?,
                    timestamp: row.try_get("timestamp")?,
                    status: row.try_get("status")?,
                    delay: row.try_get("delay")?,
                    jitter: row.try_get("jitter")?,
                    human_count: row.try_get("human_count")?,
                })
            })
            .collect()
    }

    /// Aggregate totals for a device
    pub async fn query_totals(&self, device_id: i64) -> Result<DeviceTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_detections,
                CAST(COALESCE(SUM(human_count), 0) AS SIGNED) AS total_humans
            FROM detections
            WHERE device_id = ?
            "#,
        )
        .bind(device_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(DeviceTotals {
            total_detections: row.try_get("total_detections")?,
            total_humans: row.try_get("total_humans")?,
        })
    }

    /// True when the database answers a trivial query
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl RecordDetections for EventStore {
    async fn record_detection(
        &self,
        device_id: i64,
        status: DetectionStatus,
        jitter_ms: f64,
        delay_ms: f64,
        human_count: i64,
    ) -> Result<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO detections (device_id, status, jitter, delay_ms, human_count, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(device_id)
        .bind(status.as_str())
        .bind(jitter_ms)
        .bind(delay_ms)
        .bind(human_count)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE devices
            SET total_human_detection = total_human_detection + 1,
                last_status = ?,
                last_active = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(DetectionStatus::Human.as_str(), "HUMAN");
        assert_eq!(DetectionStatus::Idle.as_str(), "IDLE");
    }

    #[test]
    fn test_totals_default_to_zero() {
        let totals = DeviceTotals::default();
        assert_eq!(totals.total_detections, 0);
        assert_eq!(totals.total_humans, 0);
    }
}
