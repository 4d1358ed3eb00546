//! EventRecorder - Cooldown-gated persistence of detections
//!
//! ## Responsibilities
//!
//! - Decide whether a positive detection may be written (cooldown window)
//! - Hand accepted detections to the event store
//! - Count suppressed detections for observability
//!
//! The cooldown clock advances only when the store write succeeds, so a
//! database outage does not silently consume the window.

use crate::error::Result;
use crate::event_store::{DetectionStatus, RecordDetections};
use crate::detection_gate::DetectionResult;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of offering one detection to the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Written to the store
    Accepted,
    /// Inside the cooldown window (or not a detection at all)
    Suppressed,
}

/// Pure cooldown window over a monotonic clock
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cooldown: Duration,
    last_accepted_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted_at: None,
        }
    }

    /// True when the window is open at `now`.
    ///
    /// The comparison is strict: at exactly `cooldown` elapsed the window
    /// is still closed.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_accepted_at {
            Some(last) => now.duration_since(last) > self.cooldown,
            None => true,
        }
    }

    /// Close the window as of `now`
    pub fn mark_accepted(&mut self, now: Instant) {
        self.last_accepted_at = Some(now);
    }
}

/// Recorder for one device
pub struct RateLimitedRecorder {
    store: Arc<dyn RecordDetections>,
    device_id: i64,
    limiter: RateLimiter,
    suppressed: u64,
}

impl RateLimitedRecorder {
    pub fn new(store: Arc<dyn RecordDetections>, device_id: i64, cooldown: Duration) -> Self {
        Self {
            store,
            device_id,
            limiter: RateLimiter::new(cooldown),
            suppressed: 0,
        }
    }

    /// Detections suppressed by the cooldown so far
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// Offer one detection result to the recorder
    pub async fn consider(&mut self, result: &DetectionResult) -> Result<Verdict> {
        self.consider_at(result, Instant::now()).await
    }

    /// As [`consider`](Self::consider), with the clock injected
    pub async fn consider_at(
        &mut self,
        result: &DetectionResult,
        now: Instant,
    ) -> Result<Verdict> {
        if !result.detected {
            return Ok(Verdict::Suppressed);
        }

        if !self.limiter.ready(now) {
            self.suppressed += 1;
            tracing::debug!(
                device_id = self.device_id,
                human_count = result.count,
                "Detection suppressed by cooldown"
            );
            return Ok(Verdict::Suppressed);
        }

        let event_id = self
            .store
            .record_detection(
                self.device_id,
                DetectionStatus::Human,
                result.jitter_ms,
                result.latency_ms,
                result.count,
            )
            .await?;

        // Only a committed write closes the window
        self.limiter.mark_accepted(now);
        tracing::info!(
            device_id = self.device_id,
            event_id = event_id,
            human_count = result.count,
            delay_ms = result.latency_ms,
            jitter_ms = result.jitter_ms,
            "Detection recorded"
        );
        Ok(Verdict::Accepted)
    }
}
