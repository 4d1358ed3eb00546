//! CapturePipeline - Ingest/detect/publish/record loop
//!
//! ## Responsibilities
//!
//! - Drive the frame loop: read, gate, publish, record
//! - Escalate read failures through the connection supervisor
//! - Keep source connectivity status current for the health endpoint
//!
//! One pipeline per device. The loop owns the frame source, gate and
//! recorder outright; only the publisher and status tracker are shared.

use crate::detection_gate::DetectionGate;
use crate::event_recorder::RateLimitedRecorder;
use crate::frame_source::{
    ConnectionSupervisor, FrameSource, RecoveryAction, SourceConfig,
    SourceStatusTracker, RECONNECT_FAILED_BACKOFF, RETRY_BACKOFF,
};
use crate::stream_publisher::StreamPublisher;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything the frame loop owns or shares
pub struct PipelineContext {
    pub device_id: i64,
    pub source_config: SourceConfig,
    pub gate: DetectionGate,
    pub recorder: RateLimitedRecorder,
    pub publisher: Arc<StreamPublisher>,
    pub status: Arc<SourceStatusTracker>,
}

/// Background capture loop with start/stop lifecycle
pub struct CapturePipeline {
    running: Arc<RwLock<bool>>,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Spawn the frame loop. No-op if already running.
    pub async fn start(&self, ctx: PipelineContext) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("Capture pipeline already running");
                return;
            }
            *running = true;
        }

        let running = self.running.clone();
        tokio::spawn(async move {
            tracing::info!(device_id = ctx.device_id, "Capture pipeline started");
            run_loop(ctx, running.clone()).await;
            tracing::info!("Capture pipeline stopped");
            *running.write().await = false;
        });
    }

    /// Signal the frame loop to exit after the current iteration
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(mut ctx: PipelineContext, running: Arc<RwLock<bool>>) {
    let mut supervisor = ConnectionSupervisor::default();
    let mut source: Option<FrameSource> = None;
    let mut frame_index: u64 = 0;

    while *running.read().await {
        if source.is_none() {
            match FrameSource::open(ctx.source_config.clone()).await {
                Ok(src) => {
                    ctx.status
                        .update_status(ctx.device_id, true)
                        .await;
                    source = Some(src);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to open frame source");
                    ctx.status
                        .update_status(ctx.device_id, false)
                        .await;
                    tokio::time::sleep(RECONNECT_FAILED_BACKOFF).await;
                    continue;
                }
            }
        }
        let src = match source.as_mut() {
            Some(src) => src,
            None => continue,
        };

        match src.read().await {
            Ok(frame) => {
                supervisor.on_success();
                ctx.status
                    .update_status(ctx.device_id, true)
                    .await;

                let (annotated, result) = ctx.gate.process(&frame, frame_index).await;
                frame_index = frame_index.wrapping_add(1);
                ctx.publisher.publish(annotated);

                if let Err(e) = ctx.recorder.consider(&result).await {
                    tracing::error!(error = %e, "Failed to record detection");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Frame read failed");
                match supervisor.on_failure() {
                    RecoveryAction::Backoff => {
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                    RecoveryAction::Reconnect => {
                        ctx.status
                            .update_status(ctx.device_id, false)
                            .await;
                        if let Err(e) = src.reconnect().await {
                            tracing::error!(error = %e, "Reconnect failed");
                            source = None;
                            tokio::time::sleep(RECONNECT_FAILED_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }
}
