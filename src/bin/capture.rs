//! capture - Offline snapshot tool
//!
//! Pulls frames from the configured camera at a fixed interval and writes
//! them to disk as timestamped JPEGs. Shares the server's frame source and
//! reconnect policy; runs without the database or the inference server.

use chrono::Local;
use edgecam::frame_source::{
    ConnectionSupervisor, FrameSource, RecoveryAction, RECONNECT_FAILED_BACKOFF, RETRY_BACKOFF,
};
use edgecam::state::AppConfig;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture=info,edgecam=info".into()),
        )
        .init();

    let config = AppConfig::default();
    let interval = Duration::from_secs(config.capture_interval_secs);
    let output_dir = config.capture_output_dir.clone();

    tokio::fs::create_dir_all(&output_dir).await?;
    tracing::info!(
        output_dir = %output_dir.display(),
        interval_secs = config.capture_interval_secs,
        "Starting capture"
    );

    let mut source = FrameSource::open(config.source_config()).await?;
    let mut supervisor = ConnectionSupervisor::default();
    let mut saved: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(saved = saved, "Capture stopped");
                return Ok(());
            }
            result = source.read() => {
                match result {
                    Ok(frame) => {
                        supervisor.on_success();
                        saved += 1;
                        let name = format!(
                            "capture_{}_{:04}.jpg",
                            Local::now().format("%Y%m%d_%H%M%S"),
                            saved
                        );
                        let path = output_dir.join(&name);
                        tokio::fs::write(&path, &frame.data).await?;
                        tracing::info!(file = %path.display(), bytes = frame.data.len(), "Saved frame");
                        tokio::time::sleep(interval).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Frame read failed");
                        match supervisor.on_failure() {
                            RecoveryAction::Backoff => {
                                tokio::time::sleep(RETRY_BACKOFF).await;
                            }
                            RecoveryAction::Reconnect => {
                                if let Err(e) = source.reconnect().await {
                                    tracing::error!(error = %e, "Reconnect failed");
                                    tokio::time::sleep(RECONNECT_FAILED_BACKOFF).await;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
