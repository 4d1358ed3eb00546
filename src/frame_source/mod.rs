//! FrameSource - Camera stream ingest
//!
//! ## Responsibilities
//!
//! - Own the connection to the camera (HTTP MJPEG stream or local webcam)
//! - Demux complete JPEG frames out of the byte stream
//! - Low-level read retries to absorb single dropped packets
//! - Reconnect cycle: release, cooldown, re-open, verify
//!
//! The webcam fallback shells out to ffmpeg and demuxes its MJPEG stdout
//! the same way as the network stream.

mod demux;
mod status;
mod supervisor;

pub use status::{SourceConnectionStatus, SourceStatusEvent, SourceStatusTracker};
pub use supervisor::{
    ConnectionSupervisor, RecoveryAction, DEFAULT_MAX_FAILED_ATTEMPTS, RECONNECT_COOLDOWN,
    RECONNECT_FAILED_BACKOFF, RETRY_BACKOFF,
};

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// Low-level read attempts inside a single `read` call
const LOW_LEVEL_READ_ATTEMPTS: u32 = 3;

/// Pause between low-level read attempts
const LOW_LEVEL_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// A read that produces no bytes within this span counts as a failure
const READ_CHUNK_TIMEOUT: Duration = Duration::from_secs(10);

/// One captured frame: JPEG bytes plus capture timestamp
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,
    pub captured_at: DateTime<Utc>,
}

/// Frame source settings
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Camera MJPEG stream URL
    pub stream_url: String,
    /// Use a local webcam instead of the network stream
    pub use_webcam: bool,
    /// Webcam device index (/dev/video{N})
    pub webcam_index: u32,
}

enum Conn {
    Http {
        stream: BoxStream<'static, reqwest::Result<Bytes>>,
        buf: BytesMut,
    },
    Device {
        child: Child,
        stdout: ChildStdout,
        buf: BytesMut,
    },
}

/// Owns one camera connection and produces frames from it
pub struct FrameSource {
    config: SourceConfig,
    client: reqwest::Client,
    conn: Option<Conn>,
}

impl FrameSource {
    /// Open the configured source and verify the connection
    pub async fn open(config: SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let mut source = Self {
            config,
            client,
            conn: None,
        };
        source.connect().await?;
        Ok(source)
    }

    /// Read the next frame.
    ///
    /// Internally retries up to [`LOW_LEVEL_READ_ATTEMPTS`] times with short
    /// pauses before declaring the read failed; this absorbs single dropped
    /// packets without invoking the caller's reconnect logic.
    pub async fn read(&mut self) -> Result<Frame> {
        for attempt in 1..=LOW_LEVEL_READ_ATTEMPTS {
            match self.next_jpeg().await {
                Ok(Some(data)) => {
                    return Ok(Frame {
                        data,
                        captured_at: Utc::now(),
                    })
                }
                Ok(None) => {
                    tracing::debug!(attempt = attempt, "Camera stream ended");
                }
                Err(e) => {
                    tracing::debug!(attempt = attempt, error = %e, "Camera read attempt failed");
                }
            }
            if attempt < LOW_LEVEL_READ_ATTEMPTS {
                tokio::time::sleep(LOW_LEVEL_RETRY_PAUSE).await;
            }
        }

        Err(Error::CaptureUnavailable(format!(
            "no frame after {} read attempts",
            LOW_LEVEL_READ_ATTEMPTS
        )))
    }

    /// True while an underlying connection is held
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Release the underlying connection
    pub fn close(&mut self) {
        if let Some(Conn::Device { mut child, .. }) = self.conn.take() {
            let _ = child.start_kill();
        }
    }

    /// Run one reconnect cycle: release, cooldown, re-open, verify.
    pub async fn reconnect(&mut self) -> Result<()> {
        tracing::info!("Attempting to reconnect to camera");
        self.close();
        tokio::time::sleep(RECONNECT_COOLDOWN).await;

        self.connect()
            .await
            .map_err(|e| Error::ReconnectFailed(e.to_string()))?;

        if !self.is_open() {
            return Err(Error::ReconnectFailed(
                "connection not open after re-open".to_string(),
            ));
        }

        tracing::info!("Camera reconnected");
        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        let conn = if self.config.use_webcam {
            self.open_device()?
        } else {
            self.open_http().await?
        };
        self.conn = Some(conn);
        Ok(())
    }

    // &mut keeps the connect future Send: a shared borrow held across the
    // await would require Sync, which the boxed body stream is not.
    async fn open_http(&mut self) -> Result<Conn> {
        tracing::info!(url = %self.config.stream_url, "Connecting to camera stream");
        let resp = self.client.get(&self.config.stream_url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::CaptureUnavailable(format!(
                "stream returned {}",
                resp.status()
            )));
        }
        Ok(Conn::Http {
            stream: resp.bytes_stream().boxed(),
            buf: BytesMut::new(),
        })
    }

    fn open_device(&self) -> Result<Conn> {
        let device = format!("/dev/video{}", self.config.webcam_index);
        tracing::info!(device = %device, "Opening webcam via ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "v4l2",
                "-i",
                &device,
                "-f",
                "mjpeg",
                "-q:v",
                "5",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::CaptureUnavailable("ffmpeg stdout not captured".to_string())
        })?;

        Ok(Conn::Device {
            child,
            stdout,
            buf: BytesMut::new(),
        })
    }

    /// Pull bytes until a complete JPEG is available.
    ///
    /// `Ok(None)` means the underlying stream ended cleanly.
    async fn next_jpeg(&mut self) -> Result<Option<Bytes>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::CaptureUnavailable("source not open".to_string()))?;

        loop {
            match conn {
                Conn::Http { stream, buf } => {
                    if let Some(frame) = demux::extract_jpeg(buf) {
                        return Ok(Some(frame));
                    }
                    if demux::overflowed(buf) {
                        buf.clear();
                        return Err(Error::CaptureUnavailable(
                            "no frame boundary within buffer limit".to_string(),
                        ));
                    }
                    match tokio::time::timeout(READ_CHUNK_TIMEOUT, stream.next()).await {
                        Ok(Some(Ok(chunk))) => buf.extend_from_slice(&chunk),
                        Ok(Some(Err(e))) => {
                            return Err(Error::CaptureUnavailable(e.to_string()))
                        }
                        Ok(None) => return Ok(None),
                        Err(_) => {
                            return Err(Error::CaptureUnavailable(
                                "stream read timed out".to_string(),
                            ))
                        }
                    }
                }
                Conn::Device { stdout, buf, .. } => {
                    if let Some(frame) = demux::extract_jpeg(buf) {
                        return Ok(Some(frame));
                    }
                    if demux::overflowed(buf) {
                        buf.clear();
                        return Err(Error::CaptureUnavailable(
                            "no frame boundary within buffer limit".to_string(),
                        ));
                    }
                    match tokio::time::timeout(READ_CHUNK_TIMEOUT, stdout.read_buf(buf)).await {
                        Ok(Ok(0)) => return Ok(None),
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => {
                            return Err(Error::CaptureUnavailable(
                                "webcam read timed out".to_string(),
                            ))
                        }
                    }
                }
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
