//! StreamPublisher - Latest-frame fanout for the live MJPEG stream
//!
//! ## Responsibilities
//!
//! - Hold the latest annotated frame (single writer, many readers)
//! - Frame JPEG bytes as multipart/x-mixed-replace chunks
//! - Pace emission so no subscriber exceeds the FPS cap
//!
//! Subscribers always see the newest frame; frames published while a
//! subscriber is paced are dropped, never queued.

use bytes::{BufMut, Bytes, BytesMut};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Multipart boundary token shared with the HTTP content type
pub const STREAM_BOUNDARY: &str = "frame";

/// Latest-frame cell shared between the pipeline and stream handlers
pub struct StreamPublisher {
    tx: watch::Sender<Option<Bytes>>,
}

impl StreamPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Replace the latest frame; wakes all subscribers
    pub fn publish(&self, frame: Bytes) {
        // send only fails with no receivers, which is fine for a cell
        let _ = self.tx.send(Some(frame));
    }

    /// Subscribe to latest-frame updates
    pub fn subscribe(&self) -> watch::Receiver<Option<Bytes>> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap one JPEG into a multipart chunk:
/// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`
pub fn mjpeg_chunk(jpeg: &[u8]) -> Bytes {
    let header = format!("--{STREAM_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut out = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    out.put_slice(header.as_bytes());
    out.put_slice(jpeg);
    out.put_slice(b"\r\n");
    out.freeze()
}

/// Per-subscriber pacing toward a maximum frame rate
#[derive(Debug)]
pub struct FpsGovernor {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl FpsGovernor {
    /// `max_fps` of 0 disables pacing
    pub fn new(max_fps: u32) -> Self {
        let min_interval = if max_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / max_fps as f64)
        };
        Self {
            min_interval,
            last_emit: None,
        }
    }

    /// Pause required before the next emit, and mark the emit as happening
    /// after that pause.
    pub fn pause_before_emit(&mut self, now: Instant) -> Duration {
        let pause = match self.last_emit {
            Some(last) => {
                let elapsed = now.duration_since(last);
                self.min_interval.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        };
        self.last_emit = Some(now + pause);
        pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_framing() {
        let chunk = mjpeg_chunk(b"JPEGDATA");
        let expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEGDATA\r\n";
        assert_eq!(&chunk[..], &expected[..]);
    }

    #[test]
    fn test_chunk_preserves_binary_payload() {
        let payload = [0xFFu8, 0xD8, 0x00, 0x0D, 0x0A, 0xFF, 0xD9];
        let chunk = mjpeg_chunk(&payload);
        assert!(chunk.ends_with(b"\x0D\x0A\xFF\xD9\r\n"));
    }

    #[test]
    fn test_governor_first_emit_is_immediate() {
        let mut governor = FpsGovernor::new(10);
        assert_eq!(governor.pause_before_emit(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_governor_enforces_min_interval() {
        let mut governor = FpsGovernor::new(10);
        let t0 = Instant::now();

        assert_eq!(governor.pause_before_emit(t0), Duration::ZERO);

        // 40ms after the first emit, 60ms of the 100ms interval remain
        let pause = governor.pause_before_emit(t0 + Duration::from_millis(40));
        assert_eq!(pause, Duration::from_millis(60));
    }

    #[test]
    fn test_governor_no_pause_after_slow_consumer() {
        let mut governor = FpsGovernor::new(10);
        let t0 = Instant::now();

        governor.pause_before_emit(t0);
        let pause = governor.pause_before_emit(t0 + Duration::from_millis(500));
        assert_eq!(pause, Duration::ZERO);
    }

    #[test]
    fn test_governor_zero_fps_never_paces() {
        let mut governor = FpsGovernor::new(0);
        let t0 = Instant::now();
        governor.pause_before_emit(t0);
        assert_eq!(governor.pause_before_emit(t0), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_frame_only() {
        let publisher = StreamPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.publish(Bytes::from_static(b"one"));
        publisher.publish(Bytes::from_static(b"two"));

        rx.changed().await.unwrap();
        let latest = rx.borrow_and_update().clone();
        assert_eq!(latest, Some(Bytes::from_static(b"two")));
    }

    #[tokio::test]
    async fn test_subscriber_count_tracks_receivers() {
        let publisher = StreamPublisher::new();
        assert_eq!(publisher.subscriber_count(), 0);
        let rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);
        drop(rx);
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
