//! DetectionGate - Frame-skip policy and detection metrics
//!
//! ## Responsibilities
//!
//! - Run detector inference only every Nth frame (skip-rate policy)
//! - Filter detections to the person/human class allowlist
//! - Measure inference latency and jitter (gated frames only)
//! - Annotate frames with retained boxes for the live stream
//!
//! Skipped frames pass the prior annotated frame through unchanged and
//! never touch the detector.

mod annotate;

pub use annotate::annotate_jpeg;

use crate::detector_client::{BoundingBox, Detect, DetectOptions};
use crate::frame_source::Frame;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Class names treated as "person" for detection purposes
pub const PERSON_CLASS_NAMES: [&str; 2] = ["person", "human"];

/// Outcome of processing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// At least one retained box matched the allowlist
    pub detected: bool,
    /// Number of retained boxes
    pub count: i64,
    /// Wall-clock span of the inference call, milliseconds
    pub latency_ms: f64,
    /// |latency - previous gated latency|, 0 on the first gated frame
    pub jitter_ms: f64,
}

impl DetectionResult {
    /// Result for a frame the skip policy passed through
    pub fn skipped() -> Self {
        Self {
            detected: false,
            count: 0,
            latency_ms: 0.0,
            jitter_ms: 0.0,
        }
    }
}

/// Resolve the person-class allowlist against the model's class names.
///
/// Match is case-insensitive and whitespace-trimmed. An empty result is the
/// permissive fallback: every class counts as a person.
pub fn resolve_allowlist(class_names: &[String]) -> HashSet<String> {
    let mut allowlist = HashSet::new();
    for name in class_names {
        let normalized = name.trim().to_lowercase();
        if PERSON_CLASS_NAMES.contains(&normalized.as_str()) {
            allowlist.insert(normalized);
        }
    }
    allowlist
}

/// Jitter between consecutive gated latency measurements
fn jitter_ms(prev_latency_ms: Option<f64>, latency_ms: f64) -> f64 {
    match prev_latency_ms {
        Some(prev) => (latency_ms - prev).abs(),
        None => 0.0,
    }
}

/// Per-device detection gate; owns the skip/latency/annotation state
pub struct DetectionGate {
    detector: Arc<dyn Detect>,
    options: DetectOptions,
    allowlist: HashSet<String>,
    skip_rate: u64,
    last_latency_ms: Option<f64>,
    last_annotated: Option<Bytes>,
}

impl DetectionGate {
    pub fn new(
        detector: Arc<dyn Detect>,
        options: DetectOptions,
        allowlist: HashSet<String>,
        skip_rate: u64,
    ) -> Self {
        Self {
            detector,
            options,
            allowlist,
            // skip_rate 0 would never gate a frame; treat it as every frame
            skip_rate: skip_rate.max(1),
            last_latency_ms: None,
            last_annotated: None,
        }
    }

    /// Process one frame: run inference if the skip policy selects it,
    /// otherwise pass the prior annotated frame through.
    pub async fn process(&mut self, frame: &Frame, frame_index: u64) -> (Bytes, DetectionResult) {
        if frame_index % self.skip_rate != 0 {
            let out = self
                .last_annotated
                .clone()
                .unwrap_or_else(|| frame.data.clone());
            return (out, DetectionResult::skipped());
        }

        let started = Instant::now();
        let boxes = match self.detector.detect(&frame.data, &self.options).await {
            Ok(boxes) => boxes,
            Err(e) => {
                tracing::warn!(error = %e, "Detector error, no detection this frame");
                Vec::new()
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let jitter_ms = jitter_ms(self.last_latency_ms, latency_ms);
        self.last_latency_ms = Some(latency_ms);

        let retained: Vec<BoundingBox> = boxes
            .into_iter()
            .filter(|b| self.matches_allowlist(&b.label))
            .collect();

        let annotated = match annotate_jpeg(&frame.data, &retained) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::debug!(error = %e, "Annotation failed, passing raw frame through");
                frame.data.clone()
            }
        };
        self.last_annotated = Some(annotated.clone());

        let result = DetectionResult {
            detected: !retained.is_empty(),
            count: retained.len() as i64,
            latency_ms,
            jitter_ms,
        };
        (annotated, result)
    }

    fn matches_allowlist(&self, label: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.contains(&label.trim().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDetector {
        calls: AtomicUsize,
        boxes: Vec<BoundingBox>,
        fail: bool,
    }

    impl StubDetector {
        fn with_boxes(boxes: Vec<BoundingBox>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                boxes,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                boxes: Vec::new(),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Detect for StubDetector {
        async fn detect(
            &self,
            _frame: &[u8],
            _options: &DetectOptions,
        ) -> Result<Vec<BoundingBox>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(crate::Error::Detector("stub failure".to_string()));
            }
            Ok(self.boxes.clone())
        }

        async fn class_names(&self) -> Result<Vec<String>> {
            Ok(vec!["person".to_string()])
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn frame() -> Frame {
        Frame {
            data: Bytes::from_static(b"\xFF\xD8not-really-a-jpeg\xFF\xD9"),
            captured_at: Utc::now(),
        }
    }

    fn labeled_box(label: &str) -> BoundingBox {
        BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            label: label.to_string(),
            confidence: 0.8,
        }
    }

    fn person_allowlist() -> HashSet<String> {
        ["person".to_string()].into_iter().collect()
    }

    #[tokio::test]
    async fn test_detector_runs_only_on_gated_frames() {
        let detector = Arc::new(StubDetector::with_boxes(vec![]));
        let mut gate = DetectionGate::new(
            detector.clone(),
            DetectOptions::default(),
            person_allowlist(),
            5,
        );

        for i in 0..=10 {
            let (_, result) = gate.process(&frame(), i).await;
            if i % 5 != 0 {
                assert!(!result.detected);
                assert_eq!(result.count, 0);
            }
        }

        // Frames 0, 5, 10
        assert_eq!(detector.calls(), 3);
    }

    #[tokio::test]
    async fn test_allowlist_filters_labels() {
        let detector = Arc::new(StubDetector::with_boxes(vec![
            labeled_box("person"),
            labeled_box("car"),
        ]));
        let mut gate =
            DetectionGate::new(detector, DetectOptions::default(), person_allowlist(), 1);

        let (_, result) = gate.process(&frame(), 0).await;
        assert!(result.detected);
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn test_empty_allowlist_is_permissive() {
        let detector = Arc::new(StubDetector::with_boxes(vec![
            labeled_box("car"),
            labeled_box("dog"),
        ]));
        let mut gate = DetectionGate::new(detector, DetectOptions::default(), HashSet::new(), 1);

        let (_, result) = gate.process(&frame(), 0).await;
        assert!(result.detected);
        assert_eq!(result.count, 2);
    }

    #[tokio::test]
    async fn test_case_and_whitespace_insensitive_match() {
        let detector = Arc::new(StubDetector::with_boxes(vec![labeled_box(" Person ")]));
        let mut gate =
            DetectionGate::new(detector, DetectOptions::default(), person_allowlist(), 1);

        let (_, result) = gate.process(&frame(), 0).await;
        assert!(result.detected);
    }

    #[tokio::test]
    async fn test_detector_error_degrades_to_no_detection() {
        let detector = Arc::new(StubDetector::failing());
        let mut gate = DetectionGate::new(
            detector.clone(),
            DetectOptions::default(),
            person_allowlist(),
            1,
        );

        let (_, result) = gate.process(&frame(), 0).await;
        assert!(!result.detected);
        assert_eq!(result.count, 0);

        // Pipeline keeps going on the next frame
        let (_, result) = gate.process(&frame(), 1).await;
        assert!(!result.detected);
        assert_eq!(detector.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_gated_frame_has_zero_jitter() {
        let detector = Arc::new(StubDetector::with_boxes(vec![]));
        let mut gate =
            DetectionGate::new(detector, DetectOptions::default(), person_allowlist(), 1);

        let (_, result) = gate.process(&frame(), 0).await;
        assert_eq!(result.jitter_ms, 0.0);
    }

    #[tokio::test]
    async fn test_skipped_frame_reuses_prior_annotated_frame() {
        let detector = Arc::new(StubDetector::with_boxes(vec![]));
        let mut gate =
            DetectionGate::new(detector, DetectOptions::default(), person_allowlist(), 5);

        let (gated_out, _) = gate.process(&frame(), 0).await;
        let (skipped_out, _) = gate.process(&frame(), 1).await;
        assert_eq!(gated_out, skipped_out);
    }

    #[test]
    fn test_jitter_is_absolute_difference() {
        assert_eq!(jitter_ms(None, 120.0), 0.0);
        assert_eq!(jitter_ms(Some(100.0), 120.0), 20.0);
        assert_eq!(jitter_ms(Some(120.0), 100.0), 20.0);
    }

    #[test]
    fn test_resolve_allowlist_matches_person_and_human() {
        let names = vec![
            "Person".to_string(),
            " HUMAN ".to_string(),
            "car".to_string(),
        ];
        let allowlist = resolve_allowlist(&names);
        assert_eq!(allowlist.len(), 2);
        assert!(allowlist.contains("person"));
        assert!(allowlist.contains("human"));
    }

    #[test]
    fn test_resolve_allowlist_empty_when_no_match() {
        let names = vec!["car".to_string(), "truck".to_string()];
        assert!(resolve_allowlist(&names).is_empty());
    }
}
