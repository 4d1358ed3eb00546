//! DetectorClient - Inference server adapter
//!
//! ## Responsibilities
//!
//! - Send detection requests to the inference server (multipart JPEG upload)
//! - Parse bounding-box responses
//! - Expose model class names for allowlist resolution
//!
//! The model itself is an external collaborator; this module is the whole
//! boundary. [`Detect`] is the seam the pipeline works against, so tests can
//! substitute a stub detector.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Detection thresholds passed to the model per call
#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Confidence threshold
    pub confidence: f32,
    /// IoU/NMS threshold
    pub iou: f32,
    /// Max detections per frame
    pub max_detections: u32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.45,
            max_detections: 5,
        }
    }
}

/// One detected box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Model class name (e.g. "person")
    pub label: String,
    pub confidence: f32,
}

/// Frame -> detections capability
#[async_trait]
pub trait Detect: Send + Sync {
    /// Run inference on one JPEG frame
    async fn detect(&self, frame: &[u8], options: &DetectOptions) -> Result<Vec<BoundingBox>>;

    /// Class names the loaded model can produce
    async fn class_names(&self) -> Result<Vec<String>>;

    /// True when the server is up and a model is loaded
    async fn health_check(&self) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<BoundingBox>,
}

#[derive(Debug, Deserialize)]
struct ClassesResponse {
    classes: Vec<String>,
}

/// HTTP detector client
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetector {
    /// Create a new client for the given inference server
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { client, base_url }
    }
}

#[async_trait]
impl Detect for HttpDetector {
    async fn detect(&self, frame: &[u8], options: &DetectOptions) -> Result<Vec<BoundingBox>> {
        let url = format!("{}/detect", self.base_url);

        let part = Part::bytes(frame.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::Detector(e.to_string()))?;

        let form = Form::new()
            .part("image", part)
            .text("conf", options.confidence.to_string())
            .text("iou", options.iou.to_string())
            .text("max_det", options.max_detections.to_string());

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Detector(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Detector(format!(
                "inference server returned {}",
                resp.status()
            )));
        }

        let body: DetectResponse = resp
            .json()
            .await
            .map_err(|e| Error::Detector(e.to_string()))?;

        Ok(body.detections)
    }

    async fn class_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/classes", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Detector(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Detector(format!(
                "classes endpoint returned {}",
                resp.status()
            )));
        }

        let body: ClassesResponse = resp
            .json()
            .await
            .map_err(|e| Error::Detector(e.to_string()))?;

        Ok(body.classes)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
