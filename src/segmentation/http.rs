use super::preprocess::Preprocessor;
use super::types::{MaskSource, SegmentationError};
use crate::frame::{Frame, Mask};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;

/// Client for a remote segmentation service
///
/// The service takes a JPEG in the request body and answers with
/// `width * height` bytes, one per pixel, row-major.
pub struct HttpSegmenter {
    client: Client,
    url: Url,
    preprocessor: Preprocessor,
}

impl HttpSegmenter {
    /// Set up the HTTP client; nothing is sent until the first mask request
    pub fn new(url: &str, timeout: Duration, mask_max: u8) -> Result<Self> {
        let url = Url::parse(url)
            .with_context(|| format!("Invalid segmentation service URL {url:?}"))?;
        tracing::info!("Using segmentation service at {}", url);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url,
            preprocessor: Preprocessor::new(mask_max),
        })
    }
}

impl MaskSource for HttpSegmenter {
    fn request_mask(&mut self, frame: &Frame) -> Result<Mask, SegmentationError> {
        let _span = tracing::debug_span!("segment_request").entered();

        let body = Preprocessor::encode_jpeg(frame)?;
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .map_err(|e| SegmentationError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SegmentationError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .map_err(|e| SegmentationError::Transient(e.to_string()))?;

        let (width, height) = frame.dimensions();
        self.preprocessor.decode_mask(&bytes, width, height)
    }
}
