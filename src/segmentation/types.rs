use crate::frame::{Frame, Mask};
use thiserror::Error;

/// Failures talking to the segmentation service
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// Connection refused, timeout or a broken response body
    #[error("segmentation service unreachable: {0}")]
    Transient(String),

    #[error("segmentation service answered with HTTP {0}")]
    Status(u16),

    #[error("mask has {actual} bytes, expected {expected} for a {width}x{height} frame")]
    MalformedMask {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },

    #[error("failed to encode frame for segmentation: {0}")]
    Encode(#[from] image::ImageError),

    #[error("segmentation still failing after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SegmentationError>,
    },
}

impl SegmentationError {
    /// Whether waiting and asking again can reasonably succeed
    ///
    /// A service that is still warming up either refuses connections or
    /// answers 5xx; anything else is a problem retrying won't fix.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Status(code) => (500..600).contains(code),
            _ => false,
        }
    }
}

/// One round trip to something that can segment a frame
///
/// Implementations do not retry; that is [`super::SegmentationClient`]'s job.
pub trait MaskSource {
    /// Return a mask with exactly the dimensions of `frame`
    fn request_mask(&mut self, frame: &Frame) -> Result<Mask, SegmentationError>;
}
