mod v4l_capture;

pub use v4l_capture::WebcamCapture;

use crate::frame::Frame;
use anyhow::Result;

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture a single frame at the configured resolution
    fn capture_frame(&mut self) -> Result<Frame>;
}
