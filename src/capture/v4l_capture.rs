use super::CaptureSource;
use crate::frame::{ChannelOrder, Frame};
use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    /// Open the physical camera and ask for the closest format to `width`x`height`@`fps`
    pub fn new(device: &str, width: u32, height: u32, fps: u32) -> Result<Self> {
        tracing::info!("Initializing webcam {} at {}x{}@{}", device, width, height, fps);

        let index = camera_index(device);
        let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        tracing::info!("Webcam initialized with format {:?}", camera.camera_format());

        Ok(Self {
            camera,
            width,
            height,
        })
    }
}

/// `/dev/videoN` maps to index N; anything else is handed to the backend verbatim
fn camera_index(device: &str) -> CameraIndex {
    device
        .strip_prefix("/dev/video")
        .and_then(|n| n.parse::<u32>().ok())
        .map(CameraIndex::Index)
        .unwrap_or_else(|| CameraIndex::String(device.to_string()))
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<Frame> {
        let frame = self
            .camera
            .frame()
            .context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        // The driver may settle on a different mode than requested
        Ok(Frame::new(decoded, ChannelOrder::Rgb).resized(self.width, self.height))
    }
}
