use super::{OutputSink, PixelFormat};
use crate::frame::{ChannelOrder, Frame};
use anyhow::{ensure, Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, FourCC};

/// Virtual camera backed by a v4l2loopback device
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(
        device_path: P,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{} {:?})",
            path.display(),
            width,
            height,
            pixel_format
        );

        // Announce the format so consumers of the loopback device see our size and layout
        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        let mut format = Output::format(&device).context("Failed to query output format")?;
        format.width = width;
        format.height = height;
        format.fourcc = FourCC::new(pixel_format.fourcc());
        format.size = pixel_format.frame_size(width, height);
        let applied = Output::set_format(&device, &format).context("Failed to set output format")?;
        tracing::debug!("v4l2loopback format: {:?}", applied);

        // Frames themselves are written raw to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
            format: pixel_format,
        })
    }

    /// Bytes for one frame in `format`; the frame must already be in its channel order
    fn encode(format: PixelFormat, frame: &Frame) -> Result<Vec<u8>> {
        ensure!(
            frame.order() == format.channel_order(),
            "{:?} output expects {:?} frames, got {:?}",
            format,
            format.channel_order(),
            frame.order()
        );

        Ok(match format {
            PixelFormat::Yuyv => Self::rgb_to_yuyv(frame.pixels()),
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => frame.pixels().as_raw().clone(),
        })
    }

    /// Convert RGB frame to YUV422 (YUYV) format
    fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
        let (width, height) = rgb_image.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = rgb_image.get_pixel(x, y);
                let pixel2 = if x + 1 < width {
                    rgb_image.get_pixel(x + 1, y)
                } else {
                    pixel1
                };

                let (y1, u1, v1) = rgb_to_yuv(pixel1[0], pixel1[1], pixel1[2]);
                let (y2, u2, v2) = rgb_to_yuv(pixel2[0], pixel2[1], pixel2[2]);

                // Chroma is shared by each horizontal pixel pair
                let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                // YUYV format: Y0 U Y1 V
                yuyv.extend_from_slice(&[y1, u, y2, v]);
            }
        }

        yuyv
    }
}

/// Convert RGB to YUV color space
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let data = if frame.dimensions() != (self.width, self.height) {
            let resized = frame.clone().resized(self.width, self.height);
            Self::encode(self.format, &resized)?
        } else {
            Self::encode(self.format, frame)?
        };

        self.file
            .write_all(&data)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn channel_order(&self) -> ChannelOrder {
        self.format.channel_order()
    }
}
