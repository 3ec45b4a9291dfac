mod loopback;

pub use loopback::V4L2Output;

use crate::frame::{ChannelOrder, Frame};
use anyhow::Result;
use clap::ValueEnum;

/// Trait for output destinations
pub trait OutputSink {
    /// Hand a frame to the output; it must already be in [`OutputSink::channel_order`]
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Channel order the sink expects frames in
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }
}

/// Pixel layout announced to, and written to, the loopback device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PixelFormat {
    /// Packed 4:2:2, understood by nearly every consumer
    #[default]
    Yuyv,
    /// Packed 24-bit RGB
    Rgb24,
    /// Packed 24-bit BGR
    Bgr24,
}

impl PixelFormat {
    pub fn fourcc(self) -> &'static [u8; 4] {
        match self {
            Self::Yuyv => b"YUYV",
            Self::Rgb24 => b"RGB3",
            Self::Bgr24 => b"BGR3",
        }
    }

    /// Bytes in one `width` x `height` frame
    pub fn frame_size(self, width: u32, height: u32) -> u32 {
        let per_pixel = match self {
            Self::Yuyv => 2,
            Self::Rgb24 | Self::Bgr24 => 3,
        };
        width * height * per_pixel
    }

    /// Order the frame's channels must be in before encoding
    pub fn channel_order(self) -> ChannelOrder {
        match self {
            Self::Bgr24 => ChannelOrder::Bgr,
            Self::Yuyv | Self::Rgb24 => ChannelOrder::Rgb,
        }
    }
}
