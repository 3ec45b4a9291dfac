use super::types::SegmentationError;
use crate::frame::{ChannelOrder, Frame, Mask};
use image::{imageops, ImageFormat, Luma};
use std::io::Cursor;

/// Prepares frames for the segmentation service and turns its replies into masks
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    mask_max: u8,
}

impl Preprocessor {
    /// `mask_max` is the value the service uses for "fully foreground"
    /// (255 for intensity masks, 1 for binary ones). Zero is treated as 255.
    pub fn new(mask_max: u8) -> Self {
        Self {
            mask_max: if mask_max == 0 { u8::MAX } else { mask_max },
        }
    }

    /// Shrink a frame to half width and height for the downscale-for-speed path
    pub fn shrink(frame: &Frame) -> Frame {
        let (width, height) = frame.dimensions();
        frame
            .clone()
            .resized((width / 2).max(1), (height / 2).max(1))
    }

    /// Scale a mask back up to the full frame size
    pub fn upscale_mask(mask: Mask, width: u32, height: u32) -> Mask {
        let _span = tracing::debug_span!("upscale_mask").entered();

        if mask.dimensions() == (width, height) {
            return mask;
        }
        imageops::resize(&mask, width, height, imageops::FilterType::Triangle)
    }

    /// Encode a frame as JPEG, always in true RGB order
    pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, SegmentationError> {
        let _span = tracing::debug_span!("encode_jpeg").entered();

        let rgb = frame.clone().into_order(ChannelOrder::Rgb);
        let mut bytes = Vec::new();
        rgb.pixels()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
        Ok(bytes)
    }

    /// Reshape a raw row-major byte buffer into a mask on the [0, 255] scale
    pub fn decode_mask(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Mask, SegmentationError> {
        let expected = width as usize * height as usize;
        if bytes.len() != expected {
            return Err(SegmentationError::MalformedMask {
                expected,
                actual: bytes.len(),
                width,
                height,
            });
        }

        let scale = f32::from(u8::MAX) / f32::from(self.mask_max);
        let mut mask = Mask::new(width, height);
        for (pixel, &raw) in mask.pixels_mut().zip(bytes) {
            let value = (f32::from(raw) * scale).round().min(255.0) as u8;
            *pixel = Luma([value]);
        }
        Ok(mask)
    }
}
