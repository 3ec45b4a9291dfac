use crate::frame::{AlphaMask, Frame, MASK_MAX};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositeError {
    #[error("frame is {frame:?}, mask is {mask:?} and background is {background:?}")]
    DimensionMismatch {
        frame: (u32, u32),
        mask: (u32, u32),
        background: (u32, u32),
    },
}

/// Blend the subject over the background, reusing the subject frame's storage
///
/// Per channel: `frame * alpha + background * (1 - alpha)`, where alpha is the
/// mask value divided by [`MASK_MAX`] and clamped to [0, 1]. The background is
/// brought into the frame's channel order first.
pub fn composite(
    mut frame: Frame,
    mask: &AlphaMask,
    background: &Frame,
) -> Result<Frame, CompositeError> {
    let _span = tracing::debug_span!("composite").entered();

    let dims = frame.dimensions();
    if mask.dimensions() != dims || background.dimensions() != dims {
        return Err(CompositeError::DimensionMismatch {
            frame: dims,
            mask: mask.dimensions(),
            background: background.dimensions(),
        });
    }

    let background = if background.order() == frame.order() {
        std::borrow::Cow::Borrowed(background)
    } else {
        std::borrow::Cow::Owned(background.clone().into_order(frame.order()))
    };

    let pixels = frame.pixels_mut();
    for ((subject, back), alpha) in pixels
        .pixels_mut()
        .zip(background.pixels().pixels())
        .zip(mask.pixels())
    {
        let alpha = (alpha.0[0] / MASK_MAX).clamp(0.0, 1.0);
        for (s, &b) in subject.0.iter_mut().zip(back.0.iter()) {
            let blended = f32::from(*s) * alpha + f32::from(b) * (1.0 - alpha);
            *s = blended.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;
    use image::Luma;

    const A: [u8; 3] = [200, 30, 90];
    const B: [u8; 3] = [10, 240, 60];

    #[test]
    fn zero_mask_yields_background() {
        let frame = Frame::uniform(16, 12, A, ChannelOrder::Rgb);
        let background = Frame::uniform(16, 12, B, ChannelOrder::Rgb);
        let mask = AlphaMask::new(16, 12);
        let out = composite(frame, &mask, &background).unwrap();
        assert_eq!(out, background);
    }

    #[test]
    fn full_mask_yields_frame() {
        let frame = Frame::uniform(16, 12, A, ChannelOrder::Rgb);
        let background = Frame::uniform(16, 12, B, ChannelOrder::Rgb);
        let mask = AlphaMask::from_pixel(16, 12, Luma([MASK_MAX]));
        let out = composite(frame.clone(), &mask, &background).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn output_keeps_input_dimensions() {
        let frame = Frame::uniform(33, 7, A, ChannelOrder::Rgb);
        let background = Frame::uniform(33, 7, B, ChannelOrder::Rgb);
        let mask = AlphaMask::from_pixel(33, 7, Luma([100.0]));
        let out = composite(frame, &mask, &background).unwrap();
        assert_eq!(out.dimensions(), (33, 7));
    }

    #[test]
    fn half_alpha_averages() {
        let frame = Frame::uniform(2, 2, [200, 0, 100], ChannelOrder::Rgb);
        let background = Frame::uniform(2, 2, [0, 200, 100], ChannelOrder::Rgb);
        let mask = AlphaMask::from_pixel(2, 2, Luma([MASK_MAX / 2.0]));
        let out = composite(frame, &mask, &background).unwrap();
        assert_eq!(out.rgb_at(1, 1), [100, 100, 100]);
    }

    #[test]
    fn background_is_matched_to_frame_order() {
        let frame = Frame::uniform(4, 4, A, ChannelOrder::Bgr);
        let background = Frame::uniform(4, 4, B, ChannelOrder::Rgb);
        let mask = AlphaMask::new(4, 4);
        let out = composite(frame, &mask, &background).unwrap();
        assert_eq!(out.order(), ChannelOrder::Bgr);
        assert_eq!(out.rgb_at(2, 2), B);
    }

    #[test]
    fn out_of_range_mask_is_clamped() {
        let frame = Frame::uniform(2, 2, A, ChannelOrder::Rgb);
        let background = Frame::uniform(2, 2, B, ChannelOrder::Rgb);
        let mask = AlphaMask::from_pixel(2, 2, Luma([1000.0]));
        let out = composite(frame.clone(), &mask, &background).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let frame = Frame::uniform(16, 12, A, ChannelOrder::Rgb);
        let background = Frame::uniform(16, 12, B, ChannelOrder::Rgb);
        let mask = AlphaMask::new(8, 6);
        let err = composite(frame, &mask, &background).unwrap_err();
        assert_eq!(
            err,
            CompositeError::DimensionMismatch {
                frame: (16, 12),
                mask: (8, 6),
                background: (16, 12),
            }
        );
    }
}
