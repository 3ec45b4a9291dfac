//! Mask refinement: grow the raw segmentation mask, then soften its edges.
//!
//! Segmentation services tend to under-estimate where the subject ends, so the
//! mask is first dilated with a square structuring element and then box
//! blurred in floating point, producing soft transition bands that work as
//! an alpha channel.

use crate::frame::{AlphaMask, Mask};
use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, Mask as StructuringElement};

/// Default edge length of the dilation structuring element
pub const DEFAULT_DILATE_SIZE: u32 = 10;

/// Default edge length of the box blur kernel
pub const DEFAULT_BLUR_SIZE: u32 = 10;

/// Largest kernel edge the structuring element can be built with
const MAX_KERNEL_SIZE: u32 = 255;

/// Turns raw masks into alpha masks. A size of 0 or 1 disables that step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskPostProcessor {
    dilate_size: u32,
    blur_size: u32,
}

impl Default for MaskPostProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_DILATE_SIZE, DEFAULT_BLUR_SIZE)
    }
}

impl MaskPostProcessor {
    pub fn new(dilate_size: u32, blur_size: u32) -> Self {
        Self {
            dilate_size: dilate_size.min(MAX_KERNEL_SIZE),
            blur_size,
        }
    }

    /// Dilate once, then box blur over the float representation
    ///
    /// Output stays on the [0, 255] scale. Pure function of `mask`.
    #[must_use = "returns the refined mask"]
    pub fn refine(&self, mask: &Mask) -> AlphaMask {
        let _span = tracing::debug_span!("refine_mask").entered();

        let dilated = self.dilate(mask);
        let float = AlphaMask::from_fn(dilated.width(), dilated.height(), |x, y| {
            Luma([f32::from(dilated.get_pixel(x, y).0[0])])
        });
        box_blur(&float, self.blur_size)
    }

    fn dilate(&self, mask: &Mask) -> GrayImage {
        if self.dilate_size <= 1 {
            return mask.clone();
        }
        // Anchor at size / 2, the same convention the box blur uses
        let size = self.dilate_size;
        let anchor = (size / 2) as u8;
        let shape = GrayImage::from_pixel(size, size, Luma([u8::MAX]));
        let element = StructuringElement::from_image(&shape, anchor, anchor);
        grayscale_dilate(mask, &element)
    }
}

/// Normalized box filter with a `size` x `size` kernel anchored at `size / 2`
///
/// Borders reflect without repeating the edge pixel (`dcb|abcd|cba`).
fn box_blur(image: &AlphaMask, size: u32) -> AlphaMask {
    if size <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let (width, height) = (image.width() as usize, image.height() as usize);
    let anchor = i64::from(size / 2);
    let norm = size as f32;
    let src = image.as_raw();

    let mut horizontal = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let sum: f32 = (0..i64::from(size))
                .map(|k| row[reflect_101(x as i64 + k - anchor, width)])
                .sum();
            horizontal[y * width + x] = sum / norm;
        }
    }

    AlphaMask::from_fn(image.width(), image.height(), |x, y| {
        let sum: f32 = (0..i64::from(size))
            .map(|k| {
                let sy = reflect_101(i64::from(y) + k - anchor, height);
                horizontal[sy * width + x as usize]
            })
            .sum();
        Luma([sum / norm])
    })
}

fn reflect_101(index: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as i64;
    let period = 2 * (len - 1);
    let i = index.rem_euclid(period);
    (if i >= len { period - i } else { i }) as usize
}
