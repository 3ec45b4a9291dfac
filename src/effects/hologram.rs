//! Hologram look: a cool color map, dark horizontal bands and two ghost copies
//! offset diagonally, laid over the original frame slightly oversaturated.

use crate::frame::Frame;
use image::{Rgb, RgbImage};
use rand::Rng;

/// Rows per dark band
pub const BAND_LENGTH: u32 = 2;
/// Untouched rows between bands
pub const BAND_GAP: u32 = 3;
/// Diagonal offset of the ghost copies, in pixels
pub const GHOST_OFFSET: i32 = 5;

const BAND_DARKEN_MIN: f32 = 0.1;
const BAND_DARKEN_MAX: f32 = 0.3;

/// Apply the hologram effect; band darkness is drawn from `rng` once per band
pub fn apply<R: Rng>(frame: &Frame, rng: &mut R) -> Frame {
    let (width, height) = frame.dimensions();

    let mut holo = RgbImage::from_fn(width, height, |x, y| {
        let gray = frame.luma(x, y).round().clamp(0.0, 255.0) as u8;
        frame.pixel_from_rgb(winter(gray))
    });

    let mut factor = 1.0f32;
    for y in 0..height {
        let phase = y % (BAND_LENGTH + BAND_GAP);
        if phase == 0 {
            factor = rng.random_range(BAND_DARKEN_MIN..=BAND_DARKEN_MAX);
        }
        if phase < BAND_LENGTH {
            for x in 0..width {
                for channel in holo.get_pixel_mut(x, y).0.iter_mut() {
                    *channel = (f32::from(*channel) * factor) as u8;
                }
            }
        }
    }

    // Sequential blends: the second ghost goes over the result of the first
    let ghosted = add_weighted(
        &holo,
        0.2,
        &shift_image(&holo, GHOST_OFFSET, GHOST_OFFSET),
        0.8,
    );
    let ghosted = add_weighted(
        &ghosted,
        0.4,
        &shift_image(&holo, -GHOST_OFFSET, -GHOST_OFFSET),
        0.6,
    );

    // Weights sum past 1.0 on purpose
    Frame::new(add_weighted(frame.pixels(), 0.5, &ghosted, 0.6), frame.order())
}

/// Blue-to-green ramp: red is always off, green rises with intensity, blue falls to half
fn winter(gray: u8) -> [u8; 3] {
    let blue = (255.0 - f32::from(gray) / 2.0).round() as u8;
    [0, gray, blue]
}

/// Shift an image by (dx, dy), wrapping around and then blanking what wrapped
///
/// A positive `dy` blanks the first `dy` rows, a negative one the last `|dy|`;
/// columns follow the same rule with `dx`.
pub fn shift_image(image: &RgbImage, dx: i32, dy: i32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (w, h) = (i64::from(width), i64::from(height));
    let (dx, dy) = (i64::from(dx), i64::from(dy));

    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let vacated = (dy > 0 && y < dy)
            || (dy < 0 && y >= h + dy)
            || (dx > 0 && x < dx)
            || (dx < 0 && x >= w + dx);
        if vacated {
            return Rgb([0, 0, 0]);
        }
        let sx = (x - dx).rem_euclid(w) as u32;
        let sy = (y - dy).rem_euclid(h) as u32;
        *image.get_pixel(sx, sy)
    })
}

/// Per-channel `a * alpha + b * beta`, rounded and saturated to u8
fn add_weighted(a: &RgbImage, alpha: f32, b: &RgbImage, beta: f32) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let (pa, pb) = (a.get_pixel(x, y).0, b.get_pixel(x, y).0);
        Rgb(std::array::from_fn(|c| {
            (f32::from(pa[c]) * alpha + f32::from(pb[c]) * beta)
                .round()
                .clamp(0.0, 255.0) as u8
        }))
    })
}
