use image::{imageops, GrayImage, ImageBuffer, Luma, RgbImage};

/// Raw segmentation mask: one byte per pixel, 0 = background, 255 = foreground
pub type Mask = GrayImage;

/// Refined mask on the same [0, 255] scale, stored as floats so soft edges survive blurring
pub type AlphaMask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Value an [`AlphaMask`] takes where the subject is fully opaque
pub const MASK_MAX: f32 = 255.0;

/// Order of the three color channels inside a [`Frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// A 3-channel pixel buffer with an explicitly declared channel order
///
/// The underlying buffer is an `RgbImage` purely as 3 x u8 storage; the
/// `order` field says what the channels actually hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl Frame {
    pub fn new(pixels: RgbImage, order: ChannelOrder) -> Self {
        Self { pixels, order }
    }

    /// A frame filled with one color, given in RGB regardless of `order`
    #[cfg(test)]
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3], order: ChannelOrder) -> Self {
        let pixel = image::Rgb(Self::arrange(rgb, order));
        Self::new(RgbImage::from_pixel(width, height, pixel), order)
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbImage {
        &mut self.pixels
    }

    /// Convert to `order`, swapping the first and third channel when needed
    pub fn into_order(mut self, order: ChannelOrder) -> Self {
        if self.order != order {
            for pixel in self.pixels.pixels_mut() {
                pixel.0.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    /// Resize to exactly `width` x `height`; a no-op when the size already matches
    pub fn resized(self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self;
        }
        let pixels = imageops::resize(
            &self.pixels,
            width,
            height,
            imageops::FilterType::Triangle,
        );
        Self::new(pixels, self.order)
    }

    /// Rec. 601 luma of the pixel at (x, y), independent of channel order
    pub fn luma(&self, x: u32, y: u32) -> f32 {
        let [r, g, b] = Self::arrange(self.pixels.get_pixel(x, y).0, self.order);
        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
    }

    // RGB <-> `order` is its own inverse, so the same helper serves both directions
    fn arrange(channels: [u8; 3], order: ChannelOrder) -> [u8; 3] {
        match order {
            ChannelOrder::Rgb => channels,
            ChannelOrder::Bgr => [channels[2], channels[1], channels[0]],
        }
    }

    /// Pixel at (x, y) as RGB
    #[cfg(test)]
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        Self::arrange(self.pixels.get_pixel(x, y).0, self.order)
    }

    /// Build the 3-channel pixel for an RGB color in this frame's order
    pub fn pixel_from_rgb(&self, rgb: [u8; 3]) -> image::Rgb<u8> {
        image::Rgb(Self::arrange(rgb, self.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_frame_reads_back_as_rgb() {
        let frame = Frame::uniform(4, 3, [10, 20, 30], ChannelOrder::Bgr);
        assert_eq!(frame.pixels().get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(frame.rgb_at(3, 2), [10, 20, 30]);
    }

    #[test]
    fn into_order_swaps_red_and_blue() {
        let frame = Frame::uniform(2, 2, [1, 2, 3], ChannelOrder::Rgb);
        let bgr = frame.into_order(ChannelOrder::Bgr);
        assert_eq!(bgr.order(), ChannelOrder::Bgr);
        assert_eq!(bgr.pixels().get_pixel(1, 1).0, [3, 2, 1]);
        assert_eq!(bgr.rgb_at(1, 1), [1, 2, 3]);
    }

    #[test]
    fn into_same_order_is_untouched() {
        let frame = Frame::uniform(2, 2, [1, 2, 3], ChannelOrder::Rgb);
        let same = frame.clone().into_order(ChannelOrder::Rgb);
        assert_eq!(frame, same);
    }

    #[test]
    fn resized_hits_requested_dimensions() {
        let frame = Frame::uniform(20, 10, [50, 60, 70], ChannelOrder::Rgb);
        let resized = frame.resized(7, 5);
        assert_eq!(resized.dimensions(), (7, 5));
        assert_eq!(resized.rgb_at(3, 2), [50, 60, 70]);
    }

    #[test]
    fn luma_ignores_channel_order() {
        let rgb = Frame::uniform(1, 1, [200, 100, 50], ChannelOrder::Rgb);
        let bgr = Frame::uniform(1, 1, [200, 100, 50], ChannelOrder::Bgr);
        assert!((rgb.luma(0, 0) - bgr.luma(0, 0)).abs() < f32::EPSILON);
    }
}
