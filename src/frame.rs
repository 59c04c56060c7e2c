//! Decoded frames.
//!
//! A `Frame` is one decoded RGB image plus its position in the stream. The
//! engine never mutates a caller's frame: detectors see it read-only and the
//! annotator draws on a copy.

use image::RgbImage;

pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Black frame of the given size (synthetic sources, tests).
    pub fn blank(index: u64, width: u32, height: u32) -> Self {
        Self::new(index, RgbImage::new(width, height))
    }

    /// Zero-based position in the stream.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Packed RGB8 pixels, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_metadata() {
        let frame = Frame::blank(7, 64, 48);
        assert_eq!(frame.index(), 7);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.pixels().len(), 64 * 48 * 3);
        assert!(frame.pixels().iter().all(|&p| p == 0));
    }
}
