//! Frame-level data handed to the tracker once per display refresh.

use image::GrayImage;

/// A single grayscale camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp_ns: u64,
    pub image: GrayImage,
}

impl Frame {
    pub fn new(timestamp_ns: u64, image: GrayImage) -> Self {
        Self {
            timestamp_ns,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
