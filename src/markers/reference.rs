//! Reference images: the planar patterns the tracker looks for.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{GrayImage, RgbaImage};

/// A registered pattern together with its real-world size multiplier.
///
/// The RGBA texture is what gets bound to the renderable's material; the
/// trainer sees the grayscale version.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub name: String,
    pub texture: Arc<RgbaImage>,
    pub scale_factor: f64,
}

impl ReferenceImage {
    pub fn new(name: impl Into<String>, texture: RgbaImage, scale_factor: f64) -> Self {
        Self {
            name: name.into(),
            texture: Arc::new(texture),
            scale_factor,
        }
    }

    /// Build from a grayscale buffer (the texture becomes its RGBA expansion).
    pub fn from_gray(name: impl Into<String>, gray: &GrayImage, scale_factor: f64) -> Self {
        let texture = image::DynamicImage::ImageLuma8(gray.clone()).to_rgba8();
        Self::new(name, texture, scale_factor)
    }

    /// Load an image file; the name defaults to the file stem.
    pub fn load<P: AsRef<Path>>(path: P, name: Option<&str>, scale_factor: f64) -> Result<Self> {
        let path = path.as_ref();
        let texture = image::open(path)
            .with_context(|| format!("Failed to read reference image {:?}", path))?
            .to_rgba8();
        let name = match name {
            Some(n) => n.to_string(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .with_context(|| format!("No usable file name in {:?}", path))?
                .to_string(),
        };
        Ok(Self::new(name, texture, scale_factor))
    }

    /// 8-bit luma version for training.
    pub fn gray(&self) -> GrayImage {
        image::DynamicImage::ImageRgba8((*self.texture).clone()).to_luma8()
    }
}
