//! YAML configuration for a tracking deployment.
//!
//! ```yaml
//! prefab: ar_object
//! local_rotation_offset: [0.0, 90.0, 0.0]
//! viewport: { width: 1080, height: 1920 }
//! markers:
//!   - { name: logo, image: logo.png, scale_factor: 2.0 }
//!   - { image: poster.jpg }
//! ```
//!
//! Image paths are resolved relative to the config file. A marker without a
//! name is named after its image's file stem.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nalgebra::Vector3;
use serde::Deserialize;

use crate::markers::ReferenceImage;
use crate::tracking::{DEFAULT_PREFAB, SessionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkerConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub image: PathBuf,
    /// Real-world size multiplier.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_prefab")]
    pub prefab: String,
    /// Degrees, x/y/z.
    #[serde(default)]
    pub local_rotation_offset: [f64; 3],
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub markers: Vec<MarkerConfig>,

    /// Directory relative image paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_scale_factor() -> f64 {
    1.0
}

fn default_prefab() -> String {
    DEFAULT_PREFAB.to_string()
}

impl TrackerConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config: TrackerConfig = serde_yaml::from_reader(
            File::open(path).with_context(|| format!("Failed to open {:?}", path))?,
        )
        .with_context(|| format!("Failed to parse {:?}", path))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn session_config(&self) -> SessionConfig {
        let [x, y, z] = self.local_rotation_offset;
        SessionConfig {
            prefab: self.prefab.clone(),
            local_rotation_offset: Vector3::new(x, y, z),
        }
    }

    /// Load every configured reference image.
    pub fn load_references(&self) -> Result<Vec<ReferenceImage>> {
        self.markers
            .iter()
            .map(|m| {
                let path = if m.image.is_absolute() {
                    m.image.clone()
                } else {
                    self.base_dir.join(&m.image)
                };
                ReferenceImage::load(&path, m.name.as_deref(), m.scale_factor)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_parse_with_defaults() {
        let config = TrackerConfig::from_yaml_str(
            "viewport: { width: 1080, height: 1920 }\nmarkers:\n  - { image: logo.png }\n",
        )
        .unwrap();

        assert_eq!(config.prefab, DEFAULT_PREFAB);
        assert_eq!(config.local_rotation_offset, [0.0; 3]);
        assert_eq!(config.markers.len(), 1);
        assert_eq!(config.markers[0].scale_factor, 1.0);
        assert!(config.markers[0].name.is_none());
    }

    #[test]
    fn test_session_config_offset() {
        let config = TrackerConfig::from_yaml_str(
            "prefab: cube\nlocal_rotation_offset: [10.0, 20.0, 30.0]\nviewport: { width: 1, height: 1 }\n",
        )
        .unwrap();
        let session = config.session_config();
        assert_eq!(session.prefab, "cube");
        assert_eq!(session.local_rotation_offset, Vector3::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn test_missing_viewport_is_an_error() {
        assert!(TrackerConfig::from_yaml_str("markers: []\n").is_err());
    }

    #[test]
    fn test_load_references_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(8, 8, Luma([10]))
            .save(dir.path().join("logo.png"))
            .unwrap();
        let config_path = dir.path().join("markers.yaml");
        std::fs::write(
            &config_path,
            "viewport: { width: 1080, height: 1920 }\nmarkers:\n  - { image: logo.png, scale_factor: 2.0 }\n  - { name: second, image: logo.png }\n",
        )
        .unwrap();

        let config = TrackerConfig::from_path(&config_path).unwrap();
        let refs = config.load_references().unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "logo");
        assert_eq!(refs[0].scale_factor, 2.0);
        assert_eq!(refs[1].name, "second");
    }

    #[test]
    fn test_missing_image_fails_to_load() {
        let config = TrackerConfig::from_yaml_str(
            "viewport: { width: 1, height: 1 }\nmarkers:\n  - { image: /nonexistent/logo.png }\n",
        )
        .unwrap();
        assert!(config.load_references().is_err());
    }
}
