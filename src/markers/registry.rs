//! Registry of trained markers, one entry per reference image.
//!
//! Entries are stored in insertion order with an id index on the side.
//! Everything except the renderable handle is fixed at registration; the
//! handle goes from `None` to `Some` at most once.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use nalgebra::Matrix4;
use tracing::debug;

use crate::detection::{PatternDetector, PatternTrainer};
use crate::error::{BindError, RegistrationError};
use crate::geometry::scale_matrix;
use crate::render::RenderableId;

use super::ReferenceImage;

/// Everything tracked per marker.
pub struct MarkerEntry {
    id: String,
    detector: Box<dyn PatternDetector>,
    scale_factor: f64,
    scale: Matrix4<f64>,
    texture: Arc<RgbaImage>,
    renderable: Option<RenderableId>,
}

impl MarkerEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Real-world size multiplier.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Uniform scale transform built from the scale factor.
    pub fn scale(&self) -> &Matrix4<f64> {
        &self.scale
    }

    /// Source texture bound to the renderable's material.
    pub fn texture(&self) -> &Arc<RgbaImage> {
        &self.texture
    }

    /// Bound renderable; `None` until the marker is first detected.
    pub fn renderable(&self) -> Option<RenderableId> {
        self.renderable
    }

    pub(crate) fn detector_mut(&mut self) -> &mut dyn PatternDetector {
        self.detector.as_mut()
    }

    pub(crate) fn bind(&mut self, handle: RenderableId) -> Result<(), BindError> {
        if self.renderable.is_some() {
            return Err(BindError::AlreadyBound(self.id.clone()));
        }
        self.renderable = Some(handle);
        Ok(())
    }
}

impl std::fmt::Debug for MarkerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerEntry")
            .field("id", &self.id)
            .field("scale_factor", &self.scale_factor)
            .field("renderable", &self.renderable)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered collection of [`MarkerEntry`] keyed by id.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: Vec<MarkerEntry>,
    index: HashMap<String, usize>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Train a detector for `reference` and add it to the registry.
    ///
    /// A failure leaves the registry untouched.
    pub fn register(
        &mut self,
        trainer: &mut dyn PatternTrainer,
        reference: &ReferenceImage,
    ) -> Result<&MarkerEntry, RegistrationError> {
        if self.index.contains_key(&reference.name) {
            return Err(RegistrationError::Duplicate(reference.name.clone()));
        }

        let detector = trainer.train(reference)?;
        let entry = MarkerEntry {
            id: reference.name.clone(),
            detector,
            scale_factor: reference.scale_factor,
            scale: scale_matrix(reference.scale_factor),
            texture: Arc::clone(&reference.texture),
            renderable: None,
        };

        let idx = self.entries.len();
        self.index.insert(entry.id.clone(), idx);
        self.entries.push(entry);
        debug!(marker = %reference.name, scale = reference.scale_factor, "registered marker");
        Ok(&self.entries[idx])
    }

    /// Look up a marker by id.
    pub fn get(&self, id: &str) -> Option<&MarkerEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// All entries, in registration order.
    pub fn all(&self) -> &[MarkerEntry] {
        &self.entries
    }

    /// Marker ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// Number of registered markers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach a renderable to a marker. Set-once.
    pub fn bind_renderable(&mut self, id: &str, handle: RenderableId) -> Result<(), BindError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BindError::UnknownMarker(id.to_string()))?;
        self.entries[idx].bind(handle)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [MarkerEntry] {
        &mut self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraIntrinsics;
    use crate::detection::PoseEstimate;
    use crate::tracking::frame::Frame;
    use image::GrayImage;

    struct NeverFound;

    impl PatternDetector for NeverFound {
        fn find(
            &mut self,
            _frame: &Frame,
            _camera: &CameraIntrinsics,
        ) -> anyhow::Result<Option<PoseEstimate>> {
            Ok(None)
        }
    }

    /// Rejects any reference whose name starts with "bad".
    struct NameTrainer;

    impl PatternTrainer for NameTrainer {
        fn train(
            &mut self,
            reference: &ReferenceImage,
        ) -> Result<Box<dyn PatternDetector>, RegistrationError> {
            if reference.name.starts_with("bad") {
                return Err(RegistrationError::InsufficientFeatures {
                    id: reference.name.clone(),
                    found: 3,
                    required: 16,
                });
            }
            Ok(Box::new(NeverFound))
        }
    }

    fn reference(name: &str, scale: f64) -> ReferenceImage {
        ReferenceImage::from_gray(name, &GrayImage::new(4, 4), scale)
    }

    #[test]
    fn test_register_builds_scale_transform() {
        let mut registry = MarkerRegistry::new();
        let entry = registry.register(&mut NameTrainer, &reference("logo", 2.0)).unwrap();

        assert_eq!(entry.id(), "logo");
        assert_eq!(entry.scale_factor(), 2.0);
        assert_eq!(
            *entry.scale(),
            Matrix4::from_diagonal(&nalgebra::Vector4::new(2.0, 2.0, 2.0, 1.0))
        );
        assert!(entry.renderable().is_none());
    }

    #[test]
    fn test_failed_registration_is_skipped() {
        let mut registry = MarkerRegistry::new();
        let refs = [reference("a", 1.0), reference("bad_b", 1.0), reference("c", 1.0)];
        let failures = refs
            .iter()
            .filter(|r| registry.register(&mut NameTrainer, r).is_err())
            .count();

        assert_eq!(failures, 1);
        assert_eq!(registry.len(), refs.len() - failures);
        assert!(registry.get("bad_b").is_none());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = MarkerRegistry::new();
        registry.register(&mut NameTrainer, &reference("logo", 1.0)).unwrap();
        let err = registry.register(&mut NameTrainer, &reference("logo", 3.0)).unwrap_err();

        assert!(matches!(err, RegistrationError::Duplicate(id) if id == "logo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("logo").unwrap().scale_factor(), 1.0);
    }

    #[test]
    fn test_bind_renderable_is_set_once() {
        let mut registry = MarkerRegistry::new();
        registry.register(&mut NameTrainer, &reference("logo", 1.0)).unwrap();

        registry.bind_renderable("logo", RenderableId(7)).unwrap();
        assert_eq!(
            registry.bind_renderable("logo", RenderableId(8)),
            Err(BindError::AlreadyBound("logo".to_string()))
        );
        assert_eq!(registry.get("logo").unwrap().renderable(), Some(RenderableId(7)));
        assert_eq!(
            registry.bind_renderable("missing", RenderableId(1)),
            Err(BindError::UnknownMarker("missing".to_string()))
        );
    }
}
