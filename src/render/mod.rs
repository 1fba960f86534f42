//! Rendering collaborator.
//!
//! The host owns the renderable objects and the camera. The tracker only
//! holds [`RenderableId`]s and pushes transforms into them.

pub mod recording;

use anyhow::Result;
use image::RgbaImage;
use nalgebra::Matrix4;

pub use recording::{RecordingHost, RenderableRecord};

/// Opaque handle to a renderable owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderableId(pub u64);

pub trait RenderHost: Send {
    /// Current world transform of the AR camera.
    fn camera_to_world(&self) -> Matrix4<f64>;

    /// Create an instance of `prefab` called `name`.
    fn instantiate(&mut self, prefab: &str, name: &str) -> Result<RenderableId>;

    /// Bind `texture` as the main texture of the renderable's material.
    fn set_material_texture(&mut self, id: RenderableId, texture: &RgbaImage) -> Result<()>;

    /// Overwrite the renderable's local-to-world transform.
    fn set_transform(&mut self, id: RenderableId, transform: &Matrix4<f64>);
}
