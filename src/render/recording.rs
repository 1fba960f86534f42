//! In-memory render host.
//!
//! Keeps the latest state of every renderable instead of drawing it. Used by
//! the command-line runner and as a test double.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use image::RgbaImage;
use nalgebra::Matrix4;

use super::{RenderHost, RenderableId};

/// What the host knows about one renderable.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableRecord {
    pub prefab: String,
    pub name: String,
    /// Size of the bound texture, if any.
    pub texture_size: Option<(u32, u32)>,
    pub texture_binds: usize,
    pub transform: Option<Matrix4<f64>>,
    pub transform_updates: usize,
}

#[derive(Debug)]
pub struct RecordingHost {
    camera_to_world: Matrix4<f64>,
    objects: BTreeMap<RenderableId, RenderableRecord>,
    next_id: u64,
    instantiate_calls: usize,
    /// Number of upcoming `instantiate` calls that should fail.
    fail_next: usize,
}

impl RecordingHost {
    /// Empty host with the camera at the world origin.
    pub fn new() -> Self {
        Self {
            camera_to_world: Matrix4::identity(),
            objects: BTreeMap::new(),
            next_id: 1,
            instantiate_calls: 0,
            fail_next: 0,
        }
    }

    /// Move the AR camera.
    pub fn set_camera_to_world(&mut self, camera_to_world: Matrix4<f64>) {
        self.camera_to_world = camera_to_world;
    }

    /// Make the next `n` instantiations fail.
    pub fn fail_instantiations(&mut self, n: usize) {
        self.fail_next = n;
    }

    /// Number of `instantiate` calls, failed ones included.
    pub fn instantiate_calls(&self) -> usize {
        self.instantiate_calls
    }

    /// Record for a renderable handle.
    pub fn get(&self, id: RenderableId) -> Option<&RenderableRecord> {
        self.objects.get(&id)
    }

    /// First renderable with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<(RenderableId, &RenderableRecord)> {
        self.objects
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, r)| (*id, r))
    }

    /// Number of live renderables.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All renderables, ordered by handle.
    pub fn iter(&self) -> impl Iterator<Item = (&RenderableId, &RenderableRecord)> {
        self.objects.iter()
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderHost for RecordingHost {
    fn camera_to_world(&self) -> Matrix4<f64> {
        self.camera_to_world
    }

    fn instantiate(&mut self, prefab: &str, name: &str) -> Result<RenderableId> {
        self.instantiate_calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            bail!("prefab '{prefab}' could not be instantiated");
        }

        let id = RenderableId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            RenderableRecord {
                prefab: prefab.to_string(),
                name: name.to_string(),
                texture_size: None,
                texture_binds: 0,
                transform: None,
                transform_updates: 0,
            },
        );
        Ok(id)
    }

    fn set_material_texture(&mut self, id: RenderableId, texture: &RgbaImage) -> Result<()> {
        let Some(record) = self.objects.get_mut(&id) else {
            bail!("no renderable {:?}", id);
        };
        record.texture_size = Some(texture.dimensions());
        record.texture_binds += 1;
        Ok(())
    }

    fn set_transform(&mut self, id: RenderableId, transform: &Matrix4<f64>) {
        if let Some(record) = self.objects.get_mut(&id) {
            record.transform = Some(*transform);
            record.transform_updates += 1;
        }
    }
}
