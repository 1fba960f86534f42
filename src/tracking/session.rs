//! Tracking session: per-frame driver for every registered marker.
//!
//! Lifecycle:
//! 1. `initialize` derives the camera intrinsics from the first frame's size
//!    and the viewport, trains one detector per reference image and returns
//!    the FOV the renderer should use.
//! 2. `process_frame` runs once per frame. For each marker, in registration
//!    order, the detector is asked for a pose; a found pose is bridged into
//!    world space and pushed into the marker's renderable, which is created
//!    the first time the marker is seen.
//!
//! Failures are scoped to the marker they happen on. A detector fault or a
//! renderer that cannot instantiate an object is logged and reported in the
//! frame summary, and the remaining markers are processed normally.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use anyhow::anyhow;
use nalgebra::{Matrix4, Vector3};
use tracing::{debug, info, trace, warn};

use crate::camera::{CalibrationReport, CameraIntrinsics, compute_intrinsics};
use crate::detection::PatternTrainer;
use crate::error::SessionError;
use crate::geometry::{CoordinateBridge, rotate_local};
use crate::markers::{MarkerEntry, MarkerRegistry, ReferenceImage};
use crate::render::{RenderHost, RenderableId};
use crate::tracking::frame::Frame;
use crate::tracking::result::{FrameSummary, MarkerOutcome, MarkerReport};
use crate::tracking::state::MarkerState;

/// Default renderable template id.
pub const DEFAULT_PREFAB: &str = "ar_object";

/// Deployment settings that apply to every tracked object.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Template the renderer instantiates for each marker.
    pub prefab: String,
    /// Euler angles in degrees, applied in local space after the world
    /// transform.
    pub local_rotation_offset: Vector3<f64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefab: DEFAULT_PREFAB.to_string(),
            local_rotation_offset: Vector3::zeros(),
        }
    }
}

/// Multi-marker tracking session.
pub struct TrackingSession<T, R> {
    trainer: T,
    renderer: R,
    config: SessionConfig,
    bridge: CoordinateBridge,
    registry: MarkerRegistry,
    calibration: Option<CalibrationReport>,
    frame_count: u64,
}

impl<T, R> TrackingSession<T, R>
where
    T: PatternTrainer,
    R: RenderHost,
{
    pub fn new(trainer: T, renderer: R, config: SessionConfig) -> Self {
        Self {
            trainer,
            renderer,
            config,
            bridge: CoordinateBridge::new(),
            registry: MarkerRegistry::new(),
            calibration: None,
            frame_count: 0,
        }
    }

    /// One-time setup. Returns the recommended renderer FOV in degrees.
    ///
    /// Reference images that cannot be trained are logged and left out; the
    /// session tracks whatever registered successfully.
    pub fn initialize(
        &mut self,
        frame_width: u32,
        frame_height: u32,
        viewport_width: u32,
        viewport_height: u32,
        references: &[ReferenceImage],
    ) -> Result<f64, SessionError> {
        if self.calibration.is_some() {
            return Err(SessionError::Configuration(
                "session is already initialized".to_string(),
            ));
        }
        validate_references(references)?;

        let report = compute_intrinsics(frame_width, frame_height, viewport_width, viewport_height)?;

        for reference in references {
            if let Err(e) = self.registry.register(&mut self.trainer, reference) {
                warn!(marker = %reference.name, "marker excluded from tracking: {}", e);
            }
        }

        info!(
            registered = self.registry.len(),
            configured = references.len(),
            frame_w = frame_width,
            frame_h = frame_height,
            fov = report.recommended_fov,
            "tracking session initialized"
        );

        let fov = report.recommended_fov;
        self.calibration = Some(report);
        Ok(fov)
    }

    /// Detect every marker in `frame` and update their renderables.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameSummary, SessionError> {
        let t_start = Instant::now();
        let intrinsics = self
            .calibration
            .as_ref()
            .map(|c| c.intrinsics)
            .ok_or(SessionError::NotInitialized)?;

        if frame.width() != intrinsics.width || frame.height() != intrinsics.height {
            return Err(SessionError::ResolutionChanged {
                width: intrinsics.width,
                height: intrinsics.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }

        self.frame_count += 1;
        let camera_to_world = self.renderer.camera_to_world();

        let mut markers = Vec::with_capacity(self.registry.len());
        for entry in self.registry.entries_mut() {
            let outcome = track_marker(
                entry,
                frame,
                &intrinsics,
                &camera_to_world,
                &self.bridge,
                &self.config,
                &mut self.renderer,
            );
            markers.push(MarkerReport {
                id: entry.id().to_string(),
                outcome,
            });
        }

        let summary = FrameSummary {
            timestamp_ns: frame.timestamp_ns,
            markers,
            elapsed_ms: t_start.elapsed().as_secs_f64() * 1000.0,
        };
        trace!(
            frame = self.frame_count,
            ts = frame.timestamp_ns,
            tracked = summary.num_tracked(),
            "frame processed"
        );
        Ok(summary)
    }

    pub fn marker_state(&self, id: &str) -> Option<MarkerState> {
        self.registry.get(id).map(MarkerState::of)
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn calibration(&self) -> Option<&CalibrationReport> {
        self.calibration.as_ref()
    }

    pub fn intrinsics(&self) -> Option<&CameraIntrinsics> {
        self.calibration.as_ref().map(|c| &c.intrinsics)
    }

    pub fn is_initialized(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_count
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Tear down the session, releasing every trained detector, and hand
    /// the renderer back.
    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

fn validate_references(references: &[ReferenceImage]) -> Result<(), SessionError> {
    if references.is_empty() {
        return Err(SessionError::Configuration(
            "reference image list is empty".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for r in references {
        if r.name.is_empty() {
            return Err(SessionError::Configuration(
                "reference image with empty name".to_string(),
            ));
        }
        if !seen.insert(r.name.as_str()) {
            return Err(SessionError::Configuration(format!(
                "duplicate reference image '{}'",
                r.name
            )));
        }
        if !(r.scale_factor.is_finite() && r.scale_factor > 0.0) {
            return Err(SessionError::Configuration(format!(
                "reference image '{}' has invalid scale factor {}",
                r.name, r.scale_factor
            )));
        }
        let (w, h) = r.texture.dimensions();
        if w == 0 || h == 0 {
            return Err(SessionError::Configuration(format!(
                "reference image '{}' is empty",
                r.name
            )));
        }
    }
    Ok(())
}

/// Run one marker through detect, bridge, create-or-update.
fn track_marker<R: RenderHost>(
    entry: &mut MarkerEntry,
    frame: &Frame,
    intrinsics: &CameraIntrinsics,
    camera_to_world: &Matrix4<f64>,
    bridge: &CoordinateBridge,
    config: &SessionConfig,
    renderer: &mut R,
) -> MarkerOutcome {
    // A panicking detector is contained like any other fault.
    let found = panic::catch_unwind(AssertUnwindSafe(|| {
        entry.detector_mut().find(frame, intrinsics)
    }))
    .unwrap_or_else(|payload| {
        Err(anyhow!("detector panicked: {}", panic_message(&*payload)))
    });

    let pose = match found {
        Ok(Some(pose)) => pose,
        Ok(None) => return MarkerOutcome::Missed,
        Err(e) => {
            warn!(marker = %entry.id(), "detector fault: {:#}", e);
            return MarkerOutcome::DetectorFault(format!("{:#}", e));
        }
    };

    let world = bridge.compose(camera_to_world, entry.scale(), &pose.marker_to_camera);

    let (renderable, created) = match entry.renderable() {
        Some(id) => (id, false),
        None => match create_renderable(entry, config, renderer) {
            Ok(id) => (id, true),
            Err(reason) => return MarkerOutcome::RenderableUnavailable(reason),
        },
    };

    let transform = rotate_local(&world, &config.local_rotation_offset);
    renderer.set_transform(renderable, &transform);

    MarkerOutcome::Tracked {
        renderable,
        created,
        transform,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Instantiate, texture and bind the renderable for a marker seen for the
/// first time.
fn create_renderable<R: RenderHost>(
    entry: &mut MarkerEntry,
    config: &SessionConfig,
    renderer: &mut R,
) -> Result<RenderableId, String> {
    let name = format!("{}_{}", config.prefab, entry.id());
    let id = match renderer.instantiate(&config.prefab, &name) {
        Ok(id) => id,
        Err(e) => {
            warn!(marker = %entry.id(), "could not instantiate renderable: {:#}", e);
            return Err(format!("{:#}", e));
        }
    };

    if let Err(e) = renderer.set_material_texture(id, entry.texture()) {
        warn!(marker = %entry.id(), "could not bind marker texture: {:#}", e);
    }
    if let Err(e) = entry.bind(id) {
        warn!("{}", e);
    }
    debug!(marker = %entry.id(), renderable = id.0, %name, "renderable created");
    Ok(id)
}
