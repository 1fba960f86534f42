//! Per-frame tracking results.
//!
//! These describe what happened to each marker while processing one frame:
//! - whether the detector found it
//! - which renderable it drives and whether that renderable was just created
//! - the world transform written to the renderable

use nalgebra::Matrix4;

use crate::render::RenderableId;

/// What happened to one marker in one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerOutcome {
    /// Not visible in this frame. Nothing was touched.
    Missed,
    /// Found and its renderable updated.
    Tracked {
        renderable: RenderableId,
        /// True on the frame the renderable was instantiated.
        created: bool,
        /// Final transform, local rotation offset included.
        transform: Matrix4<f64>,
    },
    /// The detector returned an error for this marker.
    DetectorFault(String),
    /// Found, but the renderer could not instantiate an object. Retried on
    /// the next frame the marker is found.
    RenderableUnavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerReport {
    pub id: String,
    pub outcome: MarkerOutcome,
}

/// Summary of one `process_frame` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub timestamp_ns: u64,
    /// One report per registered marker, in registry order.
    pub markers: Vec<MarkerReport>,
    pub elapsed_ms: f64,
}

impl FrameSummary {
    pub fn outcome(&self, id: &str) -> Option<&MarkerOutcome> {
        self.markers.iter().find(|m| m.id == id).map(|m| &m.outcome)
    }

    /// Ids of markers whose renderable was updated this frame.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.markers
            .iter()
            .filter(|m| matches!(m.outcome, MarkerOutcome::Tracked { .. }))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn num_tracked(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| matches!(m.outcome, MarkerOutcome::Tracked { .. }))
            .count()
    }
}
