//! Detection backend that replays recorded marker poses.
//!
//! Poses come from a CSV log, one row per (frame, marker) sighting:
//!
//! ```text
//! # timestamp_ns, marker, m00, m01, m02, m03, m10, ..., m33
//! 1403636579763555584, logo, 1, 0, 0, 0.1, 0, 1, 0, 0, 0, 0, 1, 0.8, 0, 0, 0, 1
//! ```
//!
//! A marker with no row for a frame's timestamp is reported as not found.
//! Training still checks that the reference image carries enough texture to
//! be trackable at all, so registration behaves like a real matcher.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use image::GrayImage;
use nalgebra::Matrix4;
use tracing::debug;

use crate::camera::CameraIntrinsics;
use crate::error::RegistrationError;
use crate::markers::ReferenceImage;
use crate::tracking::frame::Frame;

use super::{PatternDetector, PatternTrainer, PoseEstimate};

/// Default minimum number of textured pixels for a usable pattern.
pub const DEFAULT_MIN_FEATURES: usize = 16;

/// Default intensity step that counts as an edge.
pub const DEFAULT_GRADIENT_THRESHOLD: u8 = 32;

/// Recorded poses keyed by frame timestamp, then marker name.
#[derive(Debug, Default, Clone)]
pub struct DetectionLog {
    poses: HashMap<u64, HashMap<String, Matrix4<f64>>>,
}

impl DetectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let rdr = ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_csv(rdr)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let rdr = ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(rdr)
    }

    fn from_csv<R: Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        let mut log = Self::new();
        for (line, rec) in rdr.records().enumerate() {
            let rec = rec?;
            if rec.len() != 18 {
                bail!(
                    "row {}: expected timestamp, marker and 16 matrix values, got {} fields",
                    line + 1,
                    rec.len()
                );
            }
            let ts: u64 = rec[0]
                .parse()
                .with_context(|| format!("row {}: bad timestamp", line + 1))?;
            let marker = rec[1].to_string();
            let mut data = [0.0f64; 16];
            for (i, v) in data.iter_mut().enumerate() {
                *v = rec[i + 2]
                    .parse()
                    .with_context(|| format!("row {}: bad matrix value", line + 1))?;
            }
            log.insert(ts, marker, Matrix4::from_row_slice(&data));
        }
        debug!(frames = log.poses.len(), "loaded detection log");
        Ok(log)
    }

    pub fn insert(&mut self, timestamp_ns: u64, marker: impl Into<String>, pose: Matrix4<f64>) {
        self.poses
            .entry(timestamp_ns)
            .or_default()
            .insert(marker.into(), pose);
    }

    pub fn pose(&self, timestamp_ns: u64, marker: &str) -> Option<Matrix4<f64>> {
        self.poses
            .get(&timestamp_ns)
            .and_then(|by_marker| by_marker.get(marker))
            .copied()
    }

    /// Number of recorded sightings.
    pub fn len(&self) -> usize {
        self.poses.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Count pixels whose right or lower neighbour differs by more than `threshold`.
pub fn count_textured_pixels(gray: &GrayImage, threshold: u8) -> usize {
    let (w, h) = gray.dimensions();
    let mut count = 0;
    for y in 0..h.saturating_sub(1) {
        for x in 0..w.saturating_sub(1) {
            let p = gray.get_pixel(x, y)[0];
            let dx = p.abs_diff(gray.get_pixel(x + 1, y)[0]);
            let dy = p.abs_diff(gray.get_pixel(x, y + 1)[0]);
            if dx.max(dy) > threshold {
                count += 1;
            }
        }
    }
    count
}

/// Trains [`ReplayDetector`]s against a shared log.
pub struct ReplayTrainer {
    log: Arc<DetectionLog>,
    min_features: usize,
    gradient_threshold: u8,
}

impl ReplayTrainer {
    pub fn new(log: DetectionLog) -> Self {
        Self {
            log: Arc::new(log),
            min_features: DEFAULT_MIN_FEATURES,
            gradient_threshold: DEFAULT_GRADIENT_THRESHOLD,
        }
    }

    /// Override the number of textured pixels a reference needs to train.
    pub fn with_min_features(mut self, min_features: usize) -> Self {
        self.min_features = min_features;
        self
    }
}

impl PatternTrainer for ReplayTrainer {
    fn train(
        &mut self,
        reference: &ReferenceImage,
    ) -> std::result::Result<Box<dyn PatternDetector>, RegistrationError> {
        let found = count_textured_pixels(&reference.gray(), self.gradient_threshold);
        if found < self.min_features {
            return Err(RegistrationError::InsufficientFeatures {
                id: reference.name.clone(),
                found,
                required: self.min_features,
            });
        }
        debug!(marker = %reference.name, features = found, "trained replay detector");
        Ok(Box::new(ReplayDetector {
            marker: reference.name.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

/// One marker's view of the detection log.
pub struct ReplayDetector {
    marker: String,
    log: Arc<DetectionLog>,
}

impl PatternDetector for ReplayDetector {
    fn find(&mut self, frame: &Frame, _camera: &CameraIntrinsics) -> Result<Option<PoseEstimate>> {
        Ok(self
            .log
            .pose(frame.timestamp_ns, &self.marker)
            .map(PoseEstimate::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::compute_intrinsics;
    use image::Luma;

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 { Luma([0]) } else { Luma([255]) }
        })
    }

    const LOG: &str = "\
# timestamp, marker, pose
100, logo, 1,0,0,0.5, 0,1,0,0, 0,0,1,2, 0,0,0,1
200, poster, 1,0,0,0, 0,1,0,0, 0,0,1,1, 0,0,0,1
";

    #[test]
    fn test_parse_log() {
        let log = DetectionLog::from_reader(LOG.as_bytes()).unwrap();
        assert_eq!(log.len(), 2);
        let pose = log.pose(100, "logo").unwrap();
        assert_eq!(pose[(0, 3)], 0.5);
        assert_eq!(pose[(2, 3)], 2.0);
        assert!(log.pose(100, "poster").is_none());
        assert!(log.pose(300, "logo").is_none());
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        let bad = "100, logo, 1, 0, 0\n";
        assert!(DetectionLog::from_reader(bad.as_bytes()).is_err());
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let flat = GrayImage::from_pixel(32, 32, Luma([128]));
        assert_eq!(count_textured_pixels(&flat, DEFAULT_GRADIENT_THRESHOLD), 0);
        assert!(count_textured_pixels(&checkerboard(32), DEFAULT_GRADIENT_THRESHOLD) > 16);
    }

    #[test]
    fn test_train_rejects_untextured_reference() {
        let mut trainer = ReplayTrainer::new(DetectionLog::new());
        let flat = ReferenceImage::from_gray("blank", &GrayImage::from_pixel(32, 32, Luma([9])), 1.0);

        match trainer.train(&flat) {
            Err(RegistrationError::InsufficientFeatures { id, found, required }) => {
                assert_eq!(id, "blank");
                assert_eq!(found, 0);
                assert_eq!(required, DEFAULT_MIN_FEATURES);
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("flat reference should not train"),
        }
    }

    #[test]
    fn test_min_features_threshold_is_configurable() {
        // One bright pixel gives three textured pixels: itself and its
        // left and upper neighbours.
        let mut dot = GrayImage::new(32, 32);
        dot.put_pixel(10, 10, Luma([255]));
        let dot = ReferenceImage::from_gray("dot", &dot, 1.0);

        assert!(ReplayTrainer::new(DetectionLog::new()).train(&dot).is_err());
        assert!(ReplayTrainer::new(DetectionLog::new())
            .with_min_features(3)
            .train(&dot)
            .is_ok());
        assert!(matches!(
            ReplayTrainer::new(DetectionLog::new()).with_min_features(4).train(&dot),
            Err(RegistrationError::InsufficientFeatures { found: 3, required: 4, .. })
        ));
    }

    #[test]
    fn test_replay_detector_finds_recorded_pose() {
        let log = DetectionLog::from_reader(LOG.as_bytes()).unwrap();
        let mut trainer = ReplayTrainer::new(log);
        let logo = ReferenceImage::from_gray("logo", &checkerboard(32), 1.0);
        let mut detector = trainer.train(&logo).unwrap();
        let camera = compute_intrinsics(64, 48, 64, 48).unwrap().intrinsics;

        let hit = Frame::new(100, GrayImage::new(64, 48));
        let miss = Frame::new(200, GrayImage::new(64, 48));

        let pose = detector.find(&hit, &camera).unwrap().unwrap();
        assert_eq!(pose.marker_to_camera[(0, 3)], 0.5);
        assert!(detector.find(&miss, &camera).unwrap().is_none());
    }
}
