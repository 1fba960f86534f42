//! File-based frame source.
//!
//! A frame directory holds image files plus a `frames.csv` index:
//!
//! ```text
//! # timestamp_ns, filename
//! 1403636579763555584, 000000.png
//! 1403636579813555456, 000001.png
//! ```
//!
//! Frames are decoded on demand and converted to 8-bit grayscale.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, Trim};

use crate::tracking::Frame;

/// Name of the index file inside a frame directory.
pub const FRAME_INDEX: &str = "frames.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub timestamp_ns: u64,
    pub filename: String,
}

#[derive(Debug)]
pub struct FrameSequence {
    root: PathBuf,
    pub entries: Vec<ImageEntry>,
}

impl FrameSequence {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let index = root.join(FRAME_INDEX);
        let file = File::open(&index).with_context(|| format!("Failed to open {}", index.display()))?;
        let entries = read_frame_index(file, FRAME_INDEX)?;
        Ok(Self { root, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frame_timestamp(&self, idx: usize) -> Option<u64> {
        self.entries.get(idx).map(|e| e.timestamp_ns)
    }

    /// Decode frame `idx` as grayscale.
    pub fn frame(&self, idx: usize) -> Result<Frame> {
        let entry = self
            .entries
            .get(idx)
            .with_context(|| format!("No frame at index {}", idx))?;
        let path = self.root.join(&entry.filename);
        let image = image::open(&path)
            .with_context(|| format!("Failed to read frame {:?}", path))?
            .to_luma8();
        Ok(Frame::new(entry.timestamp_ns, image))
    }

    /// Frame dimensions, read from the first frame.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let entry = self.entries.first().context("Frame list is empty")?;
        let path = self.root.join(&entry.filename);
        image::image_dimensions(&path).with_context(|| format!("Failed to read frame {:?}", path))
    }
}

/// Parse a frame index. Every row must name a timestamp and a file.
fn read_frame_index<R: std::io::Read>(reader: R, source: &str) -> Result<Vec<ImageEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    rdr.records()
        .enumerate()
        .map(|(row, rec)| {
            let rec = rec.with_context(|| format!("{}: row {}: malformed", source, row + 1))?;
            let (Some(ts), Some(filename)) = (rec.get(0), rec.get(1)) else {
                bail!(
                    "{}: row {}: expected `timestamp_ns, filename`, got {} field(s)",
                    source,
                    row + 1,
                    rec.len()
                );
            };
            if filename.is_empty() {
                bail!("{}: row {}: empty filename", source, row + 1);
            }
            let timestamp_ns = ts
                .parse()
                .with_context(|| format!("{}: row {}: bad timestamp {:?}", source, row + 1, ts))?;
            Ok(ImageEntry {
                timestamp_ns,
                filename: filename.to_string(),
            })
        })
        .collect()
}
