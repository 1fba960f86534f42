use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use marker_ar::detection::{DetectionLog, ReplayTrainer};
use marker_ar::geometry::decompose;
use marker_ar::io::{FrameSequence, TrackerConfig};
use marker_ar::render::RecordingHost;
use marker_ar::system::TrackerSystem;
use marker_ar::tracking::TrackingSession;

/// Replay recorded marker detections over a frame sequence.
#[derive(Parser, Debug)]
#[command(name = "marker-ar", version)]
struct Args {
    /// Marker configuration (YAML).
    #[arg(long, default_value = "markers.yaml")]
    config: PathBuf,

    /// Directory containing frames.csv and the frame images.
    #[arg(long)]
    frames: PathBuf,

    /// Recorded marker poses (CSV).
    #[arg(long)]
    detections: PathBuf,

    /// Override the configured viewport, e.g. 1080x1920.
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<(u32, u32)>,
}

fn parse_viewport(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {}", e))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {}", e))?;
    Ok((w, h))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = TrackerConfig::from_path(&args.config)?;
    let references = config.load_references()?;
    let frames = FrameSequence::open(&args.frames)?;
    if frames.is_empty() {
        bail!("No frames listed in {:?}", args.frames);
    }
    let log = DetectionLog::from_path(&args.detections)?;
    info!(
        markers = references.len(),
        frames = frames.len(),
        detections = log.len(),
        "inputs loaded"
    );

    let (frame_w, frame_h) = frames.dimensions()?;
    let (view_w, view_h) = args
        .viewport
        .unwrap_or((config.viewport.width, config.viewport.height));

    let mut session = TrackingSession::new(
        ReplayTrainer::new(log),
        RecordingHost::new(),
        config.session_config(),
    );
    let fov = session
        .initialize(frame_w, frame_h, view_w, view_h, &references)
        .context("Failed to initialize tracking session")?;
    info!(fov, "renderer field of view");

    let system = TrackerSystem::spawn(session);
    for i in 0..frames.len() {
        let frame = frames.frame(i)?;
        system.submit_blocking(frame)?;
    }
    let shared = std::sync::Arc::clone(system.shared_state());
    let Some(session) = system.finish() else {
        bail!("Frame loop worker panicked");
    };

    info!(
        processed = shared.frames_processed(),
        dropped = shared.frames_dropped(),
        "Done"
    );
    if let Some(err) = shared.status().last_error {
        warn!("last frame rejected: {}", err);
    }

    let host = session.into_renderer();
    for (id, record) in host.iter() {
        let Some(transform) = record.transform else {
            info!(id = id.0, name = %record.name, "never placed");
            continue;
        };
        let trs = decompose(&transform);
        let (roll, pitch, yaw) = trs.rotation.euler_angles();
        info!(
            id = id.0,
            name = %record.name,
            updates = record.transform_updates,
            "position [{:.3}, {:.3}, {:.3}] rotation [{:.1}, {:.1}, {:.1}] deg scale [{:.3}, {:.3}, {:.3}]",
            trs.translation.x,
            trs.translation.y,
            trs.translation.z,
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees(),
            trs.scale.x,
            trs.scale.y,
            trs.scale.z
        );
    }

    Ok(())
}
