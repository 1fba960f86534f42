//! Frame loop: runs a tracking session on its own thread.
//!
//! Frames arrive through a single-slot channel. Submitting while a frame is
//! still pending drops the new frame: each frame is processed on its own and
//! a stale pose is of no use, so the queue never grows.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use tracing::{info, trace, warn};

use crate::detection::PatternTrainer;
use crate::render::RenderHost;
use crate::tracking::{Frame, TrackingSession};

use super::shared_state::SharedState;

/// Only the newest unprocessed frame is kept.
const FRAME_CHANNEL_CAPACITY: usize = 1;

/// Timeout for receiving frames, so the worker notices shutdown requests.
const RECV_TIMEOUT: Duration = Duration::from_millis(50);

pub struct TrackerSystem<T, R> {
    shared: Arc<SharedState>,
    frame_sender: Option<Sender<Frame>>,
    worker: Option<JoinHandle<TrackingSession<T, R>>>,
}

impl<T, R> TrackerSystem<T, R>
where
    T: PatternTrainer + Send + 'static,
    R: RenderHost + 'static,
{
    /// Move an initialized session onto a worker thread.
    pub fn spawn(session: TrackingSession<T, R>) -> Self {
        let shared = SharedState::new();
        let (frame_sender, frame_receiver) = bounded::<Frame>(FRAME_CHANNEL_CAPACITY);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || run_worker(session, frame_receiver, worker_shared));

        Self {
            shared,
            frame_sender: Some(frame_sender),
            worker: Some(worker),
        }
    }

    /// Hand a frame to the worker without blocking.
    ///
    /// Returns `false` if the frame was dropped because another one is
    /// still waiting, or the worker is gone.
    pub fn submit(&self, frame: Frame) -> bool {
        let Some(sender) = self.frame_sender.as_ref() else {
            return false;
        };
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                trace!(ts = frame.timestamp_ns, "frame dropped, worker busy");
                self.shared.record_drop();
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Hand a frame to the worker, waiting for the slot to free up.
    ///
    /// For offline sources where every frame should be processed.
    pub fn submit_blocking(&self, frame: Frame) -> Result<()> {
        let sender = self
            .frame_sender
            .as_ref()
            .ok_or_else(|| anyhow!("frame loop is shut down"))?;
        sender
            .send(frame)
            .map_err(|_| anyhow!("frame loop worker has exited"))
    }

    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Let the worker finish queued frames, join it and return the session.
    pub fn finish(mut self) -> Option<TrackingSession<T, R>> {
        self.stop(false)
    }

    /// Stop the worker after its current frame, discarding any queued frame.
    pub fn shutdown(mut self) -> Option<TrackingSession<T, R>> {
        self.stop(true)
    }

    fn stop(&mut self, discard_pending: bool) -> Option<TrackingSession<T, R>> {
        if discard_pending {
            self.shared.request_shutdown();
        }
        // Closing the channel ends the worker loop once it is drained.
        self.frame_sender.take();

        let handle = self.worker.take()?;
        match handle.join() {
            Ok(session) => Some(session),
            Err(_) => {
                warn!("frame loop worker panicked");
                None
            }
        }
    }
}

impl<T, R> Drop for TrackerSystem<T, R> {
    fn drop(&mut self) {
        self.shared.request_shutdown();
        self.frame_sender.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker<T, R>(
    mut session: TrackingSession<T, R>,
    frames: Receiver<Frame>,
    shared: Arc<SharedState>,
) -> TrackingSession<T, R>
where
    T: PatternTrainer,
    R: RenderHost,
{
    info!("frame loop started");
    loop {
        if shared.is_shutdown_requested() {
            break;
        }
        let frame = match frames.recv_timeout(RECV_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // Shutdown may have been requested while waiting on the channel.
        if shared.is_shutdown_requested() {
            break;
        }

        match session.process_frame(&frame) {
            Ok(summary) => shared.record_summary(&summary),
            Err(e) => {
                warn!(ts = frame.timestamp_ns, "frame rejected: {}", e);
                shared.record_error(frame.timestamp_ns, e.to_string());
            }
        }
    }
    info!(
        processed = shared.frames_processed(),
        dropped = shared.frames_dropped(),
        "frame loop stopped"
    );
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraIntrinsics;
    use crate::detection::{DetectionLog, PatternDetector, PoseEstimate, ReplayTrainer};
    use crate::error::RegistrationError;
    use crate::markers::ReferenceImage;
    use crate::render::RecordingHost;
    use crate::tracking::SessionConfig;
    use image::{GrayImage, Luma};
    use nalgebra::Matrix4;

    fn textured() -> GrayImage {
        GrayImage::from_fn(32, 32, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 { Luma([0]) } else { Luma([255]) }
        })
    }

    fn session(log: DetectionLog) -> TrackingSession<ReplayTrainer, RecordingHost> {
        let mut session = TrackingSession::new(
            ReplayTrainer::new(log),
            RecordingHost::new(),
            SessionConfig::default(),
        );
        session
            .initialize(64, 48, 640, 480, &[ReferenceImage::from_gray("logo", &textured(), 1.0)])
            .unwrap();
        session
    }

    #[test]
    fn test_blocking_submission_processes_every_frame() {
        let mut log = DetectionLog::new();
        for ts in [2, 4, 6] {
            log.insert(ts, "logo", Matrix4::identity());
        }
        let system = TrackerSystem::spawn(session(log));

        for ts in 1..=6 {
            system.submit_blocking(Frame::new(ts, GrayImage::new(64, 48))).unwrap();
        }
        let shared = Arc::clone(system.shared_state());
        let session = system.finish().unwrap();

        assert_eq!(shared.frames_processed(), 6);
        assert_eq!(shared.frames_dropped(), 0);
        assert_eq!(session.frames_processed(), 6);
        let host = session.into_renderer();
        assert_eq!(host.instantiate_calls(), 1);
        let (_, record) = host.find_by_name("ar_object_logo").unwrap();
        assert_eq!(record.transform_updates, 3);
    }

    #[test]
    fn test_rejected_frame_recorded_in_status() {
        let system = TrackerSystem::spawn(session(DetectionLog::new()));
        system.submit_blocking(Frame::new(9, GrayImage::new(32, 32))).unwrap();
        let shared = Arc::clone(system.shared_state());
        system.finish().unwrap();

        let status = shared.status();
        assert_eq!(status.last_timestamp_ns, Some(9));
        assert!(status.last_error.is_some());
        assert_eq!(shared.frames_processed(), 0);
    }

    /// Detector that reports each call and then waits until released.
    struct GatedDetector {
        entered: Sender<u64>,
        release: Receiver<()>,
        _alive: Arc<()>,
    }

    impl PatternDetector for GatedDetector {
        fn find(
            &mut self,
            frame: &Frame,
            _camera: &CameraIntrinsics,
        ) -> anyhow::Result<Option<PoseEstimate>> {
            let _ = self.entered.send(frame.timestamp_ns);
            // Returns immediately once the release sender is dropped.
            let _ = self.release.recv();
            Ok(None)
        }
    }

    struct GatedTrainer {
        entered: Sender<u64>,
        release: Receiver<()>,
        alive: Arc<()>,
    }

    impl PatternTrainer for GatedTrainer {
        fn train(
            &mut self,
            _reference: &ReferenceImage,
        ) -> Result<Box<dyn PatternDetector>, RegistrationError> {
            Ok(Box::new(GatedDetector {
                entered: self.entered.clone(),
                release: self.release.clone(),
                _alive: Arc::clone(&self.alive),
            }))
        }
    }

    struct Gate {
        system: TrackerSystem<GatedTrainer, RecordingHost>,
        entered: Receiver<u64>,
        release: Sender<()>,
        alive: Arc<()>,
    }

    fn gated_system() -> Gate {
        let (entered_tx, entered) = crossbeam_channel::unbounded();
        let (release, release_rx) = crossbeam_channel::unbounded();
        let alive = Arc::new(());
        let trainer = GatedTrainer {
            entered: entered_tx,
            release: release_rx,
            alive: Arc::clone(&alive),
        };
        let mut session = TrackingSession::new(trainer, RecordingHost::new(), SessionConfig::default());
        session
            .initialize(64, 48, 640, 480, &[ReferenceImage::from_gray("logo", &textured(), 1.0)])
            .unwrap();
        Gate {
            system: TrackerSystem::spawn(session),
            entered,
            release,
            alive,
        }
    }

    fn blank(ts: u64) -> Frame {
        Frame::new(ts, GrayImage::new(64, 48))
    }

    #[test]
    fn test_busy_worker_keeps_one_pending_frame() {
        let Gate { system, entered, release, .. } = gated_system();

        assert!(system.submit(blank(1)));
        assert_eq!(entered.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

        // Worker is held inside the detector: one slot, then drops.
        assert!(system.submit(blank(2)));
        for ts in 3..=10 {
            assert!(!system.submit(blank(ts)));
        }
        let shared = Arc::clone(system.shared_state());
        assert_eq!(shared.frames_dropped(), 8);

        drop(release);
        let session = system.finish().unwrap();

        assert_eq!(shared.frames_processed(), 2);
        assert_eq!(session.frames_processed(), 2);
        let seen: Vec<u64> = entered.try_iter().collect();
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn test_shutdown_discards_pending_frame() {
        let Gate { system, entered, release, .. } = gated_system();

        assert!(system.submit(blank(1)));
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(system.submit(blank(2)));

        system.shared_state().request_shutdown();
        drop(release);
        let shared = Arc::clone(system.shared_state());
        let session = system.shutdown().unwrap();

        assert_eq!(session.frames_processed(), 1);
        assert_eq!(shared.frames_processed(), 1);
        assert!(entered.try_recv().is_err());
    }

    #[test]
    fn test_drop_joins_worker() {
        let Gate { system, entered, release, alive } = gated_system();

        assert!(system.submit(blank(1)));
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        drop(release);
        drop(system);

        // The session, and with it the detector, is gone once drop returns.
        assert_eq!(Arc::strong_count(&alive), 1);
    }
}
