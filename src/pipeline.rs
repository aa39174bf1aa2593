// THEORY:
// The `pipeline` module is the top-level API for the engine. It decouples the
// cadence of frame production (the capture loop) from the cadence of
// detection, guaranteeing the worker always processes the most recent frame
// available and never works through a stale backlog.
//
// Key architectural principles:
// 1.  **Single-Slot Mailbox**: At most one frame is ever queued. `submit`
//     swaps the new frame into the slot; an unconsumed previous frame is
//     overwritten and dropped. Frame production is lossy by design:
//     latest-frame-wins, not FIFO.
// 2.  **One Dedicated Worker**: Exactly one background thread runs the
//     detector. It sleeps on a condition variable, wakes when a frame is
//     pending or shutdown is requested, takes the frame out of shared state,
//     and releases the lock before doing any O(width * height) work.
// 3.  **Short Critical Sections**: The shared lock only ever guards O(1)
//     slot swaps, flag updates, and list swaps. The bulk pixel copy happens
//     on the producer side before the lock is taken; detection happens on
//     the worker side after it is released.
// 4.  **Non-Blocking Producer**: `submit` and `latest_blobs` never wait on
//     the worker's progress. A reader may observe the previous pass's
//     result if a new pass is still in flight; it never observes a mix of
//     two frames, and results never go backwards in submission order.
// 5.  **Cooperative Shutdown**: The stop flag is only observed at the wait
//     point, so an in-flight pass always completes and publishes before the
//     worker exits. `shutdown` joins the thread and is idempotent; `Drop`
//     calls it.
// 6.  **Failed Passes Stay Local**: A detection pass that cannot allocate
//     its working memory is logged, counted, and skipped. The previously
//     published blob list stays intact and the worker waits for the next
//     frame. The system moves forward rather than retrying stale data.

use crate::core_modules::blob_detector::blob_detector::{self, DetectorScratch};
use crate::core_modules::frame::OwnedFrame;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

// Re-export the data structures consumers need alongside the pipeline.
pub use crate::core_modules::blob::Blob;
pub use crate::core_modules::frame::PixelBuffer;
pub use crate::core_modules::params::{DetectionParameters, TunableParams};

/// Startup configuration for the `FramePipeline`.
///
/// The three detection knobs seed the live-tunable parameters and can be
/// changed at runtime through `tunables()`. The reserved capacity is fixed
/// for the pipeline's lifetime; changing it means rebuilding the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Initial pixel intensity cutoff.
    pub threshold: u8,
    /// Initial minimum blob area in pixels, inclusive.
    pub min_area: u32,
    /// Initial maximum blob area in pixels, inclusive.
    pub max_area: u32,
    /// Upper bound on the number of blobs reported per pass. Excess blobs
    /// are silently dropped; zero is legal and yields empty results.
    pub reserved_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: 200,
            min_area: 5,
            max_area: 100,
            reserved_capacity: 50,
        }
    }
}

impl PipelineConfig {
    fn initial_params(&self) -> DetectionParameters {
        DetectionParameters {
            threshold: self.threshold,
            min_area: self.min_area,
            max_area: self.max_area,
        }
    }
}

// The synchronization point shared by the producer and the worker. Every
// field is guarded by the pipeline's single mutex.
struct SharedDetectionState {
    /// The single-slot mailbox. `Some` doubles as the "frame pending" flag.
    pending_frame: Option<OwnedFrame>,
    /// The most recently published detection result.
    latest_blobs: Vec<Blob>,
    /// Number of passes that failed to allocate working memory.
    failed_passes: u64,
    /// Set by `shutdown`; observed by the worker at its wait point.
    stop_requested: bool,
}

/// Owns the detection worker thread and the shared state between it and the
/// capture loop.
pub struct FramePipeline {
    state: Arc<Mutex<SharedDetectionState>>,
    /// Signalled when a frame lands in the mailbox or shutdown is requested.
    frame_ready: Arc<Condvar>,
    tunables: Arc<TunableParams>,
    reserved_capacity: usize,
    worker: Option<thread::JoinHandle<()>>,
}

impl FramePipeline {
    /// Builds the shared state and spawns the dedicated detection worker.
    pub fn new(config: PipelineConfig) -> Self {
        let state = Arc::new(Mutex::new(SharedDetectionState {
            pending_frame: None,
            latest_blobs: Vec::new(),
            failed_passes: 0,
            stop_requested: false,
        }));
        let frame_ready = Arc::new(Condvar::new());
        let tunables = Arc::new(TunableParams::new(config.initial_params()));

        let worker_state = Arc::clone(&state);
        let worker_signal = Arc::clone(&frame_ready);
        let worker_tunables = Arc::clone(&tunables);
        let capacity = config.reserved_capacity;
        let worker = thread::Builder::new()
            .name("blob-detector".into())
            .spawn(move || {
                worker_loop(worker_state, worker_signal, worker_tunables, capacity);
            })
            .expect("failed to spawn the blob detection worker thread");

        Self {
            state,
            frame_ready,
            tunables,
            reserved_capacity: config.reserved_capacity,
            worker: Some(worker),
        }
    }

    /// Hands a frame to the detection worker. Never blocks on the worker.
    ///
    /// The frame is copied before the lock is taken, so the caller may reuse
    /// its own buffer immediately. If the worker has not yet consumed the
    /// previously submitted frame, that frame is overwritten and dropped.
    pub fn submit(&self, frame: &PixelBuffer<'_>) {
        let owned = OwnedFrame::copy_of(frame);
        {
            let mut shared = self.state.lock();
            if shared.pending_frame.replace(owned).is_some() {
                trace!("unconsumed frame overwritten; latest-frame-wins");
            }
        }
        self.frame_ready.notify_one();
    }

    /// Returns the most recently published blob list. Never blocks on the
    /// worker; may lag the newest submission by one in-flight pass.
    pub fn latest_blobs(&self) -> Vec<Blob> {
        self.state.lock().latest_blobs.clone()
    }

    /// Number of detection passes that failed (allocation errors). Each
    /// failure left the previously published blob list intact.
    pub fn failed_passes(&self) -> u64 {
        self.state.lock().failed_passes
    }

    /// Handle for the external tuning layer. Updates take effect on the
    /// worker's next detection pass.
    pub fn tunables(&self) -> Arc<TunableParams> {
        Arc::clone(&self.tunables)
    }

    /// The blob capacity this pipeline was built with.
    pub fn reserved_capacity(&self) -> usize {
        self.reserved_capacity
    }

    /// Stops the worker and waits for it to exit. Idempotent; a second call
    /// is a no-op. An in-flight pass completes and publishes first, which
    /// bounds shutdown latency by one pass.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        {
            let mut shared = self.state.lock();
            shared.stop_requested = true;
        }
        self.frame_ready.notify_one();
        if worker.join().is_err() {
            warn!("blob detection worker panicked before shutdown");
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// The dedicated worker: Idle (waiting) -> Processing (detection, outside the
// lock) -> Publishing (reacquire, swap result) -> Idle, or Stopped once the
// stop flag is observed while idle.
fn worker_loop(
    state: Arc<Mutex<SharedDetectionState>>,
    frame_ready: Arc<Condvar>,
    tunables: Arc<TunableParams>,
    capacity: usize,
) {
    debug!(capacity, "blob detection worker started");
    let mut scratch = DetectorScratch::new();

    loop {
        let frame = {
            let mut shared = state.lock();
            frame_ready.wait_while(&mut shared, |shared| {
                !shared.stop_requested && shared.pending_frame.is_none()
            });
            if shared.stop_requested {
                break;
            }
            let Some(frame) = shared.pending_frame.take() else {
                continue;
            };
            frame
        };

        // Parameters are re-read once per pass; mid-pass updates land on the
        // next frame.
        let params = tunables.snapshot();
        match blob_detector::find_blobs_denoised(&frame.as_view(), &params, capacity, &mut scratch)
        {
            Ok(blobs) => {
                trace!(blobs = blobs.len(), "detection pass published");
                let mut shared = state.lock();
                shared.latest_blobs = blobs;
            }
            Err(error) => {
                warn!(%error, "detection pass failed; previous results kept");
                let mut shared = state.lock();
                shared.failed_passes += 1;
            }
        }
    }

    debug!("blob detection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::time::{Duration, Instant};

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            threshold: 100,
            min_area: 1,
            max_area: 100,
            reserved_capacity: 10,
        }
    }

    /// A frame with one solid bright square, big enough to survive the open
    /// stage.
    fn square_frame(size: u32, left: u32, top: u32, side: u32) -> GrayImage {
        let mut image = GrayImage::new(size, size);
        for y in top..top + side {
            for x in left..left + side {
                image.put_pixel(x, y, image::Luma([255]));
            }
        }
        image
    }

    fn wait_for_blobs(
        pipeline: &FramePipeline,
        expected: &[Blob],
        timeout: Duration,
    ) -> Vec<Blob> {
        let deadline = Instant::now() + timeout;
        loop {
            let blobs = pipeline.latest_blobs();
            if blobs == expected {
                return blobs;
            }
            if Instant::now() >= deadline {
                return blobs;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn publishes_blobs_for_a_submitted_frame() {
        let mut pipeline = FramePipeline::new(test_config());
        let image = square_frame(10, 4, 4, 3);

        pipeline.submit(&(&image).into());

        let expected = [Blob { x: 5, y: 5, area: 9 }];
        let blobs = wait_for_blobs(&pipeline, &expected, Duration::from_secs(5));
        assert_eq!(blobs, expected);
        assert_eq!(pipeline.failed_passes(), 0);

        pipeline.shutdown();
    }

    #[test]
    fn latest_frame_wins_over_a_backlog() {
        let mut pipeline = FramePipeline::new(test_config());
        let frame_a = square_frame(12, 2, 2, 3);
        let frame_b = square_frame(12, 7, 7, 3);

        // Two submissions with no intervening read: the result must
        // eventually derive from the second frame (or a later one).
        pipeline.submit(&(&frame_a).into());
        pipeline.submit(&(&frame_b).into());

        let expected = [Blob { x: 8, y: 8, area: 9 }];
        let blobs = wait_for_blobs(&pipeline, &expected, Duration::from_secs(5));
        assert_eq!(blobs, expected);

        pipeline.shutdown();
    }

    #[test]
    fn newer_empty_frame_replaces_published_blobs() {
        let mut pipeline = FramePipeline::new(test_config());
        let bright = square_frame(10, 4, 4, 3);
        let dark = GrayImage::new(10, 10);

        pipeline.submit(&(&bright).into());
        let expected = [Blob { x: 5, y: 5, area: 9 }];
        assert_eq!(
            wait_for_blobs(&pipeline, &expected, Duration::from_secs(5)),
            expected
        );

        pipeline.submit(&(&dark).into());
        assert_eq!(
            wait_for_blobs(&pipeline, &[], Duration::from_secs(5)),
            Vec::<Blob>::new()
        );

        pipeline.shutdown();
    }

    #[test]
    fn tunables_take_effect_on_later_passes() {
        let mut pipeline = FramePipeline::new(test_config());
        let bright = square_frame(10, 4, 4, 3);

        pipeline.submit(&(&bright).into());
        let expected = [Blob { x: 5, y: 5, area: 9 }];
        assert_eq!(
            wait_for_blobs(&pipeline, &expected, Duration::from_secs(5)),
            expected
        );

        // Raise the cutoff so nothing is strictly brighter than it.
        pipeline.tunables().set_threshold(255);
        pipeline.submit(&(&bright).into());
        assert_eq!(
            wait_for_blobs(&pipeline, &[], Duration::from_secs(5)),
            Vec::<Blob>::new()
        );

        pipeline.shutdown();
    }

    #[test]
    fn capacity_zero_runs_passes_that_report_nothing() {
        let mut pipeline = FramePipeline::new(PipelineConfig {
            reserved_capacity: 0,
            ..test_config()
        });
        let bright = square_frame(10, 4, 4, 3);

        pipeline.submit(&(&bright).into());
        thread::sleep(Duration::from_millis(100));
        assert!(pipeline.latest_blobs().is_empty());
        assert_eq!(pipeline.failed_passes(), 0);

        pipeline.shutdown();
    }

    #[test]
    fn failed_pass_is_counted_and_publishes_nothing() {
        // A capacity this large makes every pass fail its result-list
        // reservation, so the worker must count the failure and leave the
        // published list alone rather than substituting an empty result.
        let mut pipeline = FramePipeline::new(PipelineConfig {
            reserved_capacity: usize::MAX,
            ..test_config()
        });
        let bright = square_frame(10, 4, 4, 3);

        pipeline.submit(&(&bright).into());
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.failed_passes() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(pipeline.failed_passes() >= 1);
        assert!(pipeline.latest_blobs().is_empty());

        pipeline.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_safe_without_frames() {
        let mut pipeline = FramePipeline::new(test_config());
        pipeline.shutdown();
        pipeline.shutdown();
    }

    #[test]
    fn drop_joins_the_worker() {
        let pipeline = FramePipeline::new(test_config());
        let image = square_frame(10, 4, 4, 3);
        pipeline.submit(&(&image).into());
        drop(pipeline);
    }
}
