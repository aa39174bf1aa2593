// THEORY:
// The `params` module carries the three live-tunable detection knobs from an
// external UI layer (trackbars, a config endpoint, a test harness) into the
// detection worker.
//
// Key architectural principles:
// 1.  **Snapshot Per Pass**: The worker reads all three values once at the
//     start of each detection pass and works from that plain
//     `DetectionParameters` snapshot. Updates arriving mid-pass take effect
//     on the next pass.
// 2.  **Tolerated Skew**: The three fields are independent relaxed atomics,
//     not one locked record. A UI update landing between the threshold load
//     and the area loads can skew a single pass; the next pass sees the
//     coherent values. This keeps the tuning path entirely lock-free.
// 3.  **Degenerate Inputs Are Not Errors**: `max_area < min_area` simply
//     means the area filter never passes and zero blobs are reported.
//     There is no validation layer and none is needed.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// A coherent snapshot of the detection knobs, taken once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionParameters {
    /// Pixel intensity cutoff. Only pixels strictly brighter than this are
    /// foreground; a pixel exactly equal to the threshold is background.
    pub threshold: u8,
    /// Minimum pixel count for a reported blob, inclusive.
    pub min_area: u32,
    /// Maximum pixel count for a reported blob, inclusive.
    pub max_area: u32,
}

/// The shared, live-tunable form of `DetectionParameters`.
///
/// Held in an `Arc` by both the pipeline's worker and the external tuning
/// layer. All accesses are relaxed; cross-field atomicity is intentionally
/// not provided.
#[derive(Debug)]
pub struct TunableParams {
    threshold: AtomicU8,
    min_area: AtomicU32,
    max_area: AtomicU32,
}

impl TunableParams {
    pub fn new(initial: DetectionParameters) -> Self {
        Self {
            threshold: AtomicU8::new(initial.threshold),
            min_area: AtomicU32::new(initial.min_area),
            max_area: AtomicU32::new(initial.max_area),
        }
    }

    /// Reads all three knobs into a plain snapshot.
    pub fn snapshot(&self) -> DetectionParameters {
        DetectionParameters {
            threshold: self.threshold.load(Ordering::Relaxed),
            min_area: self.min_area.load(Ordering::Relaxed),
            max_area: self.max_area.load(Ordering::Relaxed),
        }
    }

    pub fn set_threshold(&self, threshold: u8) {
        self.threshold.store(threshold, Ordering::Relaxed);
    }

    pub fn set_min_area(&self, min_area: u32) {
        self.min_area.store(min_area, Ordering::Relaxed);
    }

    pub fn set_max_area(&self, max_area: u32) {
        self.max_area.store(max_area, Ordering::Relaxed);
    }
}
