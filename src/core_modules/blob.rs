// THEORY:
// The `Blob` module defines the engine's sole output type. A `Blob` is the
// summary of one contiguous bright region found in a single frame.
//
// Key architectural principles:
// 1.  **Immutable Snapshot**: A blob describes a region in one frame only.
//     It has no identity across frames and no memory; any tracking layer
//     built on top of this engine is responsible for data association.
// 2.  **Dumb Data Container**: The struct carries exactly what downstream
//     consumers (overlay rendering, gesture logic) need, namely where the
//     region is and how big it is, and nothing about how it was found.
// 3.  **Integer Coordinates**: Centroids are the integer-truncated mean of
//     the member pixels' coordinates. Truncation, not rounding, keeps the
//     arithmetic deterministic and cheap in the per-frame hot path.

/// A single detected bright region in one frame.
///
/// The centroid is the mean of the member pixels' coordinates with integer
/// truncation; `area` is the number of member pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    /// Centroid x-coordinate in pixels.
    pub x: u32,
    /// Centroid y-coordinate in pixels.
    pub y: u32,
    /// Number of pixels in the region.
    pub area: u32,
}
