// THEORY:
// The `BlobDetector` is the engine's leaf computation: a pure function from a
// grayscale frame plus scalar parameters to an ordered list of blobs. It has
// no shared state and performs no I/O, which is what lets the pipeline run it
// on a worker thread against a private frame copy with no synchronization at
// all during the pass.
//
// Key architectural principles & algorithm steps:
// 1.  **Binarize**: Every pixel strictly brighter than the threshold becomes
//     foreground. The comparison is non-inclusive; a pixel exactly at the
//     threshold is background.
// 2.  **Optional Open**: `find_blobs_denoised` runs a 3x3 morphological open
//     over the binary mask before labeling, wiping out isolated sensor-noise
//     speckles. `find_blobs` skips it and labels the raw mask, so a genuine
//     single-pixel region is still reportable.
// 3.  **Flood-Fill Labeling**: Pixels are scanned in raster order. Each
//     unvisited foreground pixel seeds a breadth-first expansion over its
//     8-connected neighborhood, driven by an explicit work queue rather than
//     recursion, since the worst-case component is the whole frame and must
//     not be bounded by the call stack. Every examined pixel, foreground or
//     background, is marked visited exactly once, so a full pass is
//     O(width * height) regardless of blob count.
// 4.  **Area Filter & Capacity Cap**: A component becomes a `Blob` only if
//     its pixel count lies in `[min_area, max_area]`. Once the output list
//     reaches the configured capacity, further components are dropped but
//     the scan continues so visited-marking stays correct. Blob order is the
//     raster order of each component's first-encountered pixel: an artifact
//     of the scan, but a deterministic one.
// 5.  **Fallible Scratch**: All working memory (mask, open buffer, visited
//     map, queue, result list) lives in a reusable `DetectorScratch` and is
//     sized with `try_reserve`. An allocation failure surfaces as
//     `DetectError::ScratchAllocation` instead of an empty result, so
//     callers can tell a failed pass from a frame with no blobs.

use crate::core_modules::blob::Blob;
use crate::core_modules::frame::PixelBuffer;
use crate::core_modules::mask;
use crate::core_modules::params::DetectionParameters;

pub mod blob_detector {
    use super::*;
    use std::collections::TryReserveError;
    use thiserror::Error;

    /// A detection pass failed before producing a result.
    #[derive(Debug, Error)]
    pub enum DetectError {
        /// The scratch buffers or result list for this pass could not be
        /// allocated. The pass produced nothing; previously published
        /// results remain valid.
        #[error("failed to allocate detection working memory: {0}")]
        ScratchAllocation(#[from] TryReserveError),
    }

    /// Reusable working memory for detection passes.
    ///
    /// One scratch instance is owned by whoever runs the detector (the
    /// pipeline worker owns exactly one) and is re-sized to the frame on
    /// every pass, so the hot path never reallocates once the frame
    /// geometry is stable.
    #[derive(Debug, Default)]
    pub struct DetectorScratch {
        mask: Vec<u8>,
        morph: Vec<u8>,
        visited: Vec<bool>,
        queue: Vec<(u32, u32)>,
    }

    impl DetectorScratch {
        pub fn new() -> Self {
            Self::default()
        }

        fn prepare(&mut self, pixels: usize, with_morph: bool) -> Result<(), DetectError> {
            fill(&mut self.mask, pixels, 0u8)?;
            fill(&mut self.visited, pixels, false)?;
            if with_morph {
                fill(&mut self.morph, pixels, 0u8)?;
            }
            self.queue.clear();
            self.queue.try_reserve(pixels)?;
            Ok(())
        }
    }

    // Clears `buf` and re-sizes it to `pixels` copies of `value` without
    // aborting on out-of-memory. The resize after `try_reserve` cannot
    // allocate again.
    fn fill<T: Copy>(buf: &mut Vec<T>, pixels: usize, value: T) -> Result<(), TryReserveError> {
        buf.clear();
        buf.try_reserve(pixels)?;
        buf.resize(pixels, value);
        Ok(())
    }

    /// Detects bright blobs in `frame` without morphological denoising.
    ///
    /// Binarizes against `params.threshold` and labels 8-connected
    /// foreground components, reporting each one whose area lies in
    /// `[min_area, max_area]`, up to `capacity` blobs, in raster order of
    /// first-encountered pixel.
    pub fn find_blobs(
        frame: &PixelBuffer<'_>,
        params: &DetectionParameters,
        capacity: usize,
        scratch: &mut DetectorScratch,
    ) -> Result<Vec<Blob>, DetectError> {
        let Some(pixels) = frame_pixels(frame) else {
            return Ok(Vec::new());
        };
        scratch.prepare(pixels, false)?;
        mask::binarize(frame, params.threshold, &mut scratch.mask);
        label_components(frame.width(), frame.height(), params, capacity, scratch)
    }

    /// Detects bright blobs in `frame` with a 3x3 morphological open applied
    /// to the binary mask first.
    ///
    /// This is the full threshold -> open -> flood-fill path the pipeline
    /// worker runs per frame. The open stage removes isolated single-pixel
    /// and hairline speckles before labeling.
    pub fn find_blobs_denoised(
        frame: &PixelBuffer<'_>,
        params: &DetectionParameters,
        capacity: usize,
        scratch: &mut DetectorScratch,
    ) -> Result<Vec<Blob>, DetectError> {
        let Some(pixels) = frame_pixels(frame) else {
            return Ok(Vec::new());
        };
        scratch.prepare(pixels, true)?;
        mask::binarize(frame, params.threshold, &mut scratch.mask);
        mask::open_3x3(
            &mut scratch.mask,
            &mut scratch.morph,
            frame.width(),
            frame.height(),
        );
        label_components(frame.width(), frame.height(), params, capacity, scratch)
    }

    fn frame_pixels(frame: &PixelBuffer<'_>) -> Option<usize> {
        let pixels = frame.width() as usize * frame.height() as usize;
        (pixels > 0).then_some(pixels)
    }

    // Raster-scan connected-component labeling over the prepared mask.
    fn label_components(
        width: u32,
        height: u32,
        params: &DetectionParameters,
        capacity: usize,
        scratch: &mut DetectorScratch,
    ) -> Result<Vec<Blob>, DetectError> {
        let DetectorScratch {
            mask,
            visited,
            queue,
            ..
        } = scratch;

        let mut blobs: Vec<Blob> = Vec::new();
        blobs.try_reserve_exact(capacity)?;

        for y in 0..height {
            for x in 0..width {
                let index = (y as usize) * width as usize + x as usize;
                if visited[index] {
                    continue;
                }
                visited[index] = true;
                if mask[index] == 0 {
                    continue;
                }

                // Breadth-first expansion from this seed. `head` walks the
                // queue in place; the queue was reserved for the whole
                // frame, so pushes never reallocate.
                queue.clear();
                queue.push((x, y));
                let mut head = 0usize;
                let mut sum_x: u64 = 0;
                let mut sum_y: u64 = 0;
                let mut count: u32 = 0;

                while head < queue.len() {
                    let (px, py) = queue[head];
                    head += 1;
                    sum_x += u64::from(px);
                    sum_y += u64::from(py);
                    count += 1;

                    for dy in -1i64..=1 {
                        for dx in -1i64..=1 {
                            if dx == 0 && dy == 0 {
                                continue;
                            }
                            let nx = i64::from(px) + dx;
                            let ny = i64::from(py) + dy;
                            if nx < 0
                                || nx >= i64::from(width)
                                || ny < 0
                                || ny >= i64::from(height)
                            {
                                continue;
                            }
                            let nindex = (ny * i64::from(width) + nx) as usize;
                            if visited[nindex] {
                                continue;
                            }
                            // Background neighbors are marked too; no pixel
                            // is ever re-examined as a later seed.
                            visited[nindex] = true;
                            if mask[nindex] != 0 {
                                queue.push((nx as u32, ny as u32));
                            }
                        }
                    }
                }

                if count >= params.min_area && count <= params.max_area && blobs.len() < capacity {
                    blobs.push(Blob {
                        x: (sum_x / u64::from(count)) as u32,
                        y: (sum_y / u64::from(count)) as u32,
                        area: count,
                    });
                }
            }
        }

        Ok(blobs)
    }
}
