// THEORY:
// The `mask` module turns a grayscale frame into a binary foreground mask and
// cleans that mask with a 3x3 morphological open before labeling.
//
// Key architectural principles:
// 1.  **Strict Threshold**: A pixel is foreground only if its intensity is
//     strictly greater than the threshold. A pixel exactly at the threshold
//     is background. Downstream behavior depends on this comparison staying
//     non-inclusive.
// 2.  **Open = Erode Then Dilate**: Erosion removes any foreground pixel
//     whose 3x3 square neighborhood is not entirely foreground, which wipes
//     out isolated sensor-noise speckles. Dilation then restores the
//     interior regions that survived to their original footprint.
// 3.  **Border Policy**: Out-of-bounds neighbors are ignored. Erosion only
//     requires the in-bounds neighbors to be foreground, and dilation only
//     fires on in-bounds foreground neighbors. A bright region flush against
//     the image edge is therefore not eaten away by the border.
// 4.  **Flat Masks, Caller-Owned**: Every function writes into a
//     caller-provided `width * height` byte slice (1 = foreground,
//     0 = background). The detector owns and reuses these buffers across
//     passes; nothing here allocates.

use crate::core_modules::frame::PixelBuffer;

/// Writes the binary foreground mask of `frame` into `mask`.
///
/// `mask` must be exactly `width * height` bytes. Foreground pixels
/// (intensity strictly greater than `threshold`) become 1, all others 0.
pub fn binarize(frame: &PixelBuffer<'_>, threshold: u8, mask: &mut [u8]) {
    debug_assert_eq!(
        mask.len(),
        frame.width() as usize * frame.height() as usize
    );
    let width = frame.width() as usize;
    for y in 0..frame.height() {
        let row = frame.row(y);
        let out = &mut mask[y as usize * width..(y as usize + 1) * width];
        for (pixel, flag) in row.iter().zip(out.iter_mut()) {
            *flag = u8::from(*pixel > threshold);
        }
    }
}

/// Erodes `src` into `dst` with a 3x3 square structuring element.
///
/// A pixel stays foreground only if it and all of its in-bounds neighbors
/// are foreground.
pub fn erode_3x3(src: &[u8], dst: &mut [u8], width: u32, height: u32) {
    morph_3x3(src, dst, width, height, true);
}

/// Dilates `src` into `dst` with a 3x3 square structuring element.
///
/// A pixel becomes foreground if it or any of its in-bounds neighbors is
/// foreground.
pub fn dilate_3x3(src: &[u8], dst: &mut [u8], width: u32, height: u32) {
    morph_3x3(src, dst, width, height, false);
}

/// Applies a morphological open (erode then dilate) to `mask` in place,
/// using `scratch` as the intermediate buffer. Both slices must be
/// `width * height` bytes.
pub fn open_3x3(mask: &mut [u8], scratch: &mut [u8], width: u32, height: u32) {
    erode_3x3(mask, scratch, width, height);
    dilate_3x3(scratch, mask, width, height);
}

// Shared kernel walk for erode (all neighbors foreground) and dilate (any
// neighbor foreground). The 3x3 window includes the center pixel itself.
fn morph_3x3(src: &[u8], dst: &mut [u8], width: u32, height: u32, require_all: bool) {
    debug_assert_eq!(src.len(), width as usize * height as usize);
    debug_assert_eq!(dst.len(), src.len());

    let width_i = width as i64;
    let height_i = height as i64;
    for y in 0..height_i {
        for x in 0..width_i {
            let mut any = false;
            let mut all = true;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let ny = y + dy;
                    let nx = x + dx;
                    if ny < 0 || ny >= height_i || nx < 0 || nx >= width_i {
                        continue;
                    }
                    if src[(ny * width_i + nx) as usize] != 0 {
                        any = true;
                    } else {
                        all = false;
                    }
                }
            }
            let keep = if require_all { all } else { any };
            dst[(y * width_i + x) as usize] = u8::from(keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(width: u32, height: u32, bright: &[(u32, u32)]) -> Vec<u8> {
        let mut data = vec![0u8; (width * height) as usize];
        for &(x, y) in bright {
            data[(y * width + x) as usize] = 255;
        }
        data
    }

    #[test]
    fn binarize_is_strictly_greater_than() {
        let data = [99, 100, 101, 255];
        let view = PixelBuffer::from_packed(&data, 4, 1);
        let mut mask = vec![0u8; 4];

        binarize(&view, 100, &mut mask);
        assert_eq!(mask, [0, 0, 1, 1]);
    }

    #[test]
    fn open_removes_isolated_speckle() {
        let data = packed(7, 7, &[(3, 3)]);
        let view = PixelBuffer::from_packed(&data, 7, 7);
        let mut mask = vec![0u8; 49];
        let mut scratch = vec![0u8; 49];

        binarize(&view, 100, &mut mask);
        open_3x3(&mut mask, &mut scratch, 7, 7);
        assert!(mask.iter().all(|&flag| flag == 0));
    }

    #[test]
    fn open_preserves_solid_3x3_block() {
        let bright: Vec<(u32, u32)> = (4..7).flat_map(|y| (4..7).map(move |x| (x, y))).collect();
        let data = packed(10, 10, &bright);
        let view = PixelBuffer::from_packed(&data, 10, 10);
        let mut mask = vec![0u8; 100];
        let mut scratch = vec![0u8; 100];

        binarize(&view, 100, &mut mask);
        let before = mask.clone();
        open_3x3(&mut mask, &mut scratch, 10, 10);
        assert_eq!(mask, before);
    }

    #[test]
    fn erode_keeps_corner_block_against_image_edge() {
        // Out-of-bounds neighbors are ignored, so a 2x2 block in the corner
        // keeps its corner pixel: every in-bounds neighbor is foreground.
        let data = packed(5, 5, &[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let view = PixelBuffer::from_packed(&data, 5, 5);
        let mut mask = vec![0u8; 25];
        let mut eroded = vec![0u8; 25];

        binarize(&view, 100, &mut mask);
        erode_3x3(&mask, &mut eroded, 5, 5);
        assert_eq!(eroded[0], 1);
        assert_eq!(eroded[1], 0);
        assert_eq!(eroded[5], 0);
    }
}
