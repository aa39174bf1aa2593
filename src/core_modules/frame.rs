// THEORY:
// The `frame` module defines how raw grayscale image data enters the engine.
// It draws a hard line between borrowed and owned pixel data, which is the
// foundation of the pipeline's "copy once, then never block the camera"
// handoff contract.
//
// Key architectural principles:
// 1.  **Borrowed Input**: A `PixelBuffer` is a read-only view over pixel
//     bytes owned by the capture source. It carries an explicit row stride
//     because capture hardware frequently pads rows; the stride may exceed
//     the width and the view must never read into the padding.
// 2.  **Owned Handoff**: An `OwnedFrame` is an independent, tightly packed
//     copy taken at submission time. Once the copy exists, the capture
//     source is free to overwrite its own buffer immediately.
// 3.  **Dumb Data**: Neither type analyzes anything. They are containers
//     with just enough geometry math to let the detector iterate rows
//     safely. All intelligence lives in `blob_detector` and `mask`.

use image::GrayImage;

/// A read-only view of an 8-bit grayscale image, with an explicit row stride.
///
/// The underlying bytes are owned by the caller (typically the capture
/// source). Rows begin every `stride` bytes; only the first `width` bytes of
/// each row are pixels, the remainder is padding and is never read.
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
    /// Wraps raw grayscale bytes in a view.
    ///
    /// # Panics
    /// Panics if `stride < width`, or if `data` is too short to hold
    /// `height` rows of `stride` bytes (the final row only needs `width`).
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize) -> Self {
        assert!(
            stride >= width as usize,
            "row stride ({stride}) must be at least the image width ({width})"
        );
        if width > 0 && height > 0 {
            let required = stride * (height as usize - 1) + width as usize;
            assert!(
                data.len() >= required,
                "pixel data holds {} bytes but {width}x{height} with stride {stride} needs {required}",
                data.len()
            );
        }
        Self {
            width,
            height,
            stride,
            data,
        }
    }

    /// Wraps tightly packed grayscale bytes (stride equal to width).
    pub fn from_packed(data: &'a [u8], width: u32, height: u32) -> Self {
        Self::new(data, width, height, width as usize)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the pixel bytes of row `y`, excluding any stride padding.
    ///
    /// # Panics
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }
}

impl<'a> From<&'a GrayImage> for PixelBuffer<'a> {
    fn from(image: &'a GrayImage) -> Self {
        Self::from_packed(image.as_raw(), image.width(), image.height())
    }
}

/// An independently owned, tightly packed grayscale frame.
///
/// This is the pipeline's copy of a submitted `PixelBuffer`. Any stride
/// padding in the source view is compacted away during the copy, so the
/// owned form always has `stride == width`.
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl OwnedFrame {
    /// Copies a borrowed view into an owned frame, row by row.
    pub fn copy_of(view: &PixelBuffer<'_>) -> Self {
        let width = view.width() as usize;
        let mut data = Vec::with_capacity(width * view.height() as usize);
        for y in 0..view.height() {
            data.extend_from_slice(view.row(y));
        }
        Self {
            width: view.width(),
            height: view.height(),
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Re-borrows the owned pixels as a packed view for the detector.
    pub fn as_view(&self) -> PixelBuffer<'_> {
        PixelBuffer::from_packed(&self.data, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_access_skips_stride_padding() {
        // 3x2 image with 2 bytes of padding per row, padding set to 0xFF.
        let data = [1, 2, 3, 0xFF, 0xFF, 4, 5, 6, 0xFF, 0xFF];
        let view = PixelBuffer::new(&data[..8], 3, 2, 5);

        assert_eq!(view.row(0), &[1, 2, 3]);
        assert_eq!(view.row(1), &[4, 5, 6]);
    }

    #[test]
    fn copy_of_compacts_padded_rows() {
        let data = [10, 20, 0xAA, 0xAA, 30, 40, 0xAA, 0xAA];
        let view = PixelBuffer::new(&data[..6], 2, 2, 4);

        let owned = OwnedFrame::copy_of(&view);
        assert_eq!(owned.width(), 2);
        assert_eq!(owned.height(), 2);
        assert_eq!(owned.as_view().row(0), &[10, 20]);
        assert_eq!(owned.as_view().row(1), &[30, 40]);
        assert_eq!(owned.as_view().stride(), 2);
    }

    #[test]
    fn gray_image_converts_to_packed_view() {
        let mut image = GrayImage::new(4, 3);
        image.put_pixel(2, 1, image::Luma([200]));

        let view = PixelBuffer::from(&image);
        assert_eq!(view.width(), 4);
        assert_eq!(view.height(), 3);
        assert_eq!(view.row(1)[2], 200);
        assert_eq!(view.row(0)[0], 0);
    }

    #[test]
    #[should_panic(expected = "row stride")]
    fn stride_smaller_than_width_is_rejected() {
        let data = [0u8; 16];
        let _ = PixelBuffer::new(&data, 4, 4, 3);
    }
}
