//! Document backend contract
//!
//! The viewer never parses documents itself. A [`DocumentBackend`] opens a
//! path into a [`Document`] handle, and the handle answers page geometry
//! queries and rasterizes arbitrary clip rectangles. Handles are not assumed
//! to be thread-safe: each one is owned by exactly one viewport controller.

#[cfg(feature = "pdf")]
mod mupdf_backend;

#[cfg(feature = "pdf")]
pub use self::mupdf_backend::MupdfBackend;

use std::fmt;
use std::path::Path;

use crate::error::{DocumentOpenError, RenderError};
use crate::geometry::{Rect, Size};
use crate::view_state::Rotation;

/// Resolution at which one document unit maps to one pixel.
pub const POINTS_PER_INCH: f32 = 72.0;

/// One rasterization job: a clip of one page at one resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterRequest {
    /// Page index (0-based)
    pub page_no: usize,
    /// Clip rectangle in document units, in the rotated page frame
    pub clip: Rect,
    /// Output resolution in dots per inch
    pub resolution: f32,
    pub rotation: Rotation,
}

impl RasterRequest {
    /// Pixels per document unit for this request.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.resolution / POINTS_PER_INCH
    }

    /// Expected output dimensions in pixels.
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        let s = self.scale();
        (
            (self.clip.width() * s).round().max(0.0) as u32,
            (self.clip.height() * s).round().max(0.0) as u32,
        )
    }

    /// Affine map `[a, b, c, d, e, f]` from unrotated page coordinates to
    /// pixels of this request's raster, with the clip's top-left corner at
    /// pixel (0, 0). `page_bounds` is the page box reported by the backend.
    #[must_use]
    pub fn device_transform(&self, page_bounds: Rect) -> [f32; 6] {
        let s = self.scale();
        let [a, b, c, d] = match self.rotation {
            Rotation::Deg0 => [s, 0.0, 0.0, s],
            Rotation::Deg90 => [0.0, s, -s, 0.0],
            Rotation::Deg180 => [-s, 0.0, 0.0, -s],
            Rotation::Deg270 => [0.0, -s, s, 0.0],
        };

        let corners = [
            (page_bounds.x0, page_bounds.y0),
            (page_bounds.x1, page_bounds.y0),
            (page_bounds.x0, page_bounds.y1),
            (page_bounds.x1, page_bounds.y1),
        ];
        let (min_x, min_y) = corners
            .iter()
            .map(|&(x, y)| (a * x + c * y, b * x + d * y))
            .fold((f32::INFINITY, f32::INFINITY), |(mx, my), (x, y)| {
                (mx.min(x), my.min(y))
            });

        [
            a,
            b,
            c,
            d,
            -min_x - self.clip.x0 * s,
            -min_y - self.clip.y0 * s,
        ]
    }
}

/// Raw RGB pixel data (3 bytes per pixel, row-major, no padding).
#[derive(Clone, PartialEq, Eq)]
pub struct RawRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for RawRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRaster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels.len", &self.pixels.len())
            .finish()
    }
}

/// An open document. Dropping the handle releases backend resources.
pub trait Document {
    fn page_count(&self) -> usize;

    /// Intrinsic page size in document units, before rotation.
    fn page_size(&self, page_no: usize) -> Result<Size, RenderError>;

    fn rasterize(&self, request: &RasterRequest) -> Result<RawRaster, RenderError>;

    /// Text layer of one page. Image-only pages return an empty string.
    fn page_text(&self, _page_no: usize) -> Result<String, RenderError> {
        Ok(String::new())
    }

    /// Release the handle explicitly.
    fn close(self: Box<Self>) {}
}

/// Opens documents.
pub trait DocumentBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Document>, DocumentOpenError>;
}
