//! Visible-region rasterization
//!
//! Each pass computes the document-space region shown in the viewport, grows
//! it by a prefetch band, and asks the backend for exactly that clip. Passes
//! whose region barely moved since the previous raster are skipped so that
//! sub-pixel scroll jitter never reaches the backend.

use image::RgbImage;
use log::{debug, error};

use crate::backend::{Document, POINTS_PER_INCH, RasterRequest};
use crate::error::RenderError;
use crate::geometry::{Point, Rect, Size};
use crate::transform::{
    ScrollbarSpan, ViewTransform, oriented_page_size, scroll_fraction, scrollbar_proportions,
    viewport_visible_region,
};
use crate::view_state::Rotation;

pub const DEFAULT_MARGIN_PX: f32 = 80.0;
pub const DEFAULT_THRESHOLD_PX: f32 = 15.0;

/// Tunables for the renderer, all in viewport pixels except `base_dpi`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
    /// Prefetch band added around the visible region.
    pub margin_px: f32,
    /// Minimum movement of the region center that triggers a new raster.
    pub threshold_px: f32,
    /// Resolution at zoom 1.0.
    pub base_dpi: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            margin_px: DEFAULT_MARGIN_PX,
            threshold_px: DEFAULT_THRESHOLD_PX,
            base_dpi: POINTS_PER_INCH,
        }
    }
}

/// A converted raster ready to be drawn.
#[derive(Clone, Debug)]
pub struct RasterFrame {
    pub image: RgbImage,
    /// Viewport position of the region's top-left corner.
    pub position: Point,
    /// The document-space clip this raster covers.
    pub region: Rect,
    pub page_no: usize,
    pub zoom: f32,
}

/// The drawing surface a viewport renders into.
pub trait Surface {
    /// Replace the current raster.
    fn draw_raster(&mut self, frame: RasterFrame);

    /// Move the current raster without re-rasterizing it.
    fn reposition(&mut self, _position: Point) {}

    /// Push scrollbar slider spans (horizontal, vertical).
    fn set_scrollbars(&mut self, _horizontal: ScrollbarSpan, _vertical: ScrollbarSpan) {}
}

/// Snapshot of everything a render pass reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderInput {
    pub page_no: usize,
    pub zoom: f32,
    pub rotation: Rotation,
    /// Scroll offset in document units.
    pub scroll: (f32, f32),
    pub viewport: Size,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderOutcome {
    /// A new raster of this region was drawn.
    Rendered(Rect),
    /// The previous raster still covers the view.
    Unchanged,
    /// Nothing to draw (empty viewport or degenerate page).
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct RenderedRegion {
    page_no: usize,
    zoom: f32,
    rotation: Rotation,
    region: Rect,
}

#[derive(Debug, Default)]
pub struct ViewportRenderer {
    config: RenderConfig,
    last: Option<RenderedRegion>,
    rasterizations: u64,
}

impl ViewportRenderer {
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            last: None,
            rasterizations: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Number of backend rasterizations performed.
    #[must_use]
    pub fn rasterizations(&self) -> u64 {
        self.rasterizations
    }

    #[must_use]
    pub fn last_region(&self) -> Option<Rect> {
        self.last.map(|l| l.region)
    }

    /// Forget the last raster so the next pass always rasterizes.
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// The clip a pass with `input` would request, before the skip check.
    pub fn target_region(&self, input: &RenderInput, page_size: Size) -> Rect {
        let page = oriented_page_size(page_size, input.rotation);
        let visible = viewport_visible_region(
            input.viewport,
            scroll_fraction(input.scroll, page),
            page,
            input.zoom,
        );
        visible
            .expand(self.config.margin_px / input.zoom)
            .clamp_to(page)
    }

    fn is_unchanged(&self, input: &RenderInput, region: &Rect) -> bool {
        let Some(last) = self.last else {
            return false;
        };
        if last.page_no != input.page_no
            || last.rotation != input.rotation
            || (last.zoom - input.zoom).abs() > f32::EPSILON
        {
            return false;
        }

        let threshold = self.config.threshold_px;
        let zoom = input.zoom;
        let (old_c, new_c) = (last.region.center(), region.center());
        let moved_x = (new_c.x - old_c.x).abs() * zoom;
        let moved_y = (new_c.y - old_c.y).abs() * zoom;
        let resized_x = (region.width() - last.region.width()).abs() * zoom;
        let resized_y = (region.height() - last.region.height()).abs() * zoom;

        moved_x <= threshold && moved_y <= threshold && resized_x <= threshold && resized_y <= threshold
    }

    /// Run one render pass.
    ///
    /// On a backend failure the surface is left untouched, so the previous
    /// raster stays visible, and the error is returned for reporting.
    pub fn render(
        &mut self,
        document: &dyn Document,
        input: &RenderInput,
        surface: &mut dyn Surface,
    ) -> Result<RenderOutcome, RenderError> {
        let page_size = document.page_size(input.page_no)?;
        let oriented = oriented_page_size(page_size, input.rotation);
        let transform = ViewTransform::new(input.zoom, Point::new(input.scroll.0, input.scroll.1));
        let (h, v) = scrollbar_proportions(input.viewport, input.scroll, oriented, input.zoom);
        surface.set_scrollbars(h, v);

        let region = self.target_region(input, page_size);
        if region.is_empty() {
            return Ok(RenderOutcome::Empty);
        }

        if self.is_unchanged(input, &region) {
            if let Some(last) = self.last {
                surface.reposition(transform.page_to_viewport(last.region.origin()));
            }
            debug!("Region {region:?} within threshold of last raster, skipping");
            return Ok(RenderOutcome::Unchanged);
        }

        let request = RasterRequest {
            page_no: input.page_no,
            clip: region,
            resolution: self.config.base_dpi * input.zoom,
            rotation: input.rotation,
        };
        debug!("Rasterizing page {} clip {:?} at {} dpi", input.page_no, region, request.resolution);

        let raw = document.rasterize(&request).inspect_err(|e| {
            error!("Rasterization of page {} failed: {e}", input.page_no);
        })?;
        self.rasterizations += 1;

        let expected = raw.width as usize * raw.height as usize * 3;
        let actual = raw.pixels.len();
        let (width, height) = (raw.width, raw.height);
        let image = RgbImage::from_raw(width, height, raw.pixels).ok_or(
            RenderError::InvalidRaster {
                width,
                height,
                expected,
                actual,
            },
        )?;

        surface.draw_raster(RasterFrame {
            image,
            position: transform.page_to_viewport(region.origin()),
            region,
            page_no: input.page_no,
            zoom: input.zoom,
        });

        self.last = Some(RenderedRegion {
            page_no: input.page_no,
            zoom: input.zoom,
            rotation: input.rotation,
            region,
        });
        Ok(RenderOutcome::Rendered(region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawRaster;
    use std::cell::Cell;

    struct Blank {
        size: Size,
        fail: Cell<bool>,
        calls: Cell<u32>,
    }

    impl Blank {
        fn new(w: f32, h: f32) -> Self {
            Self {
                size: Size::new(w, h),
                fail: Cell::new(false),
                calls: Cell::new(0),
            }
        }
    }

    impl Document for Blank {
        fn page_count(&self) -> usize {
            1
        }

        fn page_size(&self, _page_no: usize) -> Result<Size, RenderError> {
            Ok(self.size)
        }

        fn rasterize(&self, request: &RasterRequest) -> Result<RawRaster, RenderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(RenderError::backend(request.page_no, "corrupt page"));
            }
            let (width, height) = request.pixel_size();
            Ok(RawRaster {
                width,
                height,
                pixels: vec![255; (width * height * 3) as usize],
            })
        }
    }

    #[derive(Default)]
    struct Canvas {
        frames: Vec<RasterFrame>,
        moved_to: Option<Point>,
    }

    impl Surface for Canvas {
        fn draw_raster(&mut self, frame: RasterFrame) {
            self.frames.push(frame);
        }

        fn reposition(&mut self, position: Point) {
            self.moved_to = Some(position);
        }
    }

    fn input(scroll: (f32, f32)) -> RenderInput {
        RenderInput {
            page_no: 0,
            zoom: 1.0,
            rotation: Rotation::Deg0,
            scroll,
            viewport: Size::new(200.0, 100.0),
        }
    }

    #[test]
    fn renders_visible_region_plus_margin() {
        let doc = Blank::new(1000.0, 1000.0);
        let mut canvas = Canvas::default();
        let mut renderer = ViewportRenderer::new(RenderConfig {
            margin_px: 10.0,
            ..RenderConfig::default()
        });

        let outcome = renderer.render(&doc, &input((100.0, 100.0)), &mut canvas).unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered(Rect::new(90.0, 90.0, 310.0, 210.0)));

        let frame = &canvas.frames[0];
        assert_eq!(frame.image.dimensions(), (220, 120));
        assert_eq!(frame.position, Point::new(-10.0, -10.0));
    }

    #[test]
    fn small_scroll_is_skipped() {
        let doc = Blank::new(1000.0, 1000.0);
        let mut canvas = Canvas::default();
        let mut renderer = ViewportRenderer::default();
        renderer.render(&doc, &input((100.0, 100.0)), &mut canvas).unwrap();

        let outcome = renderer.render(&doc, &input((100.0, 110.0)), &mut canvas).unwrap();
        assert_eq!(outcome, RenderOutcome::Unchanged);
        assert_eq!(doc.calls.get(), 1);
        assert!(canvas.moved_to.is_some());

        let outcome = renderer.render(&doc, &input((100.0, 130.0)), &mut canvas).unwrap();
        assert!(matches!(outcome, RenderOutcome::Rendered(_)));
        assert_eq!(doc.calls.get(), 2);
    }

    #[test]
    fn failure_keeps_previous_raster() {
        let doc = Blank::new(1000.0, 1000.0);
        let mut canvas = Canvas::default();
        let mut renderer = ViewportRenderer::default();
        renderer.render(&doc, &input((0.0, 0.0)), &mut canvas).unwrap();
        let before = renderer.last_region();

        doc.fail.set(true);
        let err = renderer.render(&doc, &input((0.0, 500.0)), &mut canvas).unwrap_err();
        assert_eq!(err, RenderError::backend(0, "corrupt page"));
        assert_eq!(canvas.frames.len(), 1);
        assert_eq!(renderer.last_region(), before);
    }

    #[test]
    fn zoom_change_forces_rerender() {
        let doc = Blank::new(1000.0, 1000.0);
        let mut canvas = Canvas::default();
        let mut renderer = ViewportRenderer::default();
        renderer.render(&doc, &input((0.0, 0.0)), &mut canvas).unwrap();

        let mut zoomed = input((0.0, 0.0));
        zoomed.zoom = 2.0;
        renderer.render(&doc, &zoomed, &mut canvas).unwrap();
        assert_eq!(doc.calls.get(), 2);
        // Visible 100x50 grown by 40 units, clamped at the top-left corner.
        assert_eq!(canvas.frames[1].image.dimensions(), (280, 180));
    }

    #[test]
    fn empty_viewport_draws_nothing() {
        let doc = Blank::new(1000.0, 1000.0);
        let mut canvas = Canvas::default();
        let mut renderer = ViewportRenderer::new(RenderConfig {
            margin_px: 0.0,
            ..RenderConfig::default()
        });
        let mut zero = input((0.0, 0.0));
        zero.viewport = Size::new(0.0, 0.0);
        assert_eq!(renderer.render(&doc, &zero, &mut canvas).unwrap(), RenderOutcome::Empty);
        assert_eq!(doc.calls.get(), 0);
    }
}
