//! Coordinate algebra between the three spaces of a viewport
//!
//! - document space: page units (points), independent of zoom
//! - scaled space: document space multiplied by `zoom`
//! - viewport space: scaled space translated by the negated scroll offset
//!
//! Scroll offsets are stored in document units so that a zoom change keeps
//! the same content at the top-left corner. They are converted to scaled
//! units with the same `zoom` before the translation.

use crate::geometry::{Point, Rect, Size};
use crate::view_state::Rotation;

/// Document space → scaled space.
#[must_use]
pub fn page_to_scaled(point: Point, zoom: f32) -> Point {
    Point::new(point.x * zoom, point.y * zoom)
}

/// Scaled space → document space.
#[must_use]
pub fn scaled_to_page(point: Point, zoom: f32) -> Point {
    Point::new(point.x / zoom, point.y / zoom)
}

/// Scaled space → viewport space. `scroll` is in scaled units.
#[must_use]
pub fn scaled_to_viewport(point: Point, scroll: Point) -> Point {
    Point::new(point.x - scroll.x, point.y - scroll.y)
}

/// Viewport space → scaled space. `scroll` is in scaled units.
#[must_use]
pub fn viewport_to_scaled(point: Point, scroll: Point) -> Point {
    Point::new(point.x + scroll.x, point.y + scroll.y)
}

/// The composed document ↔ viewport mapping for one zoom/scroll pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub zoom: f32,
    /// Scroll offset in document units.
    pub scroll: Point,
}

impl ViewTransform {
    #[must_use]
    pub fn new(zoom: f32, scroll: Point) -> Self {
        Self { zoom, scroll }
    }

    fn scaled_scroll(&self) -> Point {
        page_to_scaled(self.scroll, self.zoom)
    }

    #[must_use]
    pub fn page_to_viewport(&self, point: Point) -> Point {
        scaled_to_viewport(page_to_scaled(point, self.zoom), self.scaled_scroll())
    }

    /// Inverse of [`ViewTransform::page_to_viewport`], used for hit testing.
    #[must_use]
    pub fn viewport_to_page(&self, point: Point) -> Point {
        scaled_to_page(viewport_to_scaled(point, self.scaled_scroll()), self.zoom)
    }
}

/// Page size as displayed: width and height swap on quarter turns.
#[must_use]
pub fn oriented_page_size(page_size: Size, rotation: Rotation) -> Size {
    if rotation.is_quarter_turn() {
        page_size.transposed()
    } else {
        page_size
    }
}

/// Size of the whole scaled page in viewport pixels.
#[must_use]
pub fn canvas_size(page_size: Size, zoom: f32) -> Size {
    page_size.scale(zoom)
}

/// Document-space rectangle currently shown in the viewport.
///
/// `scroll_fraction` is the scrollbar position (0..1 per axis) and is
/// multiplied by the page dimension to get the top-left corner; the viewport
/// size is converted to document units through `zoom`. The result is clamped
/// to the page so a page smaller than the viewport never yields a clip past
/// its edges.
#[must_use]
pub fn viewport_visible_region(
    viewport_size: Size,
    scroll_fraction: (f32, f32),
    page_size: Size,
    zoom: f32,
) -> Rect {
    let x0 = scroll_fraction.0.clamp(0.0, 1.0) * page_size.width;
    let y0 = scroll_fraction.1.clamp(0.0, 1.0) * page_size.height;
    let view = viewport_size.scale(1.0 / zoom);
    Rect::new(x0, y0, x0 + view.width, y0 + view.height).clamp_to(page_size)
}

/// Scroll offset (document units) expressed as a fraction of the page.
#[must_use]
pub fn scroll_fraction(scroll: (f32, f32), page_size: Size) -> (f32, f32) {
    let frac = |offset: f32, extent: f32| {
        if extent <= 0.0 {
            0.0
        } else {
            (offset / extent).clamp(0.0, 1.0)
        }
    };
    (
        frac(scroll.0, page_size.width),
        frac(scroll.1, page_size.height),
    )
}

/// Largest scroll offset, in document units, that still fills the viewport.
#[must_use]
pub fn max_scroll(viewport_size: Size, page_size: Size, zoom: f32) -> (f32, f32) {
    let view = viewport_size.scale(1.0 / zoom);
    (
        (page_size.width - view.width).max(0.0),
        (page_size.height - view.height).max(0.0),
    )
}

/// First/last visible fraction of the page on one axis, as a scrollbar slider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollbarSpan {
    pub first: f32,
    pub last: f32,
}

/// Scrollbar slider spans for the horizontal and vertical bars.
#[must_use]
pub fn scrollbar_proportions(
    viewport_size: Size,
    scroll: (f32, f32),
    page_size: Size,
    zoom: f32,
) -> (ScrollbarSpan, ScrollbarSpan) {
    let visible = viewport_visible_region(
        viewport_size,
        scroll_fraction(scroll, page_size),
        page_size,
        zoom,
    );
    let span = |start: f32, end: f32, extent: f32| {
        if extent <= 0.0 {
            ScrollbarSpan {
                first: 0.0,
                last: 1.0,
            }
        } else {
            ScrollbarSpan {
                first: start / extent,
                last: end / extent,
            }
        }
    };
    (
        span(visible.x0, visible.x1, page_size.width),
        span(visible.y0, visible.y1, page_size.height),
    )
}
