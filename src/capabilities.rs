//! Interfaces exposed to extensions
//!
//! Extensions get the viewer through [`ViewerAccess`] and each tab through
//! [`TabAccess`]; they never reach into controller internals. Page text goes
//! through the [`TextSource`] chain: the backend's text layer first, wrapped
//! by decorators such as [`OcrTextSource`] that add text recognized from the
//! page raster.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use image::RgbImage;
use log::debug;

use crate::backend::{Document, RasterRequest};
use crate::controller::ViewportController;
use crate::error::{RenderError, ValidationError, ViewerError};
use crate::geometry::{Point, Rect};
use crate::tabs::TabManager;
use crate::view_state::Rotation;

/// View operations an extension may perform on one tab.
pub trait TabAccess {
    fn zoom(&self) -> f32;
    fn set_zoom(&mut self, zoom: f32) -> Result<(), ValidationError>;

    fn page_no(&self) -> usize;
    fn set_page_no(&mut self, page_no: usize) -> Result<(), ValidationError>;

    /// Rotation in degrees.
    fn rotation(&self) -> u16;
    fn set_rotation(&mut self, degrees: i64) -> Result<(), ValidationError>;

    fn scroll_pos(&self) -> (f32, f32);
    fn set_scroll_pos(&mut self, x: f32, y: f32) -> Result<(), ValidationError>;

    fn total_pages(&self) -> usize;

    /// Schedule a full re-rasterization of the visible region.
    fn render(&mut self);

    /// Text of one page from the backend's text layer.
    fn page_text(&self, page_no: usize) -> Result<String, RenderError>;
}

impl TabAccess for ViewportController {
    fn zoom(&self) -> f32 {
        ViewportController::zoom(self)
    }

    fn set_zoom(&mut self, zoom: f32) -> Result<(), ValidationError> {
        ViewportController::set_zoom(self, zoom)
    }

    fn page_no(&self) -> usize {
        ViewportController::page_no(self)
    }

    fn set_page_no(&mut self, page_no: usize) -> Result<(), ValidationError> {
        self.set_page(page_no)
    }

    fn rotation(&self) -> u16 {
        ViewportController::rotation(self).degrees()
    }

    fn set_rotation(&mut self, degrees: i64) -> Result<(), ValidationError> {
        self.set_rotation_degrees(degrees)
    }

    fn scroll_pos(&self) -> (f32, f32) {
        ViewportController::scroll_pos(self)
    }

    fn set_scroll_pos(&mut self, x: f32, y: f32) -> Result<(), ValidationError> {
        self.scroll_to(x, y)
    }

    fn total_pages(&self) -> usize {
        ViewportController::total_pages(self)
    }

    fn render(&mut self) {
        self.redraw();
    }

    fn page_text(&self, page_no: usize) -> Result<String, RenderError> {
        let document = self.document().ok_or(RenderError::NoDocument)?;
        BackendTextSource::new(document).page_text(page_no)
    }
}

/// Tab lifecycle operations an extension may perform.
pub trait ViewerAccess {
    /// The current tab, when it holds an open document.
    fn get_current_tab(&mut self) -> Option<&mut dyn TabAccess>;

    /// Open `path` in a new tab and return its id.
    fn create_tab(&mut self, path: &Path) -> usize;

    fn close_tab(&mut self, tab_id: usize) -> Result<(), ViewerError>;
}

impl ViewerAccess for TabManager {
    fn get_current_tab(&mut self) -> Option<&mut dyn TabAccess> {
        self.current_controller_mut()
            .map(|controller| controller as &mut dyn TabAccess)
    }

    fn create_tab(&mut self, path: &Path) -> usize {
        TabManager::create_tab(self, path)
    }

    fn close_tab(&mut self, tab_id: usize) -> Result<(), ViewerError> {
        TabManager::close_tab(self, tab_id)
    }
}

/// Something that can produce the text of a page.
pub trait TextSource {
    fn page_text(&self, page_no: usize) -> Result<String, RenderError>;
}

/// The document's own text layer.
pub struct BackendTextSource<'a> {
    document: &'a dyn Document,
}

impl<'a> BackendTextSource<'a> {
    pub fn new(document: &'a dyn Document) -> Self {
        Self { document }
    }
}

impl TextSource for BackendTextSource<'_> {
    fn page_text(&self, page_no: usize) -> Result<String, RenderError> {
        self.document.page_text(page_no)
    }
}

/// Turns a page image into text fragments.
pub trait Recognizer {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<String>, RenderError>;
}

pub const DEFAULT_OCR_DPI: f32 = 150.0;

/// Appends text recognized from the rendered page to the wrapped source.
///
/// Recognition results are cached per page; [`OcrTextSource::forget`] drops
/// one page's entry so it is recognized again on the next request.
pub struct OcrTextSource<'a, S, R> {
    base: S,
    document: &'a dyn Document,
    recognizer: R,
    dpi: f32,
    cache: RefCell<HashMap<usize, String>>,
}

impl<'a, S: TextSource, R: Recognizer> OcrTextSource<'a, S, R> {
    pub fn new(base: S, document: &'a dyn Document, recognizer: R) -> Self {
        Self {
            base,
            document,
            recognizer,
            dpi: DEFAULT_OCR_DPI,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn forget(&self, page_no: usize) {
        self.cache.borrow_mut().remove(&page_no);
    }

    fn recognized_text(&self, page_no: usize) -> Result<String, RenderError> {
        if let Some(text) = self.cache.borrow().get(&page_no) {
            return Ok(text.clone());
        }

        let size = self.document.page_size(page_no)?;
        let request = RasterRequest {
            page_no,
            clip: Rect::from_origin_size(Point::new(0.0, 0.0), size),
            resolution: self.dpi,
            rotation: Rotation::Deg0,
        };
        let raw = self.document.rasterize(&request)?;
        let (width, height) = (raw.width, raw.height);
        let expected = width as usize * height as usize * 3;
        let actual = raw.pixels.len();
        let image = RgbImage::from_raw(width, height, raw.pixels).ok_or(
            RenderError::InvalidRaster {
                width,
                height,
                expected,
                actual,
            },
        )?;

        let text = self
            .recognizer
            .recognize(&image)?
            .into_iter()
            .filter(|fragment| !fragment.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        debug!("Recognized {} chars on page {page_no}", text.len());
        self.cache.borrow_mut().insert(page_no, text.clone());
        Ok(text)
    }
}

impl<S: TextSource, R: Recognizer> TextSource for OcrTextSource<'_, S, R> {
    fn page_text(&self, page_no: usize) -> Result<String, RenderError> {
        let mut text = self.base.page_text(page_no)?;
        let recognized = self.recognized_text(page_no)?;
        if recognized.is_empty() {
            return Ok(text);
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&recognized);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::backend::DocumentBackend;
    use crate::test_utils::FakeBackend;
    use std::cell::Cell;

    struct CountingRecognizer {
        calls: Cell<u32>,
    }

    impl Recognizer for CountingRecognizer {
        fn recognize(&self, image: &RgbImage) -> Result<Vec<String>, RenderError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![format!("scanned {}x{}", image.width(), image.height()), "  ".into()])
        }
    }

    #[test]
    fn ocr_text_is_appended_and_cached() {
        let backend = FakeBackend::new().with_document("/docs/scan.pdf", 2, Size::new(72.0, 144.0));
        backend.set_page_text(Path::new("/docs/scan.pdf"), 0, "Chapter 1");
        let document = backend.open(Path::new("/docs/scan.pdf")).unwrap();

        let source = OcrTextSource::new(
            BackendTextSource::new(document.as_ref()),
            document.as_ref(),
            CountingRecognizer { calls: Cell::new(0) },
        )
        .with_dpi(144.0);

        assert_eq!(source.page_text(0).unwrap(), "Chapter 1\nscanned 144x288");
        assert_eq!(source.page_text(1).unwrap(), "scanned 144x288");
        source.page_text(0).unwrap();
        assert_eq!(source.recognizer.calls.get(), 2);

        source.forget(0);
        source.page_text(0).unwrap();
        assert_eq!(source.recognizer.calls.get(), 3);
    }

    #[test]
    fn recognition_failure_propagates() {
        let backend = FakeBackend::new().with_document("/docs/scan.pdf", 1, Size::new(72.0, 72.0));
        backend.fail_page(0, true);
        let document = backend.open(Path::new("/docs/scan.pdf")).unwrap();
        let source = OcrTextSource::new(
            BackendTextSource::new(document.as_ref()),
            document.as_ref(),
            CountingRecognizer { calls: Cell::new(0) },
        );
        assert!(matches!(source.page_text(0), Err(RenderError::Backend { .. })));
    }
}
