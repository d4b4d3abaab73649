//! In-memory backend and surface for exercising the viewer without a real
//! document library.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::{Document, DocumentBackend, RasterRequest, RawRaster};
use crate::error::{DocumentOpenError, RenderError};
use crate::geometry::{Point, Size};
use crate::renderer::{RasterFrame, Surface};
use crate::transform::ScrollbarSpan;

#[derive(Clone, Debug)]
struct FakeFile {
    page_sizes: Vec<Size>,
    text: HashMap<usize, String>,
}

#[derive(Debug, Default)]
struct Shared {
    rasterize_calls: RefCell<Vec<RasterRequest>>,
    failing_pages: RefCell<HashSet<usize>>,
    /// Pixel buffers are returned one byte short when set.
    truncate_rasters: Cell<bool>,
    opens: Cell<usize>,
    closes: Cell<usize>,
}

/// Backend serving synthetic documents registered by path.
///
/// Clones share their call log, so a test can keep one clone for assertions
/// after handing the other to a controller or tab manager.
#[derive(Clone, Debug, Default)]
pub struct FakeBackend {
    documents: Rc<RefCell<HashMap<PathBuf, FakeFile>>>,
    shared: Rc<Shared>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document of `pages` identical pages.
    pub fn with_document(self, path: impl Into<PathBuf>, pages: usize, page_size: Size) -> Self {
        self.add_document(path, vec![page_size; pages]);
        self
    }

    pub fn add_document(&self, path: impl Into<PathBuf>, page_sizes: Vec<Size>) {
        self.documents.borrow_mut().insert(
            path.into(),
            FakeFile {
                page_sizes,
                text: HashMap::new(),
            },
        );
    }

    pub fn remove_document(&self, path: &Path) {
        self.documents.borrow_mut().remove(path);
    }

    pub fn set_page_text(&self, path: &Path, page_no: usize, text: impl Into<String>) {
        if let Some(file) = self.documents.borrow_mut().get_mut(path) {
            file.text.insert(page_no, text.into());
        }
    }

    /// Make rasterization of `page_no` fail (in every document).
    pub fn fail_page(&self, page_no: usize, failing: bool) {
        let mut pages = self.shared.failing_pages.borrow_mut();
        if failing {
            pages.insert(page_no);
        } else {
            pages.remove(&page_no);
        }
    }

    pub fn truncate_rasters(&self, truncate: bool) {
        self.shared.truncate_rasters.set(truncate);
    }

    pub fn rasterize_calls(&self) -> Vec<RasterRequest> {
        self.shared.rasterize_calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.shared.rasterize_calls.borrow_mut().clear();
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.get()
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.get()
    }

    /// Handles opened and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.opens() - self.closes()
    }
}

impl DocumentBackend for FakeBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Document>, DocumentOpenError> {
        let file = self
            .documents
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| DocumentOpenError::new(path, "no such file"))?;
        self.shared.opens.set(self.shared.opens.get() + 1);
        Ok(Box::new(FakeDocument {
            file,
            shared: Rc::clone(&self.shared),
        }))
    }
}

pub struct FakeDocument {
    file: FakeFile,
    shared: Rc<Shared>,
}

impl Document for FakeDocument {
    fn page_count(&self) -> usize {
        self.file.page_sizes.len()
    }

    fn page_size(&self, page_no: usize) -> Result<Size, RenderError> {
        self.file
            .page_sizes
            .get(page_no)
            .copied()
            .ok_or_else(|| RenderError::backend(page_no, "page out of range"))
    }

    fn rasterize(&self, request: &RasterRequest) -> Result<RawRaster, RenderError> {
        self.shared.rasterize_calls.borrow_mut().push(*request);
        if self.shared.failing_pages.borrow().contains(&request.page_no) {
            return Err(RenderError::backend(request.page_no, "simulated failure"));
        }

        let (width, height) = request.pixel_size();
        let shade = (request.page_no % 256) as u8;
        let mut pixels = vec![shade; width as usize * height as usize * 3];
        if self.shared.truncate_rasters.get() {
            pixels.pop();
        }
        Ok(RawRaster {
            width,
            height,
            pixels,
        })
    }

    fn page_text(&self, page_no: usize) -> Result<String, RenderError> {
        Ok(self.file.text.get(&page_no).cloned().unwrap_or_default())
    }

    fn close(self: Box<Self>) {
        self.shared.closes.set(self.shared.closes.get() + 1);
    }
}

/// Surface that records everything drawn on it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub frames: Vec<RasterFrame>,
    pub repositions: Vec<Point>,
    pub scrollbars: Option<(ScrollbarSpan, ScrollbarSpan)>,
}

impl RecordingSurface {
    pub fn last_frame(&self) -> Option<&RasterFrame> {
        self.frames.last()
    }
}

impl Surface for RecordingSurface {
    fn draw_raster(&mut self, frame: RasterFrame) {
        self.frames.push(frame);
    }

    fn reposition(&mut self, position: Point) {
        self.repositions.push(position);
    }

    fn set_scrollbars(&mut self, horizontal: ScrollbarSpan, vertical: ScrollbarSpan) {
        self.scrollbars = Some((horizontal, vertical));
    }
}
