//! MuPDF-backed document handles

use std::path::Path;

use log::debug;
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Device, IRect, Matrix, Pixmap, TextPageFlags};

use super::{Document, DocumentBackend, RasterRequest, RawRaster};
use crate::error::{DocumentOpenError, RenderError};
use crate::geometry::{Rect, Size};

/// Upper bound on one raster, in pixels. Clips are viewport-sized, so only a
/// broken request gets near it.
const MAX_RASTER_PIXELS: u64 = 64 * 1024 * 1024;

/// Opens PDF (and other MuPDF-supported) files.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfBackend;

impl DocumentBackend for MupdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Document>, DocumentOpenError> {
        let doc = mupdf::Document::open(path.to_string_lossy().as_ref())
            .map_err(|e| DocumentOpenError::new(path, e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| DocumentOpenError::new(path, e.to_string()))?;
        if page_count <= 0 {
            return Err(DocumentOpenError::new(path, "document has no pages"));
        }
        debug!("Opened {path:?} with {page_count} pages");
        Ok(Box::new(MupdfDocument {
            doc,
            page_count: page_count as usize,
        }))
    }
}

struct MupdfDocument {
    doc: mupdf::Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load_page(&self, page_no: usize) -> Result<mupdf::Page, RenderError> {
        if page_no >= self.page_count {
            return Err(RenderError::backend(page_no, "page index out of range"));
        }
        self.doc
            .load_page(page_no as i32)
            .map_err(|e| RenderError::backend(page_no, e.to_string()))
    }
}

impl Document for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page_no: usize) -> Result<Size, RenderError> {
        let page = self.load_page(page_no)?;
        let b = page
            .bounds()
            .map_err(|e| RenderError::backend(page_no, e.to_string()))?;
        Ok(Size::new(b.x1 - b.x0, b.y1 - b.y0))
    }

    fn rasterize(&self, request: &RasterRequest) -> Result<RawRaster, RenderError> {
        let page_no = request.page_no;
        let backend_err = |e: mupdf::Error| RenderError::backend(page_no, e.to_string());

        let (width, height) = request.pixel_size();
        if u64::from(width) * u64::from(height) > MAX_RASTER_PIXELS {
            return Err(RenderError::backend(
                page_no,
                format!("clip of {width}x{height} px exceeds the raster limit"),
            ));
        }

        let page = self.load_page(page_no)?;
        let bounds = page.bounds().map_err(backend_err)?;
        let bounds = Rect::new(bounds.x0, bounds.y0, bounds.x1, bounds.y1);
        let [a, b, c, d, e, f] = request.device_transform(bounds);
        let matrix = Matrix::new(a, b, c, d, e, f);

        let mut pixmap = Pixmap::new_with_rect(
            &Colorspace::device_rgb(),
            IRect::new(0, 0, width as i32, height as i32),
            false,
        )
        .map_err(backend_err)?;
        pixmap.clear_with(255).map_err(backend_err)?;
        {
            let device = Device::from_pixmap(&pixmap).map_err(backend_err)?;
            page.run(&device, &matrix).map_err(backend_err)?;
        }
        debug!("Rasterized page {page_no} clip at {width}x{height} px");
        raster_from_pixmap(&pixmap, page_no)
    }

    fn page_text(&self, page_no: usize) -> Result<String, RenderError> {
        let page = self.load_page(page_no)?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| RenderError::backend(page_no, e.to_string()))?;

        let mut text = String::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                for ch in line.chars() {
                    if let Some(c) = ch.char() {
                        text.push(c);
                    }
                }
                text.push('\n');
            }
        }
        Ok(text.trim().to_string())
    }
}

/// Copy the pixmap's samples into tightly packed RGB rows.
fn raster_from_pixmap(pixmap: &Pixmap, page_no: usize) -> Result<RawRaster, RenderError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderError::backend(
            page_no,
            format!("unsupported pixmap format: {n} channels"),
        ));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    if samples.len() < stride.saturating_mul(height) || width * n > stride {
        return Err(RenderError::backend(page_no, "pixmap buffer size mismatch"));
    }

    let mut pixels = Vec::with_capacity(width * height * 3);
    for row in samples.chunks(stride).take(height) {
        let row = &row[..width * n];
        if n == 3 {
            pixels.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                pixels.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(RawRaster {
        width: width as u32,
        height: height as u32,
        pixels,
    })
}
