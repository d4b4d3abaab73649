//! Error kinds surfaced by the viewer core
//!
//! Each kind is recovered at its component boundary: validation and render
//! failures leave the previous state in place, persistence failures fall back
//! to defaults. None of them is fatal to the event loop.

use std::path::PathBuf;

/// A rejected view-state mutation. The prior value is always retained.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("zoom must be a finite value greater than zero, got {0}")]
    Zoom(f32),

    #[error("rotation must be one of 0, 90, 180 or 270 degrees, got {0}")]
    Rotation(i64),

    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("scroll position must be non-negative, got ({x}, {y})")]
    ScrollNegative { x: f32, y: f32 },

    #[error("unknown display mode `{0}`")]
    DisplayMode(String),

    #[error("favorite index {index} is out of range ({len} favorites)")]
    FavoriteOutOfRange { index: usize, len: usize },

    #[error("no document is open")]
    NoDocument,
}

/// The document backend failed to open a file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to open {}: {reason}", path.display())]
pub struct DocumentOpenError {
    pub path: PathBuf,
    pub reason: String,
}

impl DocumentOpenError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Rasterization failed mid-session. The previous raster stays on screen.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("no document is open")]
    NoDocument,

    #[error("backend failed to rasterize page {page}: {reason}")]
    Backend { page: usize, reason: String },

    #[error("raster buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    InvalidRaster {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl RenderError {
    pub fn backend(page: usize, reason: impl Into<String>) -> Self {
        Self::Backend {
            page,
            reason: reason.into(),
        }
    }
}

/// The persisted state blob could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("state blob root must be an object")]
    NotAnObject,
}

/// Umbrella error for callers that drive the whole viewer.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Open(#[from] DocumentOpenError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("no tab with id {0}")]
    NoSuchTab(usize),
}

impl ViewerError {
    /// Single-line message suitable for a notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => format!("Invalid view change: {e}"),
            Self::Open(e) => format!("Could not open document: {e}"),
            Self::Render(e) => format!("Could not render page: {e}"),
            Self::Persistence(e) => format!("Could not save viewer state: {e}"),
            Self::NoSuchTab(id) => format!("Tab {id} is not open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_name_the_bad_value() {
        let err = ValidationError::PageOutOfRange { page: 5, total: 5 };
        assert_eq!(
            err.to_string(),
            "page 5 is out of range (document has 5 pages)"
        );
        assert!(ValidationError::Zoom(-1.0).to_string().contains("-1"));
    }

    #[test]
    fn umbrella_wraps_each_kind() {
        let err: ViewerError = RenderError::backend(3, "corrupt stream").into();
        assert!(matches!(err, ViewerError::Render(_)));
        assert_eq!(
            err.user_message(),
            "Could not render page: backend failed to rasterize page 3: corrupt stream"
        );

        let err: ViewerError = DocumentOpenError::new("/tmp/a.pdf", "not a pdf").into();
        assert!(err.user_message().starts_with("Could not open document"));
    }
}
