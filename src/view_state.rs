//! Persisted per-document view configuration
//!
//! A [`ViewState`] is keyed by the absolute path of its document. The
//! validated fields (`page_no`, `zoom`, `scroll_pos`) are private and only
//! change through setters that reject bad values without touching the
//! current one. Auxiliary fields that never feed the renderer are public.
//!
//! Serialization goes through one adapter: `Serialize` writes the flat record
//! stored under `file_states`, and [`ViewState::from_value`] reads it back
//! leniently, falling back to defaults field by field.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::store::normalize_path;

pub const DEFAULT_ZOOM: f32 = 1.0;
pub const DEFAULT_SIDEBAR_DX: u32 = 572;

/// Page rotation in quarter turns, persisted as degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];

    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// True for 90 and 270, where page width and height swap.
    #[must_use]
    pub const fn is_quarter_turn(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Next rotation clockwise.
    #[must_use]
    pub const fn clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }
}

impl TryFrom<i64> for Rotation {
    type Error = ValidationError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(ValidationError::Rotation(other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Page layout of the document surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[serde(alias = "single page")]
    SinglePage,
    #[default]
    Continuous,
    Facing,
    #[serde(alias = "book view")]
    BookView,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::SinglePage => "single_page",
            DisplayMode::Continuous => "continuous",
            DisplayMode::Facing => "facing",
            DisplayMode::BookView => "book_view",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "single_page" => Ok(Self::SinglePage),
            "continuous" => Ok(Self::Continuous),
            "facing" => Ok(Self::Facing),
            "book_view" => Ok(Self::BookView),
            _ => Err(ValidationError::DisplayMode(s.to_string())),
        }
    }
}

/// Main window state, persisted as 0/1/2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum WindowState {
    #[default]
    Normal,
    Maximized,
    Minimized,
}

impl TryFrom<i64> for WindowState {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Maximized),
            2 => Ok(Self::Minimized),
            other => Err(format!("unknown window state {other}")),
        }
    }
}

impl From<WindowState> for u8 {
    fn from(state: WindowState) -> Self {
        match state {
            WindowState::Normal => 0,
            WindowState::Maximized => 1,
            WindowState::Minimized => 2,
        }
    }
}

/// A named bookmark on one page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub page_no: usize,
    #[serde(default)]
    pub name: String,
}

impl Favorite {
    pub fn new(page_no: usize, name: impl Into<String>) -> Self {
        Self {
            page_no,
            name: name.into(),
        }
    }
}

/// The persisted view configuration of one document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewState {
    file_path: PathBuf,
    pub favorites: Vec<Favorite>,
    pub is_pinned: bool,
    pub is_missing: bool,
    open_count: u32,
    pub use_default_state: bool,
    pub display_mode: DisplayMode,
    scroll_pos: [f32; 2],
    page_no: usize,
    zoom: f32,
    rotation: Rotation,
    pub window_state: WindowState,
    /// Window geometry as x, y, width, height in screen pixels.
    pub window_pos: [i32; 4],
    pub show_toc: bool,
    pub sidebar_dx: u32,
    pub display_r2l: bool,
    pub reparse_idx: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_opened: Option<DateTime<Utc>>,
}

impl ViewState {
    /// Fresh record with default view settings.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            favorites: Vec::new(),
            is_pinned: false,
            is_missing: false,
            open_count: 0,
            use_default_state: false,
            display_mode: DisplayMode::default(),
            scroll_pos: [0.0, 0.0],
            page_no: 0,
            zoom: DEFAULT_ZOOM,
            rotation: Rotation::default(),
            window_state: WindowState::default(),
            window_pos: [0, 0, 0, 0],
            show_toc: false,
            sidebar_dx: DEFAULT_SIDEBAR_DX,
            display_r2l: false,
            reparse_idx: 0,
            last_opened: None,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn page_no(&self) -> usize {
        self.page_no
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Scroll offset into the scaled page, in document-space units.
    pub fn scroll_pos(&self) -> (f32, f32) {
        (self.scroll_pos[0], self.scroll_pos[1])
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn last_opened(&self) -> Option<DateTime<Utc>> {
        self.last_opened
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), ValidationError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(ValidationError::Zoom(zoom));
        }
        self.zoom = zoom;
        Ok(())
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Set rotation from raw degrees, rejecting anything but 0/90/180/270.
    pub fn set_rotation_degrees(&mut self, degrees: i64) -> Result<(), ValidationError> {
        self.rotation = Rotation::try_from(degrees)?;
        Ok(())
    }

    pub fn set_page_no(&mut self, page_no: usize, total_pages: usize) -> Result<(), ValidationError> {
        if page_no >= total_pages {
            return Err(ValidationError::PageOutOfRange {
                page: page_no,
                total: total_pages,
            });
        }
        self.page_no = page_no;
        Ok(())
    }

    pub fn set_scroll_pos(&mut self, x: f32, y: f32) -> Result<(), ValidationError> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return Err(ValidationError::ScrollNegative { x, y });
        }
        self.scroll_pos = [x, y];
        Ok(())
    }

    /// Count a successful open.
    pub fn record_open(&mut self, at: DateTime<Utc>) {
        self.open_count = self.open_count.saturating_add(1);
        self.last_opened = Some(at);
        self.is_missing = false;
    }

    /// Drop the personalised view back to defaults, keeping identity,
    /// counters, favorites and window geometry.
    pub fn reset_view(&mut self) {
        self.page_no = 0;
        self.zoom = DEFAULT_ZOOM;
        self.rotation = Rotation::default();
        self.scroll_pos = [0.0, 0.0];
        self.display_mode = DisplayMode::default();
    }

    /// Pull a restored page index back into range once the real page count
    /// is known. Stored records can't be validated until the document opens.
    pub fn clamp_page(&mut self, total_pages: usize) {
        if total_pages == 0 {
            self.page_no = 0;
        } else if self.page_no >= total_pages {
            warn!(
                "Stored page {} exceeds page count {} for {:?}, clamping",
                self.page_no, total_pages, self.file_path
            );
            self.page_no = total_pages - 1;
        }
    }

    /// Pull the scroll offset under `(max_x, max_y)`, flooring the limits at 0.
    pub fn clamp_scroll(&mut self, max_x: f32, max_y: f32) {
        let [x, y] = self.scroll_pos;
        self.scroll_pos = [x.min(max_x.max(0.0)), y.min(max_y.max(0.0))];
    }

    pub fn add_favorite(&mut self, favorite: Favorite) {
        self.favorites.push(favorite);
    }

    pub fn remove_favorite(&mut self, index: usize) -> Result<Favorite, ValidationError> {
        if index >= self.favorites.len() {
            return Err(ValidationError::FavoriteOutOfRange {
                index,
                len: self.favorites.len(),
            });
        }
        Ok(self.favorites.remove(index))
    }

    pub fn rename_favorite(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let len = self.favorites.len();
        let favorite = self
            .favorites
            .get_mut(index)
            .ok_or(ValidationError::FavoriteOutOfRange { index, len })?;
        favorite.name = name.into();
        Ok(())
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            // Only non-string map keys can fail here, and the record has none.
            warn!("Failed to serialize view state for {:?}: {e}", self.file_path);
            Value::Null
        })
    }

    /// Read a record written by [`ViewState::to_value`].
    ///
    /// Only `file_path` is mandatory; it is keyed in absolute form. Every other
    /// key that is missing, has the wrong type, or fails validation falls back
    /// to its default.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let file_path = obj.get("file_path")?.as_str()?;
        if file_path.is_empty() {
            return None;
        }

        let mut state = Self::new(normalize_path(Path::new(file_path)));
        let reader = FieldReader {
            obj,
            path: file_path,
        };

        state.is_pinned = reader.bool("is_pinned").unwrap_or(false);
        state.is_missing = reader.bool("is_missing").unwrap_or(false);
        state.use_default_state = reader.bool("use_default_state").unwrap_or(false);
        state.show_toc = reader.bool("show_toc").unwrap_or(false);
        state.display_r2l = reader.bool("display_r2l").unwrap_or(false);
        state.open_count = reader.u32("open_count").unwrap_or(0);
        state.reparse_idx = reader.u32("reparse_idx").unwrap_or(0);
        state.sidebar_dx = reader.u32("sidebar_dx").unwrap_or(DEFAULT_SIDEBAR_DX);
        state.page_no = reader.u64("page_no").map_or(0, |p| p as usize);

        if let Some(mode) = reader.str("display_mode") {
            match mode.parse() {
                Ok(mode) => state.display_mode = mode,
                Err(e) => reader.invalid("display_mode", &e),
            }
        }

        if let Some(zoom) = reader.f32("zoom") {
            if let Err(e) = state.set_zoom(zoom) {
                reader.invalid("zoom", &e);
            }
        }

        if let Some(degrees) = reader.i64("rotation") {
            if let Err(e) = state.set_rotation_degrees(degrees) {
                reader.invalid("rotation", &e);
            }
        }

        if let Some(code) = reader.i64("window_state") {
            match WindowState::try_from(code) {
                Ok(ws) => state.window_state = ws,
                Err(e) => reader.invalid("window_state", &e),
            }
        }

        if let Some([x, y]) = reader.f32_array::<2>("scroll_pos") {
            if let Err(e) = state.set_scroll_pos(x, y) {
                reader.invalid("scroll_pos", &e);
            }
        }

        if let Some(pos) = reader.i32_array::<4>("window_pos") {
            state.window_pos = pos;
        }

        if let Some(favorites) = obj.get("favorites").and_then(Value::as_array) {
            state.favorites = favorites
                .iter()
                .filter_map(|fav| match serde_json::from_value::<Favorite>(fav.clone()) {
                    Ok(fav) => Some(fav),
                    Err(e) => {
                        reader.invalid("favorites", &e);
                        None
                    }
                })
                .collect();
        }

        if let Some(ts) = reader.str("last_opened") {
            match DateTime::parse_from_rfc3339(ts) {
                Ok(ts) => state.last_opened = Some(ts.with_timezone(&Utc)),
                Err(e) => reader.invalid("last_opened", &e),
            }
        }

        Some(state)
    }
}

struct FieldReader<'a> {
    obj: &'a serde_json::Map<String, Value>,
    path: &'a str,
}

impl FieldReader<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.obj.get(key).filter(|v| !v.is_null())
    }

    fn typed<T>(&self, key: &str, expected: &str, f: impl Fn(&Value) -> Option<T>) -> Option<T> {
        let value = self.get(key)?;
        let parsed = f(value);
        if parsed.is_none() {
            warn!(
                "Ignoring `{key}` in state of {}: expected {expected}, got {value}",
                self.path
            );
        }
        parsed
    }

    fn invalid(&self, key: &str, err: &dyn fmt::Display) {
        warn!("Ignoring `{key}` in state of {}: {err}", self.path);
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.typed(key, "a boolean", Value::as_bool)
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.typed(key, "a non-negative integer", Value::as_u64)
    }

    fn u32(&self, key: &str) -> Option<u32> {
        self.typed(key, "a non-negative integer", |v| {
            v.as_u64().and_then(|n| u32::try_from(n).ok())
        })
    }

    fn i64(&self, key: &str) -> Option<i64> {
        self.typed(key, "an integer", Value::as_i64)
    }

    fn f32(&self, key: &str) -> Option<f32> {
        self.typed(key, "a number", |v| v.as_f64().map(|n| n as f32))
    }

    fn str(&self, key: &str) -> Option<&'_ str> {
        let value = self.get(key)?;
        if value.as_str().is_none() {
            warn!(
                "Ignoring `{key}` in state of {}: expected a string, got {value}",
                self.path
            );
        }
        value.as_str()
    }

    fn i32_array<const N: usize>(&self, key: &str) -> Option<[i32; N]> {
        self.typed(key, "an array of 32-bit integers", |v| {
            let items = v.as_array()?;
            if items.len() != N {
                return None;
            }
            let mut out = [0; N];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = i32::try_from(item.as_i64()?).ok()?;
            }
            Some(out)
        })
    }

    fn f32_array<const N: usize>(&self, key: &str) -> Option<[f32; N]> {
        self.typed(key, "an array of numbers", |v| {
            let items = v.as_array()?;
            if items.len() != N {
                return None;
            }
            let mut out = [0.0; N];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item.as_f64()? as f32;
            }
            Some(out)
        })
    }
}
