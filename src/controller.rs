//! One viewport onto one document
//!
//! The controller owns the backend handle and a shared [`ViewState`] record.
//! Every mutation validates first, writes the record, and re-arms the render
//! scheduler; rendering itself only happens from [`ViewportController::tick`]
//! (debounced) or [`ViewportController::render_now`].
//!
//! [`ViewState`]: crate::view_state::ViewState

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use crate::backend::{Document, DocumentBackend};
use crate::clock::Clock;
use crate::error::{DocumentOpenError, RenderError, ValidationError};
use crate::geometry::Size;
use crate::renderer::{RenderConfig, RenderInput, RenderOutcome, Surface, ViewportRenderer};
use crate::scheduler::{DEFAULT_DEBOUNCE, RenderScheduler};
use crate::settings::Settings;
use crate::store::SharedViewState;
use crate::transform::{
    ScrollbarSpan, canvas_size, max_scroll, oriented_page_size, scrollbar_proportions,
};
use crate::view_state::{DisplayMode, Favorite, Rotation};
use crate::zoom::{ZoomDirection, ZoomLadder};

pub const DEFAULT_VIEWPORT: Size = Size::new(800.0, 600.0);

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    pub debounce: Duration,
    pub render: RenderConfig,
    pub zoom: ZoomLadder,
    /// Initial viewport size in pixels.
    pub viewport: Size,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            render: RenderConfig::default(),
            zoom: ZoomLadder::default(),
            viewport: DEFAULT_VIEWPORT,
        }
    }
}

impl From<&Settings> for ControllerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            debounce: settings.debounce(),
            render: settings.render_config(),
            zoom: settings.zoom_ladder(),
            viewport: DEFAULT_VIEWPORT,
        }
    }
}

pub struct ViewportController {
    document: Option<Box<dyn Document>>,
    state: SharedViewState,
    scheduler: RenderScheduler,
    renderer: ViewportRenderer,
    ladder: ZoomLadder,
    viewport: Size,
    clock: Rc<dyn Clock>,
}

impl ViewportController {
    pub fn new(state: SharedViewState, config: ControllerConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            document: None,
            state,
            scheduler: RenderScheduler::new(config.debounce),
            renderer: ViewportRenderer::new(config.render),
            ladder: config.zoom,
            viewport: config.viewport,
            clock,
        }
    }

    /// Open the record's document through `backend`.
    ///
    /// On failure the record is flagged missing and the controller stays
    /// empty. On success the stored view is restored (or reset when the
    /// record asks for the default view) and clamped to the real page count.
    pub fn open(&mut self, backend: &dyn DocumentBackend) -> Result<(), DocumentOpenError> {
        self.close();
        let path = self.file_path();

        let document = match backend.open(&path) {
            Ok(document) => document,
            Err(e) => {
                warn!("Could not open {}: {}", path.display(), e.reason);
                self.state.borrow_mut().is_missing = true;
                return Err(e);
            }
        };

        let total = document.page_count();
        {
            let mut state = self.state.borrow_mut();
            state.record_open(Utc::now());
            if state.use_default_state {
                state.reset_view();
            }
            state.clamp_page(total);
        }
        info!("Opened {} ({total} pages)", path.display());

        self.document = Some(document);
        self.clamp_scroll();
        self.request_render();
        Ok(())
    }

    /// Release the document handle. The view state stays in the store.
    pub fn close(&mut self) {
        if let Some(document) = self.document.take() {
            debug!("Closing {}", self.file_path().display());
            document.close();
        }
        self.scheduler.cancel();
        self.renderer.invalidate();
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&dyn Document> {
        self.document.as_deref()
    }

    pub fn state(&self) -> SharedViewState {
        Rc::clone(&self.state)
    }

    pub fn file_path(&self) -> PathBuf {
        self.state.borrow().file_path().to_path_buf()
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn renderer(&self) -> &ViewportRenderer {
        &self.renderer
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn zoom(&self) -> f32 {
        self.state.borrow().zoom()
    }

    pub fn page_no(&self) -> usize {
        self.state.borrow().page_no()
    }

    pub fn rotation(&self) -> Rotation {
        self.state.borrow().rotation()
    }

    pub fn scroll_pos(&self) -> (f32, f32) {
        self.state.borrow().scroll_pos()
    }

    pub fn total_pages(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.page_count())
    }

    /// Intrinsic size of the current page, before rotation.
    pub fn current_page_size(&self) -> Option<Size> {
        let document = self.document.as_ref()?;
        let page_no = self.page_no();
        document
            .page_size(page_no)
            .inspect_err(|e| warn!("No size for page {page_no}: {e}"))
            .ok()
    }

    fn oriented_page_size(&self) -> Option<Size> {
        self.current_page_size()
            .map(|size| oriented_page_size(size, self.rotation()))
    }

    /// Size of the rotated, zoomed page in viewport pixels.
    pub fn canvas_size(&self) -> Option<Size> {
        self.oriented_page_size()
            .map(|size| canvas_size(size, self.zoom()))
    }

    pub fn max_scroll(&self) -> (f32, f32) {
        self.oriented_page_size()
            .map_or((0.0, 0.0), |page| max_scroll(self.viewport, page, self.zoom()))
    }

    pub fn scrollbars(&self) -> Option<(ScrollbarSpan, ScrollbarSpan)> {
        let page = self.oriented_page_size()?;
        Some(scrollbar_proportions(
            self.viewport,
            self.scroll_pos(),
            page,
            self.zoom(),
        ))
    }

    /// "3/12" style label; "0/0" without a document.
    pub fn page_label(&self) -> String {
        match self.total_pages() {
            0 => "0/0".to_string(),
            total => format!("{}/{total}", self.page_no() + 1),
        }
    }

    pub fn can_go_next(&self) -> bool {
        self.page_no() + 1 < self.total_pages()
    }

    pub fn can_go_prev(&self) -> bool {
        self.is_open() && self.page_no() > 0
    }

    fn request_render(&mut self) {
        self.scheduler.request_render(self.clock.now());
    }

    fn require_document(&self) -> Result<usize, ValidationError> {
        match self.total_pages() {
            0 => Err(ValidationError::NoDocument),
            total => Ok(total),
        }
    }

    /// Pull the scroll offset back under the maximum for the current page,
    /// zoom and viewport.
    fn clamp_scroll(&mut self) {
        let (max_x, max_y) = self.max_scroll();
        self.state.borrow_mut().clamp_scroll(max_x, max_y);
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), ValidationError> {
        self.state.borrow_mut().set_zoom(zoom)?;
        self.clamp_scroll();
        self.request_render();
        Ok(())
    }

    pub fn zoom_in(&mut self) -> Result<(), ValidationError> {
        self.set_zoom(self.ladder.step(self.zoom(), ZoomDirection::In))
    }

    pub fn zoom_out(&mut self) -> Result<(), ValidationError> {
        self.set_zoom(self.ladder.step(self.zoom(), ZoomDirection::Out))
    }

    pub fn wheel_zoom(&mut self, direction: ZoomDirection) -> Result<(), ValidationError> {
        self.set_zoom(self.ladder.wheel(self.zoom(), direction))
    }

    /// Scroll to an absolute offset in document units, clamped to the page.
    pub fn scroll_to(&mut self, x: f32, y: f32) -> Result<(), ValidationError> {
        self.state.borrow_mut().set_scroll_pos(x, y)?;
        self.clamp_scroll();
        self.request_render();
        Ok(())
    }

    /// Scroll by a relative amount, saturating at both ends.
    pub fn scroll_by(&mut self, dx: f32, dy: f32) -> Result<(), ValidationError> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(ValidationError::ScrollNegative { x: dx, y: dy });
        }
        let (x, y) = self.scroll_pos();
        let (max_x, max_y) = self.max_scroll();
        self.scroll_to((x + dx).clamp(0.0, max_x), (y + dy).clamp(0.0, max_y))
    }

    /// Show `page_no` from its top edge, keeping the horizontal offset.
    pub fn set_page(&mut self, page_no: usize) -> Result<(), ValidationError> {
        let total = self.require_document()?;
        {
            let mut state = self.state.borrow_mut();
            state.set_page_no(page_no, total)?;
            let (x, _) = state.scroll_pos();
            state.set_scroll_pos(x, 0.0)?;
        }
        self.clamp_scroll();
        self.request_render();
        Ok(())
    }

    /// Returns `false` on the last page.
    pub fn next_page(&mut self) -> Result<bool, ValidationError> {
        if !self.can_go_next() {
            return Ok(false);
        }
        self.set_page(self.page_no() + 1)?;
        Ok(true)
    }

    /// Returns `false` on the first page.
    pub fn prev_page(&mut self) -> Result<bool, ValidationError> {
        if !self.can_go_prev() {
            return Ok(false);
        }
        self.set_page(self.page_no() - 1)?;
        Ok(true)
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.state.borrow_mut().set_rotation(rotation);
        self.clamp_scroll();
        self.request_render();
    }

    pub fn set_rotation_degrees(&mut self, degrees: i64) -> Result<(), ValidationError> {
        self.set_rotation(Rotation::try_from(degrees)?);
        Ok(())
    }

    pub fn rotate_clockwise(&mut self) {
        self.set_rotation(self.rotation().clockwise());
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.state.borrow_mut().display_mode = mode;
        self.request_render();
    }

    /// The viewport was resized by the window system.
    pub fn resize(&mut self, viewport: Size) {
        if viewport == self.viewport {
            return;
        }
        debug!("Viewport resized to {}x{}", viewport.width, viewport.height);
        self.viewport = viewport;
        self.clamp_scroll();
        self.request_render();
    }

    /// Bookmark `page_no`, which must exist in the open document.
    pub fn add_favorite(&mut self, page_no: usize, name: impl Into<String>) -> Result<(), ValidationError> {
        let total = self.require_document()?;
        if page_no >= total {
            return Err(ValidationError::PageOutOfRange {
                page: page_no,
                total,
            });
        }
        self.state
            .borrow_mut()
            .add_favorite(Favorite::new(page_no, name));
        Ok(())
    }

    pub fn remove_favorite(&mut self, index: usize) -> Result<Favorite, ValidationError> {
        self.state.borrow_mut().remove_favorite(index)
    }

    pub fn rename_favorite(&mut self, index: usize, name: impl Into<String>) -> Result<(), ValidationError> {
        self.state.borrow_mut().rename_favorite(index, name)
    }

    /// Jump to a favorite's page.
    pub fn go_to_favorite(&mut self, index: usize) -> Result<(), ValidationError> {
        let page_no = {
            let state = self.state.borrow();
            let len = state.favorites.len();
            state
                .favorites
                .get(index)
                .ok_or(ValidationError::FavoriteOutOfRange { index, len })?
                .page_no
        };
        self.set_page(page_no)
    }

    /// Run the debounced render pass if its deadline has passed.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Option<Result<RenderOutcome, RenderError>> {
        if !self.scheduler.begin_render(self.clock.now()) {
            return None;
        }
        let result = self.render_pass(surface);
        self.scheduler.finish_render(self.clock.now());
        Some(result)
    }

    /// Force a full re-rasterization on the next pass, e.g. after the surface
    /// was shared with another tab.
    pub fn redraw(&mut self) {
        self.renderer.invalidate();
        if self.is_open() {
            self.request_render();
        }
    }

    /// When the next debounced pass is due, if one is armed.
    pub fn next_deadline(&self) -> Option<std::time::Instant> {
        self.scheduler.next_deadline()
    }

    /// Render immediately, superseding any pending debounced pass.
    pub fn render_now(&mut self, surface: &mut dyn Surface) -> Result<RenderOutcome, RenderError> {
        self.scheduler.cancel();
        self.render_pass(surface)
    }

    fn render_pass(&mut self, surface: &mut dyn Surface) -> Result<RenderOutcome, RenderError> {
        let document = self.document.as_deref().ok_or(RenderError::NoDocument)?;
        let input = {
            let state = self.state.borrow();
            RenderInput {
                page_no: state.page_no(),
                zoom: state.zoom(),
                rotation: state.rotation(),
                scroll: state.scroll_pos(),
                viewport: self.viewport,
            }
        };
        self.renderer.render(document, &input, surface)
    }
}

impl Drop for ViewportController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::PersistentStateStore;
    use crate::test_utils::{FakeBackend, RecordingSurface};
    use std::path::Path;

    fn setup(pages: usize) -> (ViewportController, ManualClock, FakeBackend) {
        let clock = ManualClock::default();
        let backend = FakeBackend::new().with_document("/docs/a.pdf", pages, Size::new(600.0, 800.0));
        let mut store = PersistentStateStore::ephemeral();
        let state = store.find_or_create(Path::new("/docs/a.pdf"));
        let mut controller =
            ViewportController::new(state, ControllerConfig::default(), Rc::new(clock.clone()));
        controller.open(&backend).unwrap();
        (controller, clock, backend)
    }

    #[test]
    fn page_bounds_are_enforced() {
        let (mut c, _, _) = setup(5);
        c.set_zoom(2.0).unwrap();
        c.set_page(4).unwrap();
        assert_eq!(
            c.set_page(5),
            Err(ValidationError::PageOutOfRange { page: 5, total: 5 })
        );
        assert_eq!(c.page_no(), 4);
        assert_eq!(c.page_label(), "5/5");
        assert!(!c.can_go_next());
        assert!(!c.next_page().unwrap());
        assert!(c.prev_page().unwrap());
        assert_eq!(c.page_no(), 3);
    }

    #[test]
    fn scroll_is_clamped_to_page() {
        let (mut c, _, _) = setup(1);
        // 600x800 page in an 800x600 viewport at zoom 1: only vertical room.
        c.scroll_to(500.0, 900.0).unwrap();
        assert_eq!(c.scroll_pos(), (0.0, 200.0));
        c.scroll_by(0.0, -50.0).unwrap();
        assert_eq!(c.scroll_pos(), (0.0, 150.0));
        assert!(c.scroll_to(-1.0, 0.0).is_err());
        assert_eq!(c.scroll_pos(), (0.0, 150.0));

        c.set_zoom(0.5).unwrap();
        assert_eq!(c.scroll_pos(), (0.0, 0.0));
    }

    #[test]
    fn rotation_swaps_canvas_axes() {
        let (mut c, _, _) = setup(1);
        c.set_zoom(2.0).unwrap();
        assert_eq!(c.canvas_size(), Some(Size::new(1200.0, 1600.0)));
        c.set_rotation_degrees(90).unwrap();
        assert_eq!(c.canvas_size(), Some(Size::new(1600.0, 1200.0)));
        assert_eq!(c.set_rotation_degrees(45), Err(ValidationError::Rotation(45)));
        assert_eq!(c.rotation(), Rotation::Deg90);
    }

    #[test]
    fn rotate_clockwise_cycles_and_reclamps_scroll() {
        let (mut c, _, _) = setup(1);
        c.scroll_to(0.0, 200.0).unwrap();

        // Turned sideways the 800x600 page fits the viewport exactly.
        c.rotate_clockwise();
        assert_eq!(c.rotation(), Rotation::Deg90);
        assert_eq!(c.scroll_pos(), (0.0, 0.0));

        for expected in [Rotation::Deg180, Rotation::Deg270, Rotation::Deg0] {
            c.rotate_clockwise();
            assert_eq!(c.rotation(), expected);
        }
    }

    #[test]
    fn mutations_are_debounced_into_one_render() {
        let (mut c, clock, backend) = setup(3);
        let mut surface = RecordingSurface::default();
        for i in 0..10 {
            c.scroll_to(0.0, i as f32 * 10.0).unwrap();
            clock.advance_ms(1);
            assert!(c.tick(&mut surface).is_none());
        }
        clock.advance_ms(5);
        assert!(matches!(c.tick(&mut surface), Some(Ok(RenderOutcome::Rendered(_)))));
        assert!(c.tick(&mut surface).is_none());
        assert_eq!(backend.rasterize_calls().len(), 1);
        assert_eq!(surface.frames.len(), 1);
    }

    #[test]
    fn zoom_ladder_steps() {
        let (mut c, _, _) = setup(1);
        c.zoom_in().unwrap();
        assert_eq!(c.zoom(), 1.25);
        c.zoom_out().unwrap();
        c.zoom_out().unwrap();
        assert_eq!(c.zoom(), 0.75);
    }

    #[test]
    fn favorites_are_validated_against_page_count() {
        let (mut c, _, _) = setup(3);
        c.add_favorite(2, "end").unwrap();
        assert!(c.add_favorite(3, "past end").is_err());
        c.go_to_favorite(0).unwrap();
        assert_eq!(c.page_no(), 2);
        assert_eq!(c.state().borrow().favorites.len(), 1);
    }

    #[test]
    fn close_keeps_state_and_drops_handle() {
        let (mut c, _, _) = setup(3);
        c.set_page(2).unwrap();
        c.close();
        assert!(!c.is_open());
        assert_eq!(c.total_pages(), 0);
        assert_eq!(c.page_label(), "0/0");
        assert_eq!(c.state().borrow().page_no(), 2);
        assert_eq!(c.set_page(0), Err(ValidationError::NoDocument));

        let mut surface = RecordingSurface::default();
        assert_eq!(c.render_now(&mut surface), Err(RenderError::NoDocument));
    }
}
