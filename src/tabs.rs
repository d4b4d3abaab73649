use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::backend::DocumentBackend;
use crate::clock::Clock;
use crate::controller::{ControllerConfig, ViewportController};
use crate::error::{PersistenceError, RenderError, ViewerError};
use crate::notification::NotificationManager;
use crate::renderer::{RenderOutcome, Surface};
use crate::settings::Settings;
use crate::store::PersistentStateStore;

/// One open document, or an empty placeholder after a failed open.
pub struct Tab {
    pub id: usize,
    controller: Option<ViewportController>,
}

impl Tab {
    fn placeholder(id: usize) -> Self {
        Self {
            id,
            controller: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.controller.is_none()
    }

    pub fn controller(&self) -> Option<&ViewportController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut ViewportController> {
        self.controller.as_mut()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.controller.as_ref().map(ViewportController::file_path)
    }

    pub fn file_name(&self) -> String {
        self.path()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Unknown".to_string())
            })
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TabManagerConfig {
    pub controller: ControllerConfig,
    pub autosave_interval: Duration,
    pub notification_duration: Duration,
}

impl Default for TabManagerConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            autosave_interval: Duration::from_millis(500),
            notification_duration: Duration::from_secs(4),
        }
    }
}

impl From<&Settings> for TabManagerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            controller: ControllerConfig::from(settings),
            autosave_interval: settings.autosave_interval(),
            notification_duration: settings.notification_duration(),
        }
    }
}

/// The tabs of one viewer window, the state store they share, and the
/// autosave cadence.
pub struct TabManager {
    backend: Box<dyn DocumentBackend>,
    store: PersistentStateStore,
    tabs: Vec<Tab>,
    active_tab_id: Option<usize>,
    next_tab_id: usize,
    notifications: NotificationManager,
    config: TabManagerConfig,
    clock: Rc<dyn Clock>,
    last_autosave: Instant,
}

impl TabManager {
    pub fn new(
        backend: Box<dyn DocumentBackend>,
        store: PersistentStateStore,
        config: TabManagerConfig,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let last_autosave = clock.now();
        Self {
            backend,
            store,
            tabs: Vec::new(),
            active_tab_id: None,
            next_tab_id: 1,
            notifications: NotificationManager::with_default_duration(config.notification_duration),
            config,
            clock,
            last_autosave,
        }
    }

    pub fn store(&self) -> &PersistentStateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PersistentStateStore {
        &mut self.store
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    /// Open `path` in a new tab and make it current.
    ///
    /// The tab is created even when the document cannot be opened: it is
    /// then an empty placeholder and the failure is posted as a notification.
    pub fn create_tab(&mut self, path: &Path) -> usize {
        let id = self.next_tab_id;
        self.next_tab_id += 1;

        let state = self.store.find_or_create(path);
        let mut controller =
            ViewportController::new(state, self.config.controller.clone(), Rc::clone(&self.clock));
        let tab = match controller.open(self.backend.as_ref()) {
            Ok(()) => Tab {
                id,
                controller: Some(controller),
            },
            Err(e) => {
                let message = ViewerError::from(e).user_message();
                self.notifications.error(message, self.clock.now());
                Tab::placeholder(id)
            }
        };

        debug!("Created tab {id} for {}", path.display());
        self.tabs.push(tab);
        self.active_tab_id = Some(id);
        id
    }

    pub fn close_tab(&mut self, tab_id: usize) -> Result<(), ViewerError> {
        let index = self
            .tabs
            .iter()
            .position(|t| t.id == tab_id)
            .ok_or(ViewerError::NoSuchTab(tab_id))?;

        let mut tab = self.tabs.remove(index);
        if let Some(controller) = tab.controller.as_mut() {
            controller.close();
        }
        info!("Closed tab {tab_id} ({})", tab.file_name());

        if self.active_tab_id == Some(tab_id) {
            self.active_tab_id = if self.tabs.is_empty() {
                None
            } else if index < self.tabs.len() {
                Some(self.tabs[index].id)
            } else {
                Some(self.tabs[self.tabs.len() - 1].id)
            };
            self.redraw_current();
        }
        Ok(())
    }

    pub fn get_current_tab(&self) -> Option<&Tab> {
        self.active_tab_id
            .and_then(|id| self.tabs.iter().find(|t| t.id == id))
    }

    pub fn get_current_tab_mut(&mut self) -> Option<&mut Tab> {
        let active_id = self.active_tab_id?;
        self.tabs.iter_mut().find(|t| t.id == active_id)
    }

    pub fn tab(&self, tab_id: usize) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: usize) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == tab_id)
    }

    /// The current tab's controller, if the tab holds a document.
    pub fn current_controller_mut(&mut self) -> Option<&mut ViewportController> {
        self.get_current_tab_mut()?.controller_mut()
    }

    pub fn switch_to_tab(&mut self, tab_id: usize) -> Result<(), ViewerError> {
        if !self.tabs.iter().any(|t| t.id == tab_id) {
            return Err(ViewerError::NoSuchTab(tab_id));
        }
        if self.active_tab_id != Some(tab_id) {
            self.active_tab_id = Some(tab_id);
            self.redraw_current();
        }
        Ok(())
    }

    /// Move a tab from one index to another
    pub fn move_tab(&mut self, from_index: usize, to_index: usize) -> bool {
        if from_index >= self.tabs.len() || to_index >= self.tabs.len() {
            return false;
        }
        if from_index != to_index {
            let tab = self.tabs.remove(from_index);
            self.tabs.insert(to_index, tab);
        }
        true
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> Option<usize> {
        self.active_tab_id
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    fn redraw_current(&mut self) {
        if let Some(controller) = self.current_controller_mut() {
            controller.redraw();
        }
    }

    /// One turn of the event loop: run the current tab's debounced render,
    /// expire notifications and autosave when due.
    ///
    /// Render failures are reported as notifications and not retried; the
    /// surface keeps the previous raster.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Option<Result<RenderOutcome, RenderError>> {
        let result = self
            .current_controller_mut()
            .and_then(|controller| controller.tick(surface));

        let now = self.clock.now();
        if let Some(Err(e)) = &result {
            let message = ViewerError::Render(e.clone()).user_message();
            self.notifications.error(message, now);
        }
        self.notifications.update(now);

        if now.saturating_duration_since(self.last_autosave) >= self.config.autosave_interval {
            self.last_autosave = now;
            self.store.save_if_dirty();
        }
        result
    }

    /// Release every document and write the store.
    pub fn shutdown(&mut self) -> Result<(), PersistenceError> {
        for tab in &mut self.tabs {
            if let Some(controller) = tab.controller.as_mut() {
                controller.close();
            }
        }
        self.tabs.clear();
        self.active_tab_id = None;
        self.store.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::geometry::Size;
    use crate::test_utils::FakeBackend;

    fn manager(backend: &FakeBackend) -> TabManager {
        TabManager::new(
            Box::new(backend.clone()),
            PersistentStateStore::ephemeral(),
            TabManagerConfig::default(),
            Rc::new(ManualClock::default()),
        )
    }

    fn backend() -> FakeBackend {
        FakeBackend::new()
            .with_document("/docs/a.pdf", 3, Size::new(600.0, 800.0))
            .with_document("/docs/b.pdf", 5, Size::new(600.0, 800.0))
            .with_document("/docs/c.pdf", 1, Size::new(600.0, 800.0))
    }

    #[test]
    fn closing_active_tab_selects_neighbour() {
        let backend = backend();
        let mut tabs = manager(&backend);
        let a = tabs.create_tab(Path::new("/docs/a.pdf"));
        let b = tabs.create_tab(Path::new("/docs/b.pdf"));
        let c = tabs.create_tab(Path::new("/docs/c.pdf"));

        tabs.switch_to_tab(b).unwrap();
        tabs.close_tab(b).unwrap();
        assert_eq!(tabs.active_tab_id(), Some(c));

        tabs.close_tab(c).unwrap();
        assert_eq!(tabs.active_tab_id(), Some(a));
        tabs.close_tab(a).unwrap();
        assert_eq!(tabs.active_tab_id(), None);
        assert!(matches!(tabs.close_tab(a), Err(ViewerError::NoSuchTab(_))));
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn failed_open_leaves_placeholder_and_notifies() {
        let backend = backend();
        let mut tabs = manager(&backend);
        let id = tabs.create_tab(Path::new("/docs/missing.pdf"));

        let tab = tabs.get_current_tab().unwrap();
        assert_eq!(tab.id, id);
        assert!(tab.is_placeholder());
        assert_eq!(tab.file_name(), "Untitled");
        assert!(tabs.notifications().current().unwrap().message.contains("missing.pdf"));
        let state = tabs.store().find(Path::new("/docs/missing.pdf")).unwrap();
        assert!(state.borrow().is_missing);
    }

    #[test]
    fn move_tab_reorders() {
        let backend = backend();
        let mut tabs = manager(&backend);
        let a = tabs.create_tab(Path::new("/docs/a.pdf"));
        let b = tabs.create_tab(Path::new("/docs/b.pdf"));
        assert!(tabs.move_tab(1, 0));
        assert!(!tabs.move_tab(0, 2));
        let order: Vec<usize> = tabs.tabs().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn same_document_shares_one_state() {
        let backend = backend();
        let mut tabs = manager(&backend);
        let first = tabs.create_tab(Path::new("/docs/b.pdf"));
        tabs.current_controller_mut().unwrap().set_page(3).unwrap();
        tabs.create_tab(Path::new("/docs/b.pdf"));

        assert_eq!(tabs.store().len(), 1);
        let page = tabs.current_controller_mut().unwrap().page_no();
        assert_eq!(page, 3);
        let count = tabs.tab(first).unwrap().controller().unwrap().state().borrow().open_count();
        assert_eq!(count, 2);
    }
}
