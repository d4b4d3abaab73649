//! The application data blob and its `file_states` collection
//!
//! View states are handed out as [`SharedViewState`] handles: every
//! controller that opens the same path mutates the same record, and the store
//! serializes whatever the handles hold at save time. Top-level keys other
//! than `file_states` belong to other components and are written back
//! untouched.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use crate::error::PersistenceError;
use crate::view_state::ViewState;

pub type SharedViewState = Rc<RefCell<ViewState>>;

const FILE_STATES_KEY: &str = "file_states";

#[derive(Debug, Default)]
pub struct PersistentStateStore {
    file_states: Vec<SharedViewState>,
    extra: Map<String, Value>,
    file_path: Option<PathBuf>,
    last_saved: Option<Value>,
}

/// Key used to match records: the absolute form of `path`.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl PersistentStateStore {
    /// In-memory store that never touches the disk.
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..Self::default()
        }
    }

    /// Load from disk, or start empty when the file is unreadable.
    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                error!("Failed to load viewer state from {}: {e}", path.display());
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    /// Load from disk. A missing file is an empty store, not an error.
    pub fn load_from_file(file_path: &Path) -> Result<Self, PersistenceError> {
        if !file_path.exists() {
            debug!("No state file at {}, starting empty", file_path.display());
            return Ok(Self::with_file(file_path));
        }

        let content = fs::read_to_string(file_path).map_err(|source| PersistenceError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        let mut store = Self::deserialize(&content)?;
        store.file_path = Some(file_path.to_path_buf());
        store.last_saved = Some(store.to_value());
        info!(
            "Loaded {} file states from {}",
            store.file_states.len(),
            file_path.display()
        );
        Ok(store)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.file_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_states.is_empty()
    }

    /// Records in store order (most recently created first).
    pub fn file_states(&self) -> impl Iterator<Item = &SharedViewState> {
        self.file_states.iter()
    }

    pub fn find(&self, file_path: &Path) -> Option<SharedViewState> {
        let key = normalize_path(file_path);
        self.file_states
            .iter()
            .find(|state| state.borrow().file_path() == key)
            .cloned()
    }

    /// The shared record for `file_path`, created at the front if absent.
    pub fn find_or_create(&mut self, file_path: &Path) -> SharedViewState {
        if let Some(state) = self.find(file_path) {
            return state;
        }
        let key = normalize_path(file_path);
        debug!("Creating view state for {}", key.display());
        let state = Rc::new(RefCell::new(ViewState::new(key)));
        self.file_states.insert(0, Rc::clone(&state));
        state
    }

    /// Drop the record for `file_path`. Live handles keep working but are no
    /// longer persisted.
    pub fn forget(&mut self, file_path: &Path) -> bool {
        let key = normalize_path(file_path);
        let before = self.file_states.len();
        self.file_states
            .retain(|state| state.borrow().file_path() != key);
        before != self.file_states.len()
    }

    /// Record with the latest `last_opened` timestamp.
    pub fn most_recent(&self) -> Option<SharedViewState> {
        self.file_states
            .iter()
            .filter(|state| state.borrow().last_opened().is_some())
            .max_by_key(|state| state.borrow().last_opened())
            .cloned()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }

    pub fn to_value(&self) -> Value {
        let mut root = self.extra.clone();
        let records = self
            .file_states
            .iter()
            .map(|state| state.borrow().to_value())
            .collect();
        root.insert(FILE_STATES_KEY.to_string(), Value::Array(records));
        Value::Object(root)
    }

    pub fn serialize(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// Parse a blob. Corrupt records are skipped one by one; only a blob that
    /// is not JSON, or whose root is not an object, fails as a whole.
    pub fn deserialize(blob: &str) -> Result<Self, PersistenceError> {
        let root: Value = serde_json::from_str(blob)?;
        let Value::Object(mut extra) = root else {
            return Err(PersistenceError::NotAnObject);
        };

        let mut store = Self::default();
        match extra.remove(FILE_STATES_KEY) {
            Some(Value::Array(records)) => {
                for (idx, record) in records.iter().enumerate() {
                    let Some(state) = ViewState::from_value(record) else {
                        warn!("Skipping unreadable file state #{idx}");
                        continue;
                    };
                    if store.find(state.file_path()).is_some() {
                        warn!("Skipping duplicate file state for {:?}", state.file_path());
                        continue;
                    }
                    store.file_states.push(Rc::new(RefCell::new(state)));
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => warn!("Ignoring `{FILE_STATES_KEY}`: expected an array, got {other}"),
        }
        store.extra = extra;
        Ok(store)
    }

    /// True when the records differ from what was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        match &self.last_saved {
            Some(saved) => *saved != self.to_value(),
            None => !self.file_states.is_empty() || !self.extra.is_empty(),
        }
    }

    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let Some(path) = self.file_path.clone() else {
            return Ok(());
        };

        let value = self.to_value();
        let content = serde_json::to_string_pretty(&value)?;
        let io_err = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        // Write a sibling file, then rename it over the blob.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        debug!("Saved {} file states to {}", self.file_states.len(), path.display());
        self.last_saved = Some(value);
        Ok(())
    }

    /// Save when dirty. Failures are logged and reported as `false`.
    pub fn save_if_dirty(&mut self) -> bool {
        if !self.is_dirty() {
            return true;
        }
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save viewer state: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    #[test]
    fn find_or_create_reuses_identity() {
        let mut store = PersistentStateStore::ephemeral();
        let a = store.find_or_create(Path::new("/docs/a.pdf"));
        let again = store.find_or_create(Path::new("/docs/a.pdf"));
        assert!(Rc::ptr_eq(&a, &again));
        assert_eq!(store.len(), 1);

        a.borrow_mut().set_zoom(3.0).unwrap();
        assert_eq!(store.find(Path::new("/docs/a.pdf")).unwrap().borrow().zoom(), 3.0);
    }

    #[test]
    fn new_records_go_to_the_front() {
        let mut store = PersistentStateStore::ephemeral();
        store.find_or_create(Path::new("/docs/a.pdf"));
        store.find_or_create(Path::new("/docs/b.pdf"));
        let order: Vec<PathBuf> = store
            .file_states()
            .map(|s| s.borrow().file_path().to_path_buf())
            .collect();
        assert_eq!(order, vec![PathBuf::from("/docs/b.pdf"), PathBuf::from("/docs/a.pdf")]);
    }

    #[test]
    fn corrupt_records_are_skipped_individually() {
        let blob = json!({
            "file_states": [
                { "file_path": "/docs/good.pdf", "zoom": 2.0 },
                { "zoom": 1.5 },
                "garbage",
                { "file_path": "/docs/also-good.pdf", "rotation": 33 },
                { "file_path": "/docs/good.pdf", "zoom": 9.0 },
            ]
        })
        .to_string();

        let store = PersistentStateStore::deserialize(&blob).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.find(Path::new("/docs/good.pdf")).unwrap().borrow().zoom(), 2.0);
        assert!(store.find(Path::new("/docs/also-good.pdf")).is_some());
    }

    #[test]
    fn relative_stored_path_matches_on_reopen() {
        let blob = json!({ "file_states": [{ "file_path": "docs/a.pdf", "page_no": 7 }] }).to_string();
        let mut store = PersistentStateStore::deserialize(&blob).unwrap();

        let state = store.find_or_create(Path::new("docs/a.pdf"));
        assert_eq!(store.len(), 1);
        assert_eq!(state.borrow().page_no(), 7);
    }

    #[test]
    fn relative_and_absolute_forms_are_one_record() {
        let absolute = std::path::absolute("docs/b.pdf").unwrap();
        let blob = json!({
            "file_states": [
                { "file_path": "docs/b.pdf", "zoom": 2.0 },
                { "file_path": absolute.to_string_lossy(), "zoom": 4.0 },
            ]
        })
        .to_string();

        let store = PersistentStateStore::deserialize(&blob).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.find(&absolute).unwrap().borrow().zoom(), 2.0);
    }

    #[test]
    fn most_recent_follows_open_timestamps() {
        let mut store = PersistentStateStore::ephemeral();
        let at = |ts: &str| DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc);
        let a = store.find_or_create(Path::new("/docs/a.pdf"));
        let b = store.find_or_create(Path::new("/docs/b.pdf"));
        store.find_or_create(Path::new("/docs/never.pdf"));
        assert!(store.most_recent().is_none());

        a.borrow_mut().record_open(at("2025-05-02T09:00:00Z"));
        b.borrow_mut().record_open(at("2025-05-01T09:00:00Z"));
        assert!(Rc::ptr_eq(&store.most_recent().unwrap(), &a));

        b.borrow_mut().record_open(at("2025-05-03T09:00:00Z"));
        assert!(Rc::ptr_eq(&store.most_recent().unwrap(), &b));
    }

    #[test]
    fn foreign_keys_written_by_other_components_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut store = PersistentStateStore::with_file(&path);
        store.save().unwrap();

        store
            .extra_mut()
            .insert("ocr".to_string(), json!({ "language": "deu" }));
        assert!(store.is_dirty());
        assert!(store.save_if_dirty());

        let reloaded = PersistentStateStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.extra()["ocr"], json!({ "language": "deu" }));
        assert!(reloaded.is_empty());
    }

    #[test]
    fn unknown_top_level_keys_survive() {
        let blob = json!({
            "plugin_data": { "theme": "dark" },
            "recent_searches": ["graph"],
            "file_states": [],
        })
        .to_string();

        let store = PersistentStateStore::deserialize(&blob).unwrap();
        let value = store.to_value();
        assert_eq!(value["plugin_data"], json!({ "theme": "dark" }));
        assert_eq!(value["recent_searches"], json!(["graph"]));
        assert_eq!(value["file_states"], json!([]));
    }

    #[test]
    fn root_must_be_an_object() {
        assert!(matches!(
            PersistentStateStore::deserialize("[1, 2]"),
            Err(PersistenceError::NotAnObject)
        ));
        assert!(matches!(
            PersistentStateStore::deserialize("{ not json"),
            Err(PersistenceError::Parse(_))
        ));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let mut store = PersistentStateStore::with_file(&path);
        let state = store.find_or_create(Path::new("/docs/a.pdf"));
        state.borrow_mut().set_page_no(3, 10).unwrap();
        assert!(store.is_dirty());
        store.save().unwrap();
        assert!(!store.is_dirty());

        state.borrow_mut().set_page_no(4, 10).unwrap();
        assert!(store.is_dirty());
        assert!(store.save_if_dirty());

        let reloaded = PersistentStateStore::load_from_file(&path).unwrap();
        assert!(!reloaded.is_dirty());
        assert_eq!(reloaded.find(Path::new("/docs/a.pdf")).unwrap().borrow().page_no(), 4);
    }

    #[test]
    fn malformed_file_falls_back_to_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{{{{").unwrap();

        let store = PersistentStateStore::load_or_ephemeral(Some(&path));
        assert!(store.is_empty());
        assert_eq!(store.file_path(), Some(path.as_path()));
    }

    #[test]
    fn ephemeral_save_is_a_no_op() {
        let mut store = PersistentStateStore::ephemeral();
        store.find_or_create(Path::new("/docs/a.pdf"));
        store.save().unwrap();
    }
}
