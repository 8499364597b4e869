//! Layout persistence: key-value stores and debounced saving.
//!
//! One snapshot per novel, stored as JSON under the key `layout-<novel_id>`.
//! Loading never fails: a missing or unreadable snapshot is logged and
//! replaced by an empty layout.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quilldesk_core_layout::PersistedLayoutState;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors raised by a [`LayoutStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize layout: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid store key '{0}'")]
    InvalidKey(String),
}

/// Minimal key-value storage for layout snapshots.
pub trait LayoutStore: Send {
    /// Stored value, or `None` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileLayoutStore {
    dir: PathBuf,
}

impl FileLayoutStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The platform data directory, or the working directory when none exists.
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "quilldesk")
            .map(|dirs| dirs.data_dir().join("layouts"))
            .unwrap_or_else(|| PathBuf::from("layouts"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a key.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LayoutStore for FileLayoutStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        write_atomic(&path, value.as_bytes())?;
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// In-memory store, used when nothing should touch the disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayoutStore {
    entries: HashMap<String, String>,
}

impl MemoryLayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutStore for MemoryLayoutStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store key for a novel's layout.
pub fn layout_key(novel_id: &str) -> String {
    format!("layout-{novel_id}")
}

/// Write a novel's layout snapshot.
pub fn save_state(
    store: &mut dyn LayoutStore,
    novel_id: &str,
    state: &PersistedLayoutState,
) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(state)?;
    store.set(&layout_key(novel_id), &json)?;
    debug!("Layout for novel '{}' saved ({} windows)", novel_id, state.windows.len());
    Ok(())
}

/// Read a novel's layout snapshot.
///
/// Missing, unreadable or malformed data yields the empty default layout.
pub fn load_state(store: &dyn LayoutStore, novel_id: &str) -> PersistedLayoutState {
    let json = match store.get(&layout_key(novel_id)) {
        Ok(Some(json)) => json,
        Ok(None) => {
            info!("No saved layout for novel '{}'", novel_id);
            return PersistedLayoutState::default();
        }
        Err(e) => {
            warn!("Failed to read saved layout for novel '{}': {}", novel_id, e);
            return PersistedLayoutState::default();
        }
    };

    match serde_json::from_str(&json) {
        Ok(state) => state,
        Err(e) => {
            warn!("Failed to parse saved layout for novel '{}': {}", novel_id, e);
            PersistedLayoutState::default()
        }
    }
}

/// Trailing-edge debounce for layout saves.
///
/// Every request pushes the deadline back; the save happens once the
/// requests stop for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Schedule (or reschedule) a save.
    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once, when the deadline has passed; clears it.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilldesk_core_layout::{PersistedViewport, PersistedWindow, Point, Size};
    use tempfile::tempdir;

    fn sample_state() -> PersistedLayoutState {
        PersistedLayoutState {
            saved_at: 1_700_000_000,
            windows: vec![
                PersistedWindow {
                    id: "outline-window".to_string(),
                    position: Point::new(0.0, 0.0),
                    size: Size::new(400.0, 800.0),
                    is_minimized: false,
                },
                PersistedWindow {
                    id: "chapter-3".to_string(),
                    position: Point::new(450.5, 20.0),
                    size: Size::new(700.0, 500.0),
                    is_minimized: true,
                },
            ],
            viewport: PersistedViewport {
                pan_offset: Point::new(-120.0, 40.0),
                zoom_level: 0.8,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = FileLayoutStore::new(dir.path().join("nested"));

        assert_eq!(store.get("layout-n1").unwrap(), None);
        save_state(&mut store, "n1", &sample_state()).unwrap();
        assert!(dir.path().join("nested").join("layout-n1.json").exists());

        let loaded = load_state(&store, "n1");
        assert_eq!(loaded, sample_state());
        assert!(load_state(&store, "n2").is_empty());
    }

    #[test]
    fn test_corrupt_layout_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let mut store = FileLayoutStore::new(dir.path());
        store.set("layout-n1", "{\"windows\": [oops").unwrap();

        let loaded = load_state(&store, "n1");
        assert_eq!(loaded, PersistedLayoutState::default());
    }

    #[test]
    fn test_partial_layout_uses_defaults() {
        let mut store = MemoryLayoutStore::new();
        store
            .set(
                "layout-n1",
                r#"{"windows":[{"id":"chapter-1","position":{"x":1.0,"y":2.0},"size":{"width":300.0,"height":200.0}}]}"#,
            )
            .unwrap();
        let loaded = load_state(&store, "n1");
        assert_eq!(loaded.windows.len(), 1);
        assert!(!loaded.windows[0].is_minimized);
        assert_eq!(loaded.viewport, PersistedViewport::default());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let store = FileLayoutStore::new("/tmp/unused");
        assert!(matches!(store.path_for("../etc"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.path_for(""), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.path_for("a/b"), Err(StoreError::InvalidKey(_))));
        assert!(store.path_for("layout-novel_1").is_ok());
    }

    #[test]
    fn test_invalid_novel_id_loads_default() {
        let mut store = FileLayoutStore::new("/tmp/unused");
        assert!(load_state(&store, "../x").is_empty());
        assert!(save_state(&mut store, "../x", &sample_state()).is_err());
    }

    #[test]
    fn test_default_dir_is_named_for_app() {
        let dir = FileLayoutStore::default_dir();
        assert!(dir.to_string_lossy().contains("quilldesk") || dir == PathBuf::from("layouts"));
    }

    #[test]
    fn test_debouncer_coalesces() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        assert!(!debouncer.poll(start));

        debouncer.request(start);
        debouncer.request(start + Duration::from_millis(300));
        assert!(!debouncer.poll(start + Duration::from_millis(600)));
        assert!(debouncer.poll(start + Duration::from_millis(800)));
        assert!(!debouncer.is_pending());
        assert!(!debouncer.poll(start + Duration::from_millis(900)));
    }

    #[test]
    fn test_debouncer_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.request(start);
        debouncer.cancel();
        assert!(!debouncer.poll(start + Duration::from_secs(1)));
    }
}
