//! Application state: course catalog, persistent store and server settings.
//!
//! This module owns:
//!   - the immutable catalog (lessons + quizzes) and the router allow-list
//!   - the progress store (file-backed key/value storage)
//!   - building a client's `UiState` from storage and committing it back
//!
//! `dispatch` is the one entry point handlers use: reduce, then persist only
//! what changed.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::TrackerConfig;
use crate::domain::ProgressPatch;
use crate::error::CatalogError;
use crate::logic::{reduce, Action, UiState};
use crate::playground::{Playground, DEFAULT_STARTER};
use crate::store::{FileStorage, MemoryStorage, ProgressStore, Storage};

/// `data_path` value that selects a non-persistent store.
pub const IN_MEMORY_DATA_PATH: &str = ":memory:";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub store: ProgressStore,
    /// First path segments the lesson router will serve.
    pub lesson_roots: Arc<BTreeSet<String>>,
    /// Canonical directory lesson paths are resolved against.
    pub lessons_root: PathBuf,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(catalog: Catalog, store: ProgressStore, lessons_root: PathBuf, static_dir: PathBuf) -> Self {
        let lessons_root = match lessons_root.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "tracker", root = %lessons_root.display(), error = %e, "Lessons root not found; lesson folders will fall through");
                lessons_root
            }
        };
        Self {
            lesson_roots: Arc::new(catalog.lesson_roots()),
            catalog: Arc::new(catalog),
            store,
            lessons_root,
            static_dir,
        }
    }

    /// Build state from config: load the catalog, open the store.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(cfg: &TrackerConfig) -> Result<Self, CatalogError> {
        let catalog = Catalog::load(cfg.course_path.as_deref(), cfg.quizzes_path.as_deref())?;
        let storage: Arc<dyn Storage> = if cfg.data_path.as_os_str() == IN_MEMORY_DATA_PATH {
            warn!(target: "tracker", "Progress is kept in memory only and is lost on restart");
            Arc::new(MemoryStorage::default())
        } else {
            Arc::new(FileStorage::new(&cfg.data_path))
        };
        let store = ProgressStore::new(storage);
        let state = Self::new(catalog, store, cfg.lessons_root.clone(), cfg.static_dir.clone());
        info!(
            target: "tracker",
            data_path = %cfg.data_path.display(),
            lessons_root = %state.lessons_root.display(),
            roots = state.lesson_roots.len(),
            "Tracker state ready"
        );
        Ok(state)
    }

    /// Fresh `UiState` for one client, read from storage.
    pub fn session(&self, selected: Option<String>, search: String) -> UiState {
        let (frame, editor) = self.store.playground_heights();
        let playground = Playground::new(self.store.playground_source().unwrap_or_else(|| DEFAULT_STARTER.to_string()))
            .resize(frame, editor);
        UiState {
            progress: self.store.load(),
            selected: selected.filter(|id| self.catalog.contains(id)),
            search,
            collapsed: self.store.collapsed_sections(),
            quiz: None,
            playground,
        }
    }

    /// Reduce and persist. The returned state carries the progress record
    /// as written, which may include fields another client changed.
    #[instrument(level = "debug", skip(self, state), fields(action = action.name()))]
    pub fn dispatch(&self, state: UiState, action: Action) -> UiState {
        let before = state.clone();
        let after = reduce(&self.catalog, state, action);
        self.commit(&before, after)
    }

    pub fn commit(&self, before: &UiState, mut after: UiState) -> UiState {
        let patch = ProgressPatch::diff(&before.progress, &after.progress);
        if !patch.is_empty() {
            after.progress = self.store.save(patch);
        }
        if before.collapsed != after.collapsed {
            self.store.set_collapsed_sections(&after.collapsed);
        }
        if before.playground.source != after.playground.source {
            self.store.set_playground_source(&after.playground.source);
        }
        let (bp, ap) = (&before.playground, &after.playground);
        if bp.frame_height != ap.frame_height || bp.editor_height != ap.editor_height {
            self.store.set_playground_heights(Some(ap.frame_height), Some(ap.editor_height));
        }
        after
    }
}
