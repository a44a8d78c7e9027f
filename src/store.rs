//! Persistent key/value storage and the progress record kept in it.
//!
//! The store behaves like browser-local storage: string keys, string values,
//! and every operation is best-effort. A missing, unreadable or corrupt store
//! reads as empty; a failed write is logged and forgotten.
//!
//! The progress blob is versioned. Version 1 is the legacy unversioned shape
//! (`completed`, `lastLesson`, `quizPassed`); version 2 adds bookmarks,
//! last-access and streak. Older blobs are migrated on read.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::domain::{
  clamp_sidebar_width, FontSize, Preferences, PreferencesPatch, ProgressPatch, ProgressRecord, QuizThreshold, Theme,
};

pub const KEY_PROGRESS: &str = "progress";
pub const KEY_PLAYGROUND_SOURCE: &str = "playground_source";
pub const KEY_PLAYGROUND_FRAME_HEIGHT: &str = "playground_frame_height";
pub const KEY_PLAYGROUND_EDITOR_HEIGHT: &str = "playground_editor_height";
pub const KEY_SIDEBAR_COLLAPSED: &str = "sidebar_collapsed";
pub const KEY_SIDEBAR_WIDTH: &str = "sidebar_width";
pub const KEY_THEME: &str = "theme";
pub const KEY_QUIZ_THRESHOLD: &str = "quiz_threshold";
pub const KEY_FOCUS_MODE: &str = "focus_mode";
pub const KEY_FONT_SIZE: &str = "font_size";
pub const KEY_INSTALL_DISMISSED: &str = "install_prompt_dismissed";

pub const PROGRESS_VERSION: u64 = 2;

/// String key/value storage. Implementations swallow their own errors.
pub trait Storage: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str);
  fn remove(&self, key: &str);
}

/// In-memory storage; survives as long as the value does.
#[derive(Default)]
pub struct MemoryStorage {
  map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
  fn map(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
    self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Storage for MemoryStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.map().get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    self.map().insert(key.to_string(), value.to_string());
  }

  fn remove(&self, key: &str) {
    self.map().remove(key);
  }
}

/// A single JSON object on disk holding every key.
///
/// The parsed object is cached together with the file's modification time
/// and length; it is parsed again only when those change, so edits by other
/// processes are still seen. Each write goes to a sibling temp file that is
/// renamed into place.
pub struct FileStorage {
  path: PathBuf,
  cache: Mutex<FileCache>,
}

#[derive(Default)]
struct FileCache {
  stamp: Option<FileStamp>,
  map: BTreeMap<String, String>,
  #[cfg(test)]
  parses: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FileStamp {
  modified: SystemTime,
  len: u64,
}

impl FileStorage {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), cache: Mutex::new(FileCache::default()) }
  }

  fn stamp(&self) -> std::io::Result<FileStamp> {
    let meta = std::fs::metadata(&self.path)?;
    Ok(FileStamp { modified: meta.modified()?, len: meta.len() })
  }

  /// Brings the cache in line with the file and returns it.
  fn current<'a>(&self, cache: &'a mut FileCache) -> &'a mut BTreeMap<String, String> {
    let stamp = match self.stamp() {
      Ok(stamp) => stamp,
      Err(e) => {
        if e.kind() != std::io::ErrorKind::NotFound {
          warn!(target: "progress", path = %self.path.display(), error = %e, "Storage unreadable; using empty store");
        }
        cache.stamp = None;
        cache.map.clear();
        return &mut cache.map;
      }
    };
    if cache.stamp != Some(stamp) {
      cache.map = self.read_all();
      cache.stamp = Some(stamp);
      #[cfg(test)]
      {
        cache.parses += 1;
      }
      debug!(target: "progress", path = %self.path.display(), keys = cache.map.len(), "Storage loaded from disk");
    }
    &mut cache.map
  }

  fn read_all(&self) -> BTreeMap<String, String> {
    let raw = match std::fs::read_to_string(&self.path) {
      Ok(s) => s,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
      Err(e) => {
        warn!(target: "progress", path = %self.path.display(), error = %e, "Storage unreadable; using empty store");
        return BTreeMap::new();
      }
    };
    match serde_json::from_str(&raw) {
      Ok(map) => map,
      Err(e) => {
        warn!(target: "progress", path = %self.path.display(), error = %e, "Storage corrupt; using empty store");
        BTreeMap::new()
      }
    }
  }

  /// Writes the cached map and records the new file stamp.
  fn flush(&self, cache: &mut FileCache) {
    let result = (|| -> std::io::Result<()> {
      if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
      }
      let body = serde_json::to_vec_pretty(&cache.map)?;
      let tmp = self.path.with_extension("tmp");
      std::fs::write(&tmp, body)?;
      std::fs::rename(&tmp, &self.path)
    })();
    match result.and_then(|()| self.stamp()) {
      Ok(stamp) => cache.stamp = Some(stamp),
      Err(e) => {
        // Memory now differs from disk; re-read on next access.
        cache.stamp = None;
        warn!(target: "progress", path = %self.path.display(), error = %e, "Storage write failed; change not persisted");
      }
    }
  }

  fn guard(&self) -> MutexGuard<'_, FileCache> {
    self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Storage for FileStorage {
  fn get(&self, key: &str) -> Option<String> {
    let mut cache = self.guard();
    self.current(&mut cache).get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    let mut cache = self.guard();
    let map = self.current(&mut cache);
    if map.get(key).map(String::as_str) == Some(value) {
      return;
    }
    map.insert(key.to_string(), value.to_string());
    self.flush(&mut cache);
  }

  fn remove(&self, key: &str) {
    let mut cache = self.guard();
    if self.current(&mut cache).remove(key).is_some() {
      self.flush(&mut cache);
    }
  }
}

/// Returns a new set with `id` inserted if absent, removed if present.
pub fn toggle(set: &BTreeSet<String>, id: &str) -> BTreeSet<String> {
  let mut out = set.clone();
  if !out.remove(id) {
    out.insert(id.to_string());
  }
  out
}

/// Typed access to everything the tracker persists.
#[derive(Clone)]
pub struct ProgressStore {
  storage: Arc<dyn Storage>,
  // Serializes read-merge-write of the progress blob within this process.
  save_lock: Arc<Mutex<()>>,
}

impl ProgressStore {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage, save_lock: Arc::new(Mutex::new(())) }
  }

  #[cfg(test)]
  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryStorage::default()))
  }

  /// Read and validate the persisted record. Never fails.
  #[instrument(level = "debug", skip(self))]
  pub fn load(&self) -> ProgressRecord {
    match self.storage.get(KEY_PROGRESS) {
      Some(raw) => match serde_json::from_str::<Value>(&raw) {
        Ok(v) => record_from_value(&migrate(v)),
        Err(e) => {
          warn!(target: "progress", error = %e, "Progress blob is not JSON; starting empty");
          ProgressRecord::default()
        }
      },
      None => ProgressRecord::default(),
    }
  }

  /// Merge `patch` into the latest persisted record and write it back.
  /// Returns the record as written.
  #[instrument(level = "debug", skip(self, patch))]
  pub fn save(&self, patch: ProgressPatch) -> ProgressRecord {
    let _g = self.save_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut record = self.load();
    if patch.is_empty() {
      return record;
    }
    patch.apply(&mut record);
    self.storage.set(KEY_PROGRESS, &record_to_value(&record).to_string());
    debug!(target: "progress", completed = record.completed.len(), bookmarks = record.bookmarks.len(), streak = record.streak, "Progress saved");
    record
  }

  pub fn preferences(&self) -> Preferences {
    let d = Preferences::default();
    Preferences {
      theme: self.get_enum::<Theme>(KEY_THEME).unwrap_or(d.theme),
      quiz_threshold: self.get_enum::<QuizThreshold>(KEY_QUIZ_THRESHOLD).unwrap_or(d.quiz_threshold),
      focus_mode: self.get_parsed::<bool>(KEY_FOCUS_MODE).unwrap_or(d.focus_mode),
      font_size: self.get_enum::<FontSize>(KEY_FONT_SIZE).unwrap_or(d.font_size),
      sidebar_width: self.get_parsed::<u32>(KEY_SIDEBAR_WIDTH).map(clamp_sidebar_width).unwrap_or(d.sidebar_width),
      install_prompt_dismissed: self.get_parsed::<bool>(KEY_INSTALL_DISMISSED).unwrap_or(d.install_prompt_dismissed),
    }
  }

  pub fn update_preferences(&self, patch: PreferencesPatch) -> Preferences {
    if let Some(t) = patch.theme { self.storage.set(KEY_THEME, t.as_str()); }
    if let Some(q) = patch.quiz_threshold { self.storage.set(KEY_QUIZ_THRESHOLD, q.as_str()); }
    if let Some(f) = patch.focus_mode { self.storage.set(KEY_FOCUS_MODE, &f.to_string()); }
    if let Some(f) = patch.font_size { self.storage.set(KEY_FONT_SIZE, f.as_str()); }
    if let Some(w) = patch.sidebar_width { self.storage.set(KEY_SIDEBAR_WIDTH, &clamp_sidebar_width(w).to_string()); }
    if let Some(d) = patch.install_prompt_dismissed { self.storage.set(KEY_INSTALL_DISMISSED, &d.to_string()); }
    self.preferences()
  }

  /// Sections the learner collapsed, keyed by section key.
  pub fn collapsed_sections(&self) -> BTreeMap<String, bool> {
    self.storage
      .get(KEY_SIDEBAR_COLLAPSED)
      .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
      .and_then(|v| v.as_object().cloned())
      .map(|obj| obj.into_iter().filter_map(|(k, v)| v.as_bool().map(|b| (k, b))).collect())
      .unwrap_or_default()
  }

  pub fn set_collapsed_sections(&self, collapsed: &BTreeMap<String, bool>) {
    self.storage.set(KEY_SIDEBAR_COLLAPSED, &json!(collapsed).to_string());
  }

  pub fn playground_source(&self) -> Option<String> {
    self.storage.get(KEY_PLAYGROUND_SOURCE)
  }

  pub fn set_playground_source(&self, source: &str) {
    self.storage.set(KEY_PLAYGROUND_SOURCE, source);
  }

  /// Stored (frame, editor) heights in px.
  pub fn playground_heights(&self) -> (Option<u32>, Option<u32>) {
    (
      self.get_parsed::<u32>(KEY_PLAYGROUND_FRAME_HEIGHT),
      self.get_parsed::<u32>(KEY_PLAYGROUND_EDITOR_HEIGHT),
    )
  }

  pub fn set_playground_heights(&self, frame: Option<u32>, editor: Option<u32>) {
    if let Some(h) = frame { self.storage.set(KEY_PLAYGROUND_FRAME_HEIGHT, &h.to_string()); }
    if let Some(h) = editor { self.storage.set(KEY_PLAYGROUND_EDITOR_HEIGHT, &h.to_string()); }
  }

  fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
    self.storage.get(key).and_then(|s| s.trim().parse().ok())
  }

  fn get_enum<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
    self.storage.get(key).and_then(|s| serde_json::from_value(Value::String(s)).ok())
  }
}

/// Bring any stored blob up to the current version.
pub fn migrate(v: Value) -> Value {
  let version = v.get("version").and_then(Value::as_u64).unwrap_or(1);
  match version {
    1 => migrate_v1_to_v2(v),
    _ => v,
  }
}

fn migrate_v1_to_v2(v: Value) -> Value {
  let mut obj = match v {
    Value::Object(obj) => obj,
    _ => Map::new(),
  };
  obj.entry("bookmarks").or_insert_with(|| json!([]));
  obj.entry("lastAccess").or_insert(Value::Null);
  obj.entry("streak").or_insert(json!(0));
  obj.insert("version".into(), json!(PROGRESS_VERSION));
  debug!(target: "progress", "Migrated progress blob v1 -> v2");
  Value::Object(obj)
}

/// Read a record field by field, defaulting whatever is missing or malformed.
pub fn record_from_value(v: &Value) -> ProgressRecord {
  ProgressRecord {
    completed: string_set(v.get("completed")),
    last_lesson: v.get("lastLesson").and_then(Value::as_str).map(str::to_string),
    quiz_passed: v
      .get("quizPassed")
      .and_then(Value::as_object)
      .map(|m| m.iter().filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b))).collect())
      .unwrap_or_default(),
    bookmarks: string_set(v.get("bookmarks")),
    last_access: v.get("lastAccess").and_then(Value::as_str).map(str::to_string),
    streak: v
      .get("streak")
      .and_then(Value::as_u64)
      .and_then(|n| u32::try_from(n).ok())
      .unwrap_or(0),
  }
}

pub fn record_to_value(r: &ProgressRecord) -> Value {
  json!({
    "version": PROGRESS_VERSION,
    "completed": r.completed,
    "lastLesson": r.last_lesson,
    "quizPassed": r.quiz_passed,
    "bookmarks": r.bookmarks,
    "lastAccess": r.last_access,
    "streak": r.streak,
  })
}

fn string_set(v: Option<&Value>) -> BTreeSet<String> {
  v.and_then(Value::as_array)
    .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn toggle_membership_follows_parity() {
    for initial in [false, true] {
      for count in 0..6 {
        let mut set = if initial { ids(&["07"]) } else { BTreeSet::new() };
        for _ in 0..count {
          set = toggle(&set, "07");
        }
        assert_eq!(set.contains("07"), initial ^ (count % 2 == 1), "initial={initial} count={count}");
      }
    }
  }

  #[test]
  fn toggle_leaves_other_members_alone() {
    let set = toggle(&ids(&["01", "02"]), "03");
    assert_eq!(set, ids(&["01", "02", "03"]));
  }

  #[test]
  fn missing_blob_loads_defaults() {
    assert_eq!(ProgressStore::in_memory().load(), ProgressRecord::default());
  }

  #[test]
  fn malformed_blob_loads_defaults() {
    let storage = Arc::new(MemoryStorage::default());
    storage.set(KEY_PROGRESS, "{not json");
    assert_eq!(ProgressStore::new(storage).load(), ProgressRecord::default());
  }

  #[test]
  fn malformed_fields_are_defaulted_individually() {
    let storage = Arc::new(MemoryStorage::default());
    storage.set(
      KEY_PROGRESS,
      r#"{"version":2,"completed":["01",5,"02"],"lastLesson":7,"quizPassed":{"01":true,"02":"yes"},"bookmarks":"03","streak":-4}"#,
    );
    let r = ProgressStore::new(storage).load();
    assert_eq!(r.completed, ids(&["01", "02"]));
    assert_eq!(r.last_lesson, None);
    assert_eq!(r.quiz_passed.len(), 1);
    assert!(r.quiz_passed("01"));
    assert!(r.bookmarks.is_empty());
    assert_eq!(r.streak, 0);
  }

  #[test]
  fn legacy_blob_is_migrated() {
    let storage = Arc::new(MemoryStorage::default());
    storage.set(KEY_PROGRESS, r#"{"completed":["01"],"lastLesson":"01","quizPassed":{"01":true}}"#);
    let store = ProgressStore::new(storage.clone());
    let r = store.load();
    assert_eq!(r.completed, ids(&["01"]));
    assert_eq!(r.last_lesson.as_deref(), Some("01"));
    assert_eq!(r.streak, 0);

    store.save(ProgressPatch { streak: Some(1), ..Default::default() });
    let raw: Value = serde_json::from_str(&storage.get(KEY_PROGRESS).unwrap()).unwrap();
    assert_eq!(raw["version"], json!(PROGRESS_VERSION));
    assert_eq!(raw["completed"], json!(["01"]));
  }

  #[test]
  fn save_merges_only_supplied_fields() {
    let store = ProgressStore::in_memory();
    store.save(ProgressPatch { completed: Some(ids(&["01"])), ..Default::default() });

    // Another writer sets bookmarks without knowing about completion.
    let written = store.save(ProgressPatch { bookmarks: Some(ids(&["05"])), ..Default::default() });
    assert_eq!(written.completed, ids(&["01"]));
    assert_eq!(written.bookmarks, ids(&["05"]));
    assert_eq!(store.load(), written);
  }

  #[test]
  fn file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.json");
    {
      let store = ProgressStore::new(Arc::new(FileStorage::new(&path)));
      store.save(ProgressPatch { completed: Some(ids(&["01", "02"])), ..Default::default() });
      store.set_playground_source("<p>hi</p>");
    }
    let store = ProgressStore::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(store.load().completed, ids(&["01", "02"]));
    assert_eq!(store.playground_source().as_deref(), Some("<p>hi</p>"));
  }

  #[test]
  fn corrupt_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "[1,2").unwrap();
    let storage = FileStorage::new(&path);
    assert_eq!(storage.get(KEY_PROGRESS), None);
    storage.set(KEY_THEME, "dark");
    assert_eq!(storage.get(KEY_THEME).as_deref(), Some("dark"));
  }

  #[test]
  fn file_storage_parses_only_when_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, r#"{"theme":"light","focus_mode":"true"}"#).unwrap();
    let storage = Arc::new(FileStorage::new(&path));
    let store = ProgressStore::new(storage.clone());

    let prefs = store.preferences();
    assert_eq!(prefs.theme, Theme::Light);
    assert!(prefs.focus_mode);
    store.load();
    assert_eq!(storage.guard().parses, 1);

    // Own writes keep the cache current.
    store.update_preferences(PreferencesPatch { theme: Some(Theme::Dark), ..Default::default() });
    assert_eq!(store.preferences().theme, Theme::Dark);
    assert_eq!(storage.guard().parses, 1);
  }

  #[test]
  fn file_storage_sees_other_writers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let a = FileStorage::new(&path);
    let b = FileStorage::new(&path);
    a.set(KEY_THEME, "light");
    assert_eq!(b.get(KEY_THEME).as_deref(), Some("light"));
    b.set(KEY_THEME, "dark");
    assert_eq!(a.get(KEY_THEME).as_deref(), Some("dark"));
    std::fs::remove_file(&path).unwrap();
    assert_eq!(a.get(KEY_THEME), None);
  }

  #[test]
  fn preferences_default_and_clamp() {
    let store = ProgressStore::in_memory();
    assert_eq!(store.preferences(), Preferences::default());

    let prefs = store.update_preferences(PreferencesPatch {
      theme: Some(Theme::Dark),
      sidebar_width: Some(10_000),
      quiz_threshold: Some(QuizThreshold::All),
      ..Default::default()
    });
    assert_eq!(prefs.theme, Theme::Dark);
    assert_eq!(prefs.sidebar_width, crate::domain::SIDEBAR_WIDTH_MAX);
    assert_eq!(prefs.quiz_threshold, QuizThreshold::All);
    assert!(!prefs.focus_mode);
  }

  #[test]
  fn collapsed_sections_round_trip() {
    let store = ProgressStore::in_memory();
    let mut collapsed = BTreeMap::new();
    collapsed.insert("help".to_string(), true);
    store.set_collapsed_sections(&collapsed);
    assert_eq!(store.collapsed_sections(), collapsed);
  }
}
