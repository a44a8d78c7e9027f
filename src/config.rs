//! Server configuration: an optional TOML file plus environment overrides.
//!
//! Schema (every key optional):
//!
//! ```toml
//! port = 5173
//! lessons_root = ".."              # folder holding the lesson directories
//! data_path = "./tracker-store.json" # ":memory:" keeps progress in memory only
//! static_dir = "./static"
//! course_path = "./my-course.toml" # override the built-in catalog
//! quizzes_path = "./my-quizzes.toml"
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
  pub port: u16,
  pub lessons_root: PathBuf,
  pub data_path: PathBuf,
  pub static_dir: PathBuf,
  pub course_path: Option<String>,
  pub quizzes_path: Option<String>,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      port: 5173,
      lessons_root: PathBuf::from(".."),
      data_path: PathBuf::from("./tracker-store.json"),
      static_dir: PathBuf::from("./static"),
      course_path: None,
      quizzes_path: None,
    }
  }
}

impl TrackerConfig {
  /// Load from TRACKER_CONFIG_PATH (if set), then apply env overrides:
  /// PORT, LESSONS_ROOT, TRACKER_DATA_PATH, STATIC_DIR.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    cfg.apply_overrides(|key| std::env::var(key).ok());
    cfg
  }

  fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(port) = var("PORT").and_then(|p| p.parse::<u16>().ok()) {
      self.port = port;
    }
    if let Some(root) = var("LESSONS_ROOT") {
      self.lessons_root = root.into();
    }
    if let Some(path) = var("TRACKER_DATA_PATH") {
      self.data_path = path.into();
    }
    if let Some(dir) = var("STATIC_DIR") {
      self.static_dir = dir.into();
    }
  }
}

/// Attempt to load `TrackerConfig` from TRACKER_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<TrackerConfig> {
  let path = std::env::var("TRACKER_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<TrackerConfig>(&s) {
      Ok(cfg) => {
        info!(target: "tracker", %path, "Loaded tracker config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tracker", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tracker", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
