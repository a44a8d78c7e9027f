//! Domain models used by the tracker: catalog sections and lessons, quizzes,
//! the mutable progress record and the user preferences stored next to it.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// The four catalog sections, in display order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
  /// Sequential lessons with prerequisites and quizzes.
  Core,
  Help,
  Ready,
  Other,
}

impl SectionKind {
  pub fn key(self) -> &'static str {
    match self {
      SectionKind::Core => "core",
      SectionKind::Help => "help",
      SectionKind::Ready => "ready",
      SectionKind::Other => "other",
    }
  }

  pub fn from_key(key: &str) -> Option<Self> {
    match key {
      "core" => Some(SectionKind::Core),
      "help" => Some(SectionKind::Help),
      "ready" => Some(SectionKind::Ready),
      "other" => Some(SectionKind::Other),
      _ => None,
    }
  }
}

/// One catalog entry: a folder (or file) of external teaching material.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LessonItem {
  pub id: String,
  pub title: String,
  /// Relative to the lessons root (the repository parent directory).
  pub path: String,
  pub topics: String,
  #[serde(default)] pub prerequisites: Vec<String>,
  #[serde(default)] pub related: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
  pub key: SectionKind,
  pub title: String,
  #[serde(default)] pub items: Vec<LessonItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
  pub prompt: String,
  pub options: Vec<String>,
  /// Zero-based index into `options`.
  pub correct: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
  pub lesson: String,
  pub title: String,
  pub questions: Vec<Question>,
}

/// The only mutable entity: everything the learner has done so far.
///
/// Identifiers are expected to exist in the catalog but this is not enforced;
/// unknown ones are skipped when rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressRecord {
  pub completed: BTreeSet<String>,
  pub last_lesson: Option<String>,
  pub quiz_passed: BTreeMap<String, bool>,
  pub bookmarks: BTreeSet<String>,
  /// RFC 3339 timestamp of the last lesson visit.
  pub last_access: Option<String>,
  pub streak: u32,
}

impl ProgressRecord {
  pub fn is_completed(&self, id: &str) -> bool {
    self.completed.contains(id)
  }

  pub fn is_bookmarked(&self, id: &str) -> bool {
    self.bookmarks.contains(id)
  }

  pub fn quiz_passed(&self, id: &str) -> bool {
    self.quiz_passed.get(id).copied().unwrap_or(false)
  }
}

/// A partial update of the progress record. `None` means "leave as persisted".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressPatch {
  pub completed: Option<BTreeSet<String>>,
  pub last_lesson: Option<Option<String>>,
  pub quiz_passed: Option<BTreeMap<String, bool>>,
  pub bookmarks: Option<BTreeSet<String>>,
  pub last_access: Option<Option<String>>,
  pub streak: Option<u32>,
}

impl ProgressPatch {
  /// Patch carrying only the fields that differ between `before` and `after`.
  pub fn diff(before: &ProgressRecord, after: &ProgressRecord) -> Self {
    fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
      if a == b { None } else { Some(b.clone()) }
    }
    Self {
      completed: changed(&before.completed, &after.completed),
      last_lesson: changed(&before.last_lesson, &after.last_lesson),
      quiz_passed: changed(&before.quiz_passed, &after.quiz_passed),
      bookmarks: changed(&before.bookmarks, &after.bookmarks),
      last_access: changed(&before.last_access, &after.last_access),
      streak: changed(&before.streak, &after.streak),
    }
  }

  /// Patch that overwrites every field.
  pub fn full(record: &ProgressRecord) -> Self {
    Self {
      completed: Some(record.completed.clone()),
      last_lesson: Some(record.last_lesson.clone()),
      quiz_passed: Some(record.quiz_passed.clone()),
      bookmarks: Some(record.bookmarks.clone()),
      last_access: Some(record.last_access.clone()),
      streak: Some(record.streak),
    }
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  pub fn apply(self, record: &mut ProgressRecord) {
    if let Some(v) = self.completed { record.completed = v; }
    if let Some(v) = self.last_lesson { record.last_lesson = v; }
    if let Some(v) = self.quiz_passed { record.quiz_passed = v; }
    if let Some(v) = self.bookmarks { record.bookmarks = v; }
    if let Some(v) = self.last_access { record.last_access = v; }
    if let Some(v) = self.streak { record.streak = v; }
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
  Light,
  Dark,
  #[default]
  System,
}

impl Theme {
  pub fn as_str(self) -> &'static str {
    match self {
      Theme::Light => "light",
      Theme::Dark => "dark",
      Theme::System => "system",
    }
  }
}

/// How many correct answers a quiz needs.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuizThreshold {
  /// Two thirds of the questions, rounded up.
  #[default]
  TwoThirds,
  All,
}

impl QuizThreshold {
  pub fn as_str(self) -> &'static str {
    match self {
      QuizThreshold::TwoThirds => "two_thirds",
      QuizThreshold::All => "all",
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
  Small,
  #[default]
  Medium,
  Large,
}

impl FontSize {
  pub fn as_str(self) -> &'static str {
    match self {
      FontSize::Small => "small",
      FontSize::Medium => "medium",
      FontSize::Large => "large",
    }
  }
}

pub const SIDEBAR_WIDTH_MIN: u32 = 200;
pub const SIDEBAR_WIDTH_MAX: u32 = 480;
pub const SIDEBAR_WIDTH_DEFAULT: u32 = 288;

/// Per-learner display preferences, each persisted under its own key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
  pub theme: Theme,
  pub quiz_threshold: QuizThreshold,
  pub focus_mode: bool,
  pub font_size: FontSize,
  pub sidebar_width: u32,
  pub install_prompt_dismissed: bool,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      theme: Theme::default(),
      quiz_threshold: QuizThreshold::default(),
      focus_mode: false,
      font_size: FontSize::default(),
      sidebar_width: SIDEBAR_WIDTH_DEFAULT,
      install_prompt_dismissed: false,
    }
  }
}

/// Partial preferences update as accepted over HTTP. Values that do not
/// parse are dropped instead of rejecting the whole update.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
  #[serde(default, deserialize_with = "lenient")] pub theme: Option<Theme>,
  #[serde(default, deserialize_with = "lenient")] pub quiz_threshold: Option<QuizThreshold>,
  #[serde(default, deserialize_with = "lenient")] pub focus_mode: Option<bool>,
  #[serde(default, deserialize_with = "lenient")] pub font_size: Option<FontSize>,
  #[serde(default, deserialize_with = "lenient")] pub sidebar_width: Option<u32>,
  #[serde(default, deserialize_with = "lenient")] pub install_prompt_dismissed: Option<bool>,
}

fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let v = serde_json::Value::deserialize(d)?;
  Ok(serde_json::from_value(v).ok())
}

pub fn clamp_sidebar_width(px: u32) -> u32 {
  px.clamp(SIDEBAR_WIDTH_MIN, SIDEBAR_WIDTH_MAX)
}
