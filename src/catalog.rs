//! Built-in course data: the lesson catalog and the quiz bank.
//!
//! Both ship as TOML under `data/` and are embedded at compile time, so the
//! tracker is useful without any external files. Config may point at override
//! files with the same schema.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Deserialize;
use tracing::info;

use crate::domain::{LessonItem, Quiz, Section, SectionKind};
use crate::error::CatalogError;

const BUILTIN_COURSE: &str = include_str!("../data/course.toml");
const BUILTIN_QUIZZES: &str = include_str!("../data/quizzes.toml");

#[derive(Deserialize)]
struct CourseFile {
  #[serde(default)] extra_roots: Vec<String>,
  sections: Vec<Section>,
}

#[derive(Deserialize)]
struct QuizFile {
  #[serde(default)] quizzes: Vec<Quiz>,
}

/// Immutable course data shared by every request.
#[derive(Clone, Debug)]
pub struct Catalog {
  sections: Vec<Section>,
  quizzes: BTreeMap<String, Quiz>,
  extra_roots: Vec<String>,
}

impl Catalog {
  pub fn builtin() -> Result<Self, CatalogError> {
    Self::from_toml(BUILTIN_COURSE, BUILTIN_QUIZZES)
  }

  /// Load, falling back to the embedded file for whichever path is `None`.
  pub fn load(course_path: Option<&str>, quizzes_path: Option<&str>) -> Result<Self, CatalogError> {
    let read = |path: &str| {
      std::fs::read_to_string(path).map_err(|source| CatalogError::Read { path: path.to_string(), source })
    };
    let course = match course_path {
      Some(p) => read(p)?,
      None => BUILTIN_COURSE.to_string(),
    };
    let quizzes = match quizzes_path {
      Some(p) => read(p)?,
      None => BUILTIN_QUIZZES.to_string(),
    };
    let catalog = Self::from_toml(&course, &quizzes)?;
    info!(
      target: "tracker",
      lessons = catalog.total_lessons(),
      quizzes = catalog.quizzes.len(),
      custom_course = course_path.is_some(),
      custom_quizzes = quizzes_path.is_some(),
      "Course catalog loaded"
    );
    Ok(catalog)
  }

  pub fn from_toml(course: &str, quizzes: &str) -> Result<Self, CatalogError> {
    let course: CourseFile =
      toml::from_str(course).map_err(|source| CatalogError::Parse { what: "course catalog", source })?;
    let quizzes: QuizFile =
      toml::from_str(quizzes).map_err(|source| CatalogError::Parse { what: "quiz bank", source })?;

    let mut sections = course.sections;
    sections.sort_by_key(|s| s.key);

    let mut seen = HashSet::new();
    for item in sections.iter().flat_map(|s| s.items.iter()) {
      if !seen.insert(item.id.clone()) {
        return Err(CatalogError::DuplicateLesson(item.id.clone()));
      }
    }

    let mut by_lesson = BTreeMap::new();
    for quiz in quizzes.quizzes {
      if !seen.contains(&quiz.lesson) {
        return Err(CatalogError::UnknownQuizLesson(quiz.lesson));
      }
      for (i, q) in quiz.questions.iter().enumerate() {
        if q.correct >= q.options.len() {
          return Err(CatalogError::CorrectOutOfRange {
            lesson: quiz.lesson.clone(),
            question: i,
            correct: q.correct,
            options: q.options.len(),
          });
        }
      }
      by_lesson.insert(quiz.lesson.clone(), quiz);
    }

    Ok(Self { sections, quizzes: by_lesson, extra_roots: course.extra_roots })
  }

  pub fn sections(&self) -> &[Section] {
    &self.sections
  }

  pub fn lessons(&self) -> impl Iterator<Item = (SectionKind, &LessonItem)> {
    self.sections.iter().flat_map(|s| s.items.iter().map(move |i| (s.key, i)))
  }

  pub fn lesson(&self, id: &str) -> Option<(SectionKind, &LessonItem)> {
    self.lessons().find(|(_, item)| item.id == id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.lesson(id).is_some()
  }

  pub fn total_lessons(&self) -> usize {
    self.sections.iter().map(|s| s.items.len()).sum()
  }

  pub fn quiz(&self, lesson_id: &str) -> Option<&Quiz> {
    self.quizzes.get(lesson_id)
  }

  pub fn quiz_count(&self) -> usize {
    self.quizzes.len()
  }

  fn core(&self) -> &[LessonItem] {
    self.sections
      .iter()
      .find(|s| s.key == SectionKind::Core)
      .map(|s| s.items.as_slice())
      .unwrap_or(&[])
  }

  /// Position in the core sequence, if the lesson is a core lesson.
  pub fn core_index(&self, id: &str) -> Option<usize> {
    self.core().iter().position(|i| i.id == id)
  }

  /// Previous and next lessons in the core sequence.
  pub fn core_neighbours(&self, id: &str) -> (Option<&LessonItem>, Option<&LessonItem>) {
    let core = self.core();
    match self.core_index(id) {
      Some(i) => (i.checked_sub(1).and_then(|p| core.get(p)), core.get(i + 1)),
      None => (None, None),
    }
  }

  /// First path segment of every lesson folder the lesson router may serve.
  pub fn lesson_roots(&self) -> BTreeSet<String> {
    self.lessons()
      .filter_map(|(_, item)| item.path.split('/').next())
      .filter(|seg| !seg.is_empty())
      .map(str::to_string)
      .chain(self.extra_roots.iter().cloned())
      .collect()
  }
}
