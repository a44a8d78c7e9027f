//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! All user interaction goes through `reduce(ctx, state, action)`, a pure
//! function from one `UiState` to the next. Callers persist whatever changed
//! (see `AppState::commit`) and then render.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::catalog::Catalog;
use crate::domain::{ProgressRecord, QuizThreshold, SectionKind};
use crate::error::QuizError;
use crate::playground::Playground;
use crate::quiz::{score, QuizOutcome};
use crate::store::toggle;
use crate::streak;

/// Feedback shown under the quiz of the selected lesson.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizFeedback {
  Scored(QuizOutcome),
  Rejected { first_unanswered: usize, message: String },
}

/// Everything one client sees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiState {
  pub progress: ProgressRecord,
  pub selected: Option<String>,
  pub search: String,
  /// Section key -> collapsed.
  pub collapsed: BTreeMap<String, bool>,
  pub quiz: Option<QuizFeedback>,
  pub playground: Playground,
}

impl UiState {
  pub fn is_collapsed(&self, section: SectionKind) -> bool {
    self.collapsed.get(section.key()).copied().unwrap_or(false)
  }

  pub fn searching(&self) -> bool {
    !self.search.trim().is_empty()
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
  /// Navigate to a lesson; records the visit for the streak.
  Select {
    id: String,
    #[serde(skip)]
    now: Option<DateTime<FixedOffset>>,
  },
  ToggleComplete { id: String },
  ToggleBookmark { id: String },
  Search { query: String },
  ClearSearch,
  ToggleSection { section: String },
  /// Option index per question of the selected lesson's quiz.
  SubmitQuiz {
    answers: Vec<Option<usize>>,
    #[serde(default)]
    threshold: QuizThreshold,
  },
  RetryQuiz,
  EditPlayground { source: String },
  RunPlayground,
  ResetPlayground,
  ResizePlayground {
    #[serde(default)] frame: Option<u32>,
    #[serde(default)] editor: Option<u32>,
  },
}

impl Action {
  pub fn name(&self) -> &'static str {
    match self {
      Action::Select { .. } => "select",
      Action::ToggleComplete { .. } => "toggle_complete",
      Action::ToggleBookmark { .. } => "toggle_bookmark",
      Action::Search { .. } => "search",
      Action::ClearSearch => "clear_search",
      Action::ToggleSection { .. } => "toggle_section",
      Action::SubmitQuiz { .. } => "submit_quiz",
      Action::RetryQuiz => "retry_quiz",
      Action::EditPlayground { .. } => "edit_playground",
      Action::RunPlayground => "run_playground",
      Action::ResetPlayground => "reset_playground",
      Action::ResizePlayground { .. } => "resize_playground",
    }
  }
}

/// Apply one action. Pure: time comes in with `Select`.
#[instrument(level = "debug", skip(catalog, state), fields(action = action.name()))]
pub fn reduce(catalog: &Catalog, state: UiState, action: Action) -> UiState {
  let mut next = state;
  match action {
    Action::Select { id, now } => {
      if !catalog.contains(&id) {
        debug!(target: "tracker", %id, "Select of unknown lesson; clearing selection");
        next.selected = None;
        next.quiz = None;
        return next;
      }
      if next.selected.as_deref() != Some(id.as_str()) {
        next.quiz = None;
      }
      if let Some(now) = now {
        let (stamp, streak) = streak::touch(&now, next.progress.last_access.as_deref(), next.progress.streak);
        next.progress.last_access = Some(stamp);
        next.progress.streak = streak;
      }
      next.progress.last_lesson = Some(id.clone());
      next.selected = Some(id);
    }
    Action::ToggleComplete { id } => {
      next.progress.completed = toggle(&next.progress.completed, &id);
    }
    Action::ToggleBookmark { id } => {
      next.progress.bookmarks = toggle(&next.progress.bookmarks, &id);
    }
    Action::Search { query } => {
      next.search = query;
    }
    Action::ClearSearch => {
      next.search.clear();
    }
    Action::ToggleSection { section } => {
      if SectionKind::from_key(&section).is_some() {
        let entry = next.collapsed.entry(section).or_insert(false);
        *entry = !*entry;
      }
    }
    Action::SubmitQuiz { answers, threshold } => {
      let Some(lesson) = next.selected.clone() else {
        return next;
      };
      let Some(quiz) = catalog.quiz(&lesson) else {
        return next;
      };
      next.quiz = Some(match score(quiz, &answers, threshold) {
        Ok(outcome) => {
          if outcome.passed && !next.progress.quiz_passed(&lesson) {
            next.progress.quiz_passed.insert(lesson.clone(), true);
          }
          QuizFeedback::Scored(outcome)
        }
        Err(e @ QuizError::Unanswered(i)) => QuizFeedback::Rejected { first_unanswered: i, message: e.to_string() },
      });
    }
    Action::RetryQuiz => {
      next.quiz = None;
    }
    Action::EditPlayground { source } => {
      next.playground = next.playground.edit(source);
    }
    Action::RunPlayground => {
      next.playground = next.playground.run();
    }
    Action::ResetPlayground => {
      let lesson = next.selected.clone();
      next.playground = next.playground.reset(lesson.as_deref());
    }
    Action::ResizePlayground { frame, editor } => {
      next.playground = next.playground.resize(frame, editor);
    }
  }
  next
}

/// First prerequisite of `lesson_id` that is not completed yet.
pub fn first_missing_prerequisite<'a>(catalog: &'a Catalog, progress: &ProgressRecord, lesson_id: &str) -> Option<&'a str> {
  let (_, item) = catalog.lesson(lesson_id)?;
  item.prerequisites.iter().map(String::as_str).find(|p| !progress.is_completed(p))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::playground::Phase;

  fn catalog() -> Catalog {
    Catalog::builtin().unwrap()
  }

  fn now(s: &str) -> Option<DateTime<FixedOffset>> {
    Some(DateTime::parse_from_rfc3339(s).unwrap())
  }

  #[test]
  fn select_records_visit_and_streak() {
    let c = catalog();
    let s = reduce(&c, UiState::default(), Action::Select { id: "03".into(), now: now("2024-05-01T10:00:00+00:00") });
    assert_eq!(s.selected.as_deref(), Some("03"));
    assert_eq!(s.progress.last_lesson.as_deref(), Some("03"));
    assert_eq!(s.progress.streak, 1);

    let s = reduce(&c, s, Action::Select { id: "04".into(), now: now("2024-05-02T09:00:00+00:00") });
    assert_eq!(s.progress.streak, 2);
  }

  #[test]
  fn select_unknown_clears_selection() {
    let c = catalog();
    let s = reduce(&c, UiState::default(), Action::Select { id: "03".into(), now: None });
    let s = reduce(&c, s, Action::Select { id: "nope".into(), now: None });
    assert_eq!(s.selected, None);
    assert_eq!(s.progress.last_lesson.as_deref(), Some("03"));
  }

  #[test]
  fn prerequisites_met_after_completing_earlier_lessons() {
    let c = catalog();
    let mut s = UiState::default();
    for id in ["01", "02", "03", "04"] {
      s = reduce(&c, s, Action::ToggleComplete { id: id.into() });
    }
    assert_eq!(first_missing_prerequisite(&c, &s.progress, "05"), None);
    assert_eq!(first_missing_prerequisite(&c, &s.progress, "06"), Some("05"));
  }

  #[test]
  fn passing_quiz_sets_flag_once() {
    let c = catalog();
    let s = reduce(&c, UiState::default(), Action::Select { id: "01".into(), now: None });
    let correct: Vec<Option<usize>> = c.quiz("01").unwrap().questions.iter().map(|q| Some(q.correct)).collect();

    let s = reduce(&c, s, Action::SubmitQuiz { answers: correct, threshold: QuizThreshold::All });
    assert!(s.progress.quiz_passed("01"));

    // A later failing attempt does not clear the pass.
    let s = reduce(&c, s, Action::SubmitQuiz { answers: vec![Some(3), Some(3), Some(3)], threshold: QuizThreshold::All });
    assert!(s.progress.quiz_passed("01"));
    assert!(matches!(s.quiz, Some(QuizFeedback::Scored(ref o)) if !o.passed));

    let s = reduce(&c, s, Action::RetryQuiz);
    assert_eq!(s.quiz, None);
  }

  #[test]
  fn unanswered_quiz_is_rejected_without_scoring() {
    let c = catalog();
    let s = reduce(&c, UiState::default(), Action::Select { id: "02".into(), now: None });
    let s = reduce(&c, s, Action::SubmitQuiz { answers: vec![Some(0), None, Some(1)], threshold: QuizThreshold::TwoThirds });
    assert_eq!(
      s.quiz,
      Some(QuizFeedback::Rejected { first_unanswered: 1, message: "Please answer question 2 before submitting.".into() })
    );
    assert!(!s.progress.quiz_passed("02"));
  }

  #[test]
  fn toggle_section_ignores_unknown_keys() {
    let c = catalog();
    let s = reduce(&c, UiState::default(), Action::ToggleSection { section: "help".into() });
    assert!(s.is_collapsed(SectionKind::Help));
    let s = reduce(&c, s, Action::ToggleSection { section: "help".into() });
    assert!(!s.is_collapsed(SectionKind::Help));
    let s = reduce(&c, s, Action::ToggleSection { section: "bogus".into() });
    assert!(!s.collapsed.contains_key("bogus"));
  }

  #[test]
  fn reset_uses_selected_lesson_starter() {
    let c = catalog();
    let s = reduce(&c, UiState::default(), Action::Select { id: "26".into(), now: None });
    let s = reduce(&c, s, Action::ResetPlayground);
    assert!(s.playground.source.contains("Digital clock"));
    assert_eq!(s.playground.phase, Phase::Dirty);
  }

  #[test]
  fn actions_parse_from_tagged_json() {
    let a: Action = serde_json::from_str(r#"{"type":"toggle_complete","id":"05"}"#).unwrap();
    assert!(matches!(a, Action::ToggleComplete { id } if id == "05"));
    let a: Action = serde_json::from_str(r#"{"type":"submit_quiz","answers":[1,null,0]}"#).unwrap();
    assert!(matches!(a, Action::SubmitQuiz { answers, threshold: QuizThreshold::TwoThirds } if answers == vec![Some(1), None, Some(0)]));
  }
}
