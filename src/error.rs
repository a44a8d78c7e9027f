//! Error types. Storage failures never show up here: the store degrades to
//! defaults and logs instead.

use thiserror::Error;

/// Problems with the built-in or configured course data. Fatal at startup.
#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("failed to parse {what}: {source}")]
  Parse {
    what: &'static str,
    #[source]
    source: toml::de::Error,
  },
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("duplicate lesson id '{0}'")]
  DuplicateLesson(String),
  #[error("quiz for unknown lesson '{0}'")]
  UnknownQuizLesson(String),
  #[error("quiz '{lesson}' question {question} has correct index {correct} but only {options} options")]
  CorrectOutOfRange {
    lesson: String,
    question: usize,
    correct: usize,
    options: usize,
  },
}

/// Rejected progress import. The stored record is left untouched.
#[derive(Debug, Error)]
pub enum ImportError {
  #[error("not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("expected a JSON object")]
  NotAnObject,
}

/// Rejected quiz submission. No scoring happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
  /// Zero-based index of the first unanswered question.
  #[error("Please answer question {} before submitting.", .0 + 1)]
  Unanswered(usize),
}
