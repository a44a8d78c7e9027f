//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable so the page script and the server can evolve separately.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::QuizThreshold;
use crate::logic::Action;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  /// First message after connecting: which page the socket mirrors.
  Hello {
    #[serde(default)]
    lesson: Option<String>,
    #[serde(default)]
    q: String,
  },
  Select { id: String },
  ToggleComplete { id: String },
  ToggleBookmark { id: String },
  Search { query: String },
  ClearSearch,
  ToggleSection { section: String },
  SubmitQuiz { answers: Vec<Option<usize>> },
  RetryQuiz,
  EditPlayground { source: String },
  RunPlayground,
  ResetPlayground,
  ResizePlayground {
    #[serde(default)]
    frame: Option<u32>,
    #[serde(default)]
    editor: Option<u32>,
  },
}

impl ClientWsMessage {
  /// The reducer action for this message, if it is one.
  /// `now` stamps navigation; `threshold` comes from the learner's preferences.
  pub fn into_action(self, now: DateTime<FixedOffset>, threshold: QuizThreshold) -> Option<Action> {
    Some(match self {
      ClientWsMessage::Ping | ClientWsMessage::Hello { .. } => return None,
      ClientWsMessage::Select { id } => Action::Select { id, now: Some(now) },
      ClientWsMessage::ToggleComplete { id } => Action::ToggleComplete { id },
      ClientWsMessage::ToggleBookmark { id } => Action::ToggleBookmark { id },
      ClientWsMessage::Search { query } => Action::Search { query },
      ClientWsMessage::ClearSearch => Action::ClearSearch,
      ClientWsMessage::ToggleSection { section } => Action::ToggleSection { section },
      ClientWsMessage::SubmitQuiz { answers } => Action::SubmitQuiz { answers, threshold },
      ClientWsMessage::RetryQuiz => Action::RetryQuiz,
      ClientWsMessage::EditPlayground { source } => Action::EditPlayground { source },
      ClientWsMessage::RunPlayground => Action::RunPlayground,
      ClientWsMessage::ResetPlayground => Action::ResetPlayground,
      ClientWsMessage::ResizePlayground { frame, editor } => Action::ResizePlayground { frame, editor },
    })
  }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  /// Replacement HTML for the fragments that changed; `None` means unchanged.
  Render {
    #[serde(skip_serializing_if = "Option::is_none")]
    sidebar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lesson: Option<String>,
    /// Address of the view, for `history.replaceState`.
    href: String,
  },
  Error {
    message: String,
  },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

/// `?q=` on page routes.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
  #[serde(default)]
  pub q: String,
}

/// Forms that only need to know where to send the browser afterwards.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnTo {
  #[serde(default)]
  pub return_to: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaygroundOp {
  #[default]
  Run,
  Save,
  Reset,
}

#[derive(Debug, Deserialize)]
pub struct PlaygroundForm {
  #[serde(default)]
  pub source: String,
  #[serde(default)]
  pub op: PlaygroundOp,
}

#[derive(Debug, Serialize)]
pub struct ImportOut {
  pub ok: bool,
  pub message: String,
}
