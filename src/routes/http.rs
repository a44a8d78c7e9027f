//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; page handlers render the full tracker page,
//! form posts redirect back to the page they came from.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::{Html, IntoResponse, Redirect, Response},
  Form, Json,
};
use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use tracing::{info, instrument, warn};

use crate::domain::{PreferencesPatch, ProgressPatch};
use crate::logic::{Action, UiState};
use crate::protocol::*;
use crate::render::{lesson_href, render_page};
use crate::state::AppState;
use crate::transfer;
use crate::util::trunc_for_log;

fn now() -> DateTime<FixedOffset> {
  Local::now().fixed_offset()
}

/// Only same-site absolute paths are accepted as redirect targets.
pub fn safe_return_to(candidate: Option<String>, fallback: String) -> String {
  match candidate {
    Some(p) if p.starts_with('/') && !p.starts_with("//") && !p.contains('\\') => p,
    _ => fallback,
  }
}

fn page(state: &AppState, ui: &UiState) -> Html<String> {
  let prefs = state.store.preferences();
  Html(render_page(&state.catalog, ui, &prefs, &now()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn page_index(State(state): State<Arc<AppState>>, Query(q): Query<PageQuery>) -> impl IntoResponse {
  let ui = state.session(None, q.q);
  page(&state, &ui)
}

/// Deep link. Counts as a visit for the streak.
#[instrument(level = "info", skip(state))]
pub async fn page_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<PageQuery>,
) -> Response {
  let known = state.catalog.contains(&id);
  let ui = state.session(None, q.q);
  let ui = state.dispatch(ui, Action::Select { id: id.clone(), now: Some(now()) });
  if !known {
    warn!(target: "tracker", %id, "Unknown lesson requested");
    return (StatusCode::NOT_FOUND, page(&state, &ui)).into_response();
  }
  info!(target: "tracker", %id, streak = ui.progress.streak, "Lesson page served");
  page(&state, &ui).into_response()
}

#[instrument(level = "info", skip(state, form))]
pub async fn post_complete(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Form(form): Form<ReturnTo>,
) -> Redirect {
  let ui = state.dispatch(state.session(None, String::new()), Action::ToggleComplete { id: id.clone() });
  info!(target: "progress", %id, completed = ui.progress.is_completed(&id), "Completion toggled");
  Redirect::to(&safe_return_to(form.return_to, lesson_href(&id, "")))
}

#[instrument(level = "info", skip(state, form))]
pub async fn post_bookmark(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Form(form): Form<ReturnTo>,
) -> Redirect {
  let ui = state.dispatch(state.session(None, String::new()), Action::ToggleBookmark { id: id.clone() });
  info!(target: "progress", %id, bookmarked = ui.progress.is_bookmarked(&id), "Bookmark toggled");
  Redirect::to(&safe_return_to(form.return_to, lesson_href(&id, "")))
}

#[instrument(level = "info", skip(state, form))]
pub async fn post_section_toggle(
  State(state): State<Arc<AppState>>,
  Path(key): Path<String>,
  Form(form): Form<ReturnTo>,
) -> Redirect {
  let _ = state.dispatch(state.session(None, String::new()), Action::ToggleSection { section: key });
  Redirect::to(&safe_return_to(form.return_to, "/".to_string()))
}

/// Quiz form: fields `q0..qN` carry the chosen option index.
#[instrument(level = "info", skip(state, form), fields(fields = form.len()))]
pub async fn post_quiz(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Form(form): Form<HashMap<String, String>>,
) -> Response {
  let Some(quiz) = state.catalog.quiz(&id) else {
    return Redirect::to(&lesson_href(&id, "")).into_response();
  };
  let answers: Vec<Option<usize>> = (0..quiz.questions.len())
    .map(|i| form.get(&format!("q{i}")).and_then(|v| v.trim().parse().ok()))
    .collect();
  let threshold = state.store.preferences().quiz_threshold;
  let ui = state.dispatch(state.session(Some(id.clone()), String::new()), Action::SubmitQuiz { answers, threshold });
  info!(target: "quiz", %id, passed = ui.progress.quiz_passed(&id), "Quiz submitted");
  page(&state, &ui).into_response()
}

#[instrument(level = "info", skip(state, form), fields(op = ?form.op, source_len = form.source.len()))]
pub async fn post_playground(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Form(form): Form<PlaygroundForm>,
) -> Response {
  let ui = state.session(Some(id), String::new());
  let ui = state.dispatch(ui, Action::EditPlayground { source: form.source });
  let ui = match form.op {
    PlaygroundOp::Run => state.dispatch(ui, Action::RunPlayground),
    PlaygroundOp::Save => ui,
    PlaygroundOp::Reset => state.dispatch(ui, Action::ResetPlayground),
  };
  page(&state, &ui).into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_export_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
  let doc = transfer::export(&state.store.load(), &stamp);
  (
    [(header::CONTENT_DISPOSITION, r#"attachment; filename="learning-progress.json""#)],
    Json(doc),
  )
}

/// Replaces the stored record in one save; a rejected document changes nothing.
#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_import_progress(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
  match transfer::import(&body) {
    Ok(record) => {
      let saved = state.store.save(ProgressPatch::full(&record));
      info!(target: "progress", completed = saved.completed.len(), "Progress imported");
      (StatusCode::OK, Json(ImportOut { ok: true, message: "Progress imported.".into() }))
    }
    Err(e) => {
      warn!(target: "progress", error = %e, body = %trunc_for_log(&body, 120), "Progress import rejected");
      (StatusCode::BAD_REQUEST, Json(ImportOut { ok: false, message: format!("Import failed: {e}") }))
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_prefs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.store.preferences())
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_prefs(
  State(state): State<Arc<AppState>>,
  Json(patch): Json<PreferencesPatch>,
) -> impl IntoResponse {
  Json(state.store.update_preferences(patch))
}
