//! Router assembly: pages, form posts, JSON API, WebSocket upgrade, the lesson
//! router, static files, CORS and HTTP tracing.

use std::sync::Arc;

use axum::{
  middleware,
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod lessons;
pub mod ws;

/// Build the application router with:
/// - server-rendered pages at `/` and `/lesson/:id` plus their form posts
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - the lesson router in front of the static app (index fallback)
/// - CORS (allow any origin/method/headers) and per-request trace spans
pub fn build_router(state: Arc<AppState>) -> Router {
  let index = state.static_dir.join("index.html");
  let static_service = ServeDir::new(&state.static_dir)
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new(index));

  Router::new()
    // Pages and forms
    .route("/", get(http::page_index))
    .route("/lesson/:id", get(http::page_lesson))
    .route("/lesson/:id/complete", post(http::post_complete))
    .route("/lesson/:id/bookmark", post(http::post_bookmark))
    .route("/lesson/:id/quiz", post(http::post_quiz))
    .route("/lesson/:id/playground", post(http::post_playground))
    .route("/sections/:key/toggle", post(http::post_section_toggle))
    // WebSocket
    .route("/ws", get(ws::ws_upgrade))
    // HTTP API
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/progress/export", get(http::http_export_progress))
    .route("/api/v1/progress/import", post(http::http_import_progress))
    .route("/api/v1/prefs", get(http::http_get_prefs).post(http::http_post_prefs))
    // Everything else: lesson folders, then the static app
    .fallback_service(static_service)
    .layer(middleware::from_fn_with_state(state.clone(), lessons::lesson_router))
    // State + CORS + HTTP tracing
    .with_state(state)
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
  };
  use serde_json::Value;
  use tower::ServiceExt;

  use crate::catalog::Catalog;
  use crate::store::ProgressStore;

  struct Harness {
    _dir: tempfile::TempDir,
    app: Router,
  }

  fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<p>app shell</p>").unwrap();
    std::fs::create_dir_all(dir.path().join("EXAM")).unwrap();
    std::fs::write(dir.path().join("EXAM/task.html"), "<p>exam</p>").unwrap();

    let state = AppState::new(Catalog::builtin().unwrap(), ProgressStore::in_memory(), dir.path().to_path_buf(), static_dir);
    Harness { _dir: dir, app: build_router(Arc::new(state)) }
  }

  async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
  }

  fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
  }

  fn form_req(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn json_req(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  #[tokio::test]
  async fn health_ok() {
    let h = harness();
    let (status, _, body) = send(&h.app, get_req("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"ok":true}"#);
  }

  #[tokio::test]
  async fn deep_link_renders_lesson_and_counts_visit() {
    let h = harness();
    let (status, _, body) = send(&h.app, get_req("/lesson/05")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>05_GiveLesson</h1>"));
    assert!(body.contains("Streak: 1 day<"));
  }

  #[tokio::test]
  async fn unknown_lesson_is_404_page() {
    let h = harness();
    let (status, _, body) = send(&h.app, get_req("/lesson/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Select a lesson"));
  }

  #[tokio::test]
  async fn complete_redirects_back_and_persists() {
    let h = harness();
    let (status, headers, _) = send(&h.app, form_req("/lesson/01/complete", "return_to=%2Flesson%2F02%3Fq%3Dx")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/lesson/02?q=x");

    let (_, _, body) = send(&h.app, get_req("/api/v1/progress/export")).await;
    let doc: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["completed"], serde_json::json!(["01"]));
    assert_eq!(doc["version"], 2);
    assert!(doc["exportedAt"].is_string());
  }

  #[tokio::test]
  async fn quiz_submission_scores_and_persists() {
    let h = harness();
    let (status, _, body) = send(&h.app, form_req("/lesson/01/quiz", "q0=1&q1=2&q2=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Score: 2/3 — Passed!"));

    let (_, _, body) = send(&h.app, get_req("/api/v1/progress/export")).await;
    let doc: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["quizPassed"]["01"], true);
  }

  #[tokio::test]
  async fn quiz_with_gap_is_rejected() {
    let h = harness();
    let (_, _, body) = send(&h.app, form_req("/lesson/01/quiz", "q0=1&q2=0")).await;
    assert!(body.contains("Please answer question 2 before submitting."));
  }

  #[tokio::test]
  async fn playground_run_shows_preview() {
    let h = harness();
    let (_, _, body) = send(&h.app, form_req("/lesson/01/playground", "source=%3Cp%3Ehi%3C%2Fp%3E&op=run")).await;
    assert!(body.contains("playground-preview"));
  }

  #[tokio::test]
  async fn import_rejects_garbage_and_keeps_progress() {
    let h = harness();
    send(&h.app, form_req("/lesson/03/complete", "")).await;

    let (status, _, body) = send(&h.app, json_req("/api/v1/progress/import", "[1,2]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let out: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(out["ok"], false);

    let (_, _, body) = send(&h.app, get_req("/api/v1/progress/export")).await;
    let doc: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["completed"], serde_json::json!(["03"]));
  }

  #[tokio::test]
  async fn import_replaces_record() {
    let h = harness();
    let (status, _, _) = send(
      &h.app,
      json_req("/api/v1/progress/import", r#"{"version":2,"completed":["01","02"],"bookmarks":["help-dom"],"streak":4}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = send(&h.app, get_req("/api/v1/progress/export")).await;
    let doc: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["completed"], serde_json::json!(["01", "02"]));
    assert_eq!(doc["bookmarks"], serde_json::json!(["help-dom"]));
    assert_eq!(doc["streak"], 4);
  }

  #[tokio::test]
  async fn prefs_update_is_partial_and_clamped() {
    let h = harness();
    let (_, _, body) = send(&h.app, json_req("/api/v1/prefs", r#"{"theme":"dark","sidebarWidth":9000,"fontSize":"huge"}"#)).await;
    let prefs: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(prefs["theme"], "dark");
    assert_eq!(prefs["sidebarWidth"], 480);
    assert_eq!(prefs["fontSize"], "medium");

    let (_, _, body) = send(&h.app, get_req("/")).await;
    assert!(body.contains(r#"data-theme="dark""#));
  }

  #[tokio::test]
  async fn lesson_folders_and_static_fallback() {
    let h = harness();
    let (status, _, body) = send(&h.app, get_req("/EXAM/task.html")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<p>exam</p>");

    let (_, _, body) = send(&h.app, get_req("/some/client/route")).await;
    assert_eq!(body, "<p>app shell</p>");
  }
}
