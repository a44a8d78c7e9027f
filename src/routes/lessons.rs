//! Lesson router: serves the lesson folders that live next to the tracker.
//!
//! Mounted as middleware in front of the static app. Requests whose first
//! path segment is not a known lesson root, or that resolve outside the
//! lessons root, or that name a missing file, go to the next handler.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
  body::Body,
  extract::{Query, Request, State},
  http::{header, HeaderValue, Method, StatusCode},
  middleware::Next,
  response::{Html, IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, instrument, warn};

use crate::domain::Theme;
use crate::render::themed_page;
use crate::state::AppState;
use crate::util::{encode_path, encode_segment, escape_html};

#[derive(Debug, Default, Deserialize)]
struct LessonQuery {
  raw: Option<String>,
  view: Option<String>,
}

impl LessonQuery {
  fn raw(&self) -> bool {
    self.raw.as_deref() == Some("1")
  }

  fn carousel(&self) -> bool {
    self.view.as_deref() == Some("carousel")
  }
}

/// Content type for a file name, by extension.
pub fn mime_for(name: &str) -> &'static str {
  let ext = Path::new(name)
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase)
    .unwrap_or_default();
  match ext.as_str() {
    "html" | "htm" => "text/html; charset=utf-8",
    "md" => "text/markdown; charset=utf-8",
    "js" => "application/javascript",
    "css" => "text/css",
    "json" => "application/json",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "svg" => "image/svg+xml",
    "webp" => "image/webp",
    "ico" => "image/x-icon",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    "ttf" => "font/ttf",
    "pdf" => "application/pdf",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    _ => "application/octet-stream",
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Viewer {
  Image,
  Pdf,
  Docx,
}

fn viewer_for(name: &str) -> Option<Viewer> {
  match mime_for(name) {
    "application/pdf" => Some(Viewer::Pdf),
    m if m.starts_with("application/vnd.openxmlformats") => Some(Viewer::Docx),
    m if m.starts_with("image/") => Some(Viewer::Image),
    _ => None,
  }
}

fn is_image(name: &str) -> bool {
  viewer_for(name) == Some(Viewer::Image)
}

/// Decode `uri_path` and resolve it lexically under `root`.
///
/// Returns the relative components, or `None` when the first segment is not
/// an allowed lesson root or when `..` would climb above `root`.
pub fn resolve_lexical(uri_path: &str, roots: &BTreeSet<String>) -> Option<Vec<String>> {
  let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
  if decoded.contains('\0') || decoded.contains('\\') {
    return None;
  }
  let first = decoded.trim_start_matches('/').split('/').next()?;
  if !roots.contains(first) {
    return None;
  }
  let mut parts: Vec<String> = Vec::new();
  for seg in decoded.split('/') {
    match seg {
      "" | "." => {}
      ".." => {
        parts.pop()?;
      }
      s => parts.push(s.to_string()),
    }
  }
  match parts.first() {
    Some(first) if roots.contains(first) => Some(parts),
    _ => None,
  }
}

/// Full resolution: lexical, then canonical (follows symlinks) and confined to `root`.
async fn resolve(root: &Path, roots: &BTreeSet<String>, uri_path: &str) -> Option<PathBuf> {
  let parts = resolve_lexical(uri_path, roots)?;
  let joined = parts.iter().fold(root.to_path_buf(), |p, s| p.join(s));
  let canonical = tokio::fs::canonicalize(&joined).await.ok()?;
  if canonical.starts_with(root) {
    Some(canonical)
  } else {
    warn!(target: "lessons", path = %uri_path, "Resolved path escapes the lessons root");
    None
  }
}

/// Middleware entry point.
#[instrument(level = "debug", skip_all, fields(path = %req.uri().path()))]
pub async fn lesson_router(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
  if req.method() != Method::GET && req.method() != Method::HEAD {
    return next.run(req).await;
  }
  let uri_path = req.uri().path().to_string();
  let Some(fs_path) = resolve(&state.lessons_root, &state.lesson_roots, &uri_path).await else {
    return next.run(req).await;
  };
  let Ok(meta) = tokio::fs::metadata(&fs_path).await else {
    return next.run(req).await;
  };
  let query = Query::<LessonQuery>::try_from_uri(req.uri()).map(|q| q.0).unwrap_or_default();
  let theme = state.store.preferences().theme;

  if meta.is_dir() {
    if !uri_path.ends_with('/') {
      let location = match req.uri().query() {
        Some(q) => format!("{uri_path}/?{q}"),
        None => format!("{uri_path}/"),
      };
      debug!(target: "lessons", %location, "Directory redirect");
      return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response();
    }
    let index = fs_path.join("index.html");
    if tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
      return serve_file(&index, "index.html", req).await;
    }
    return serve_listing(&fs_path, &uri_path, &query, theme).await;
  }

  let name = fs_path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
  if !query.raw() {
    if mime_for(&name).starts_with("text/markdown") {
      return serve_markdown(&fs_path, &name, theme).await;
    }
    if let Some(kind) = viewer_for(&name) {
      return Html(viewer_page(&name, kind, theme)).into_response();
    }
  }
  serve_file(&fs_path, &name, req).await
}

async fn serve_file(path: &Path, name: &str, req: Request) -> Response {
  let mut resp = match ServeFile::new(path).oneshot(req).await {
    Ok(resp) => resp.map(Body::new),
    Err(never) => match never {},
  };
  if resp.status().is_success() {
    resp.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(mime_for(name)));
  }
  debug!(target: "lessons", file = %name, status = %resp.status(), "Lesson file served");
  resp
}

/// Markdown to sanitized HTML.
pub fn markdown_to_html(input: &str) -> String {
  let mut options = pulldown_cmark::Options::empty();
  options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
  options.insert(pulldown_cmark::Options::ENABLE_TABLES);
  options.insert(pulldown_cmark::Options::ENABLE_TASKLISTS);

  let parser = pulldown_cmark::Parser::new_ext(input, options);
  let mut html = String::new();
  pulldown_cmark::html::push_html(&mut html, parser);
  ammonia::clean(&html)
}

async fn serve_markdown(path: &Path, name: &str, theme: Theme) -> Response {
  match tokio::fs::read(path).await {
    Ok(bytes) => {
      let text = String::from_utf8_lossy(&bytes);
      let body = format!(
        r#"<article class="markdown">{}</article><p><a href="?raw=1">View source</a></p>"#,
        markdown_to_html(&text)
      );
      Html(themed_page(name, &body, theme)).into_response()
    }
    Err(e) => {
      warn!(target: "lessons", file = %name, error = %e, "Markdown read failed");
      (StatusCode::INTERNAL_SERVER_ERROR, "Error reading file").into_response()
    }
  }
}

fn viewer_page(name: &str, kind: Viewer, theme: Theme) -> String {
  let raw = format!("{}?raw=1", encode_segment(name));
  let raw = escape_html(&raw);
  let title = escape_html(name);
  let body = match kind {
    Viewer::Image => format!(r#"<h1>{title}</h1><img src="{raw}" alt="{title}">"#),
    Viewer::Pdf => format!(
      r#"<h1>{title}</h1><embed src="{raw}" type="application/pdf" width="100%" height="800"><p><a href="{raw}">Open PDF</a></p>"#
    ),
    Viewer::Docx => format!(
      r#"<h1>{title}</h1><p>Word documents cannot be previewed in the browser.</p><p><a href="{raw}" download="{title}">Download {title}</a></p>"#
    ),
  };
  themed_page(name, &body, theme)
}

struct Entry {
  name: String,
  is_dir: bool,
}

async fn read_entries(dir: &Path) -> std::io::Result<Vec<Entry>> {
  let mut rd = tokio::fs::read_dir(dir).await?;
  let mut out = Vec::new();
  while let Some(e) = rd.next_entry().await? {
    let is_dir = e.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
    out.push(Entry { name: e.file_name().to_string_lossy().into_owned(), is_dir });
  }
  out.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
  Ok(out)
}

async fn serve_listing(dir: &Path, uri_path: &str, query: &LessonQuery, theme: Theme) -> Response {
  let entries = match read_entries(dir).await {
    Ok(e) => e,
    Err(e) => {
      warn!(target: "lessons", dir = %dir.display(), error = %e, "Directory listing failed");
      return (StatusCode::INTERNAL_SERVER_ERROR, "Error listing directory").into_response();
    }
  };
  let decoded = percent_decode_str(uri_path).decode_utf8_lossy().into_owned();
  let base = format!("/{}/", encode_path(decoded.trim_matches('/')));
  let images: Vec<String> = entries
    .iter()
    .filter(|e| !e.is_dir && is_image(&e.name))
    .map(|e| format!("{base}{}?raw=1", encode_segment(&e.name)))
    .collect();

  if query.carousel() && images.len() >= 2 {
    return Html(carousel_page(&decoded, &images, theme)).into_response();
  }
  Html(listing_page(&decoded, &base, &entries, images.len(), theme)).into_response()
}

fn listing_page(title: &str, base: &str, entries: &[Entry], image_count: usize, theme: Theme) -> String {
  let mut body = format!("<h1>{}</h1>", escape_html(title));
  if image_count >= 2 {
    body.push_str(&format!(
      r#"<p><a class="carousel-link" href="?view=carousel">View {image_count} images as a carousel</a></p>"#
    ));
  }
  body.push_str(r#"<ul class="listing">"#);
  for e in entries {
    let slash = if e.is_dir { "/" } else { "" };
    body.push_str(&format!(
      r#"<li><a href="{}">{}{slash}</a></li>"#,
      escape_html(&format!("{base}{}{slash}", encode_segment(&e.name))),
      escape_html(&e.name),
    ));
  }
  body.push_str("</ul>");
  themed_page(title, &body, theme)
}

fn carousel_page(title: &str, images: &[String], theme: Theme) -> String {
  let urls = serde_json::to_string(images).unwrap_or_else(|_| "[]".into());
  // Keep the JSON inert inside <script>.
  let urls = urls.replace("</", "<\\/");
  let body = format!(
    r#"<h1>{}</h1>
<div class="carousel"><img id="slide" alt=""><p><button type="button" id="prev">←</button> <span id="pos"></span> <button type="button" id="next">→</button> <a href="./">Back to listing</a></p></div>
<script>
(function () {{
  var urls = {urls};
  var i = 0;
  var img = document.getElementById("slide");
  var pos = document.getElementById("pos");
  function show(n) {{
    i = (n + urls.length) % urls.length;
    img.src = urls[i];
    pos.textContent = (i + 1) + " / " + urls.length;
  }}
  document.getElementById("prev").onclick = function () {{ show(i - 1); }};
  document.getElementById("next").onclick = function () {{ show(i + 1); }};
  document.addEventListener("keydown", function (ev) {{
    if (ev.key === "ArrowLeft") show(i - 1);
    if (ev.key === "ArrowRight") show(i + 1);
  }});
  show(0);
}})();
</script>"#,
    escape_html(title)
  );
  themed_page(title, &body, theme)
}
