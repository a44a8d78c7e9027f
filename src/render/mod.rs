//! Server-side HTML rendering.
//!
//! Every view is a plain function from state to a `String`. The page shell
//! embeds two fragments, `sidebar` and `lesson`, which WebSocket clients
//! receive separately and swap in place.

use chrono::{DateTime, FixedOffset};

use crate::catalog::Catalog;
use crate::domain::{Preferences, Theme};
use crate::logic::UiState;
use crate::playground::CONSOLE_SOURCE;
use crate::util::{encode_segment, escape_html, fill_template};

pub mod lesson;
pub mod sidebar;

/// Link to a lesson page (deep link), keeping the search text if any.
pub fn lesson_href(id: &str, search: &str) -> String {
    with_query(format!("/lesson/{}", encode_segment(id)), search)
}

/// Link to the page currently shown to this client.
pub fn current_href(ui: &UiState) -> String {
    match &ui.selected {
        Some(id) => lesson_href(id, &ui.search),
        None => with_query("/".to_string(), &ui.search),
    }
}

fn with_query(path: String, search: &str) -> String {
    if search.trim().is_empty() {
        path
    } else {
        format!("{path}?q={}", encode_segment(search))
    }
}

/// Hidden field telling POST handlers where to send the browser back to.
pub(crate) fn return_to_field(ui: &UiState) -> String {
    format!(r#"<input type="hidden" name="return_to" value="{}">"#, escape_html(&current_href(ui)))
}

/// The two independently replaceable parts of the page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragments {
    pub sidebar: String,
    pub lesson: String,
}

pub fn fragments(catalog: &Catalog, ui: &UiState, prefs: &Preferences, now: &DateTime<FixedOffset>) -> Fragments {
    Fragments {
        sidebar: sidebar::render_sidebar(catalog, ui, now),
        lesson: lesson::render_lesson(catalog, ui, prefs),
    }
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en" data-theme="{theme}" data-font-size="{font_size}" class="{html_class}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
{install}
<div class="layout" style="--sidebar-width: {sidebar_width}px">
<aside id="sidebar" class="sidebar">{sidebar}</aside>
<main id="lesson" class="lesson">{lesson}</main>
</div>
<div id="playground-console-log" class="console-log" aria-live="polite"></div>
<script>{script}</script>
</body>
</html>"#;

const BASE_STYLE: &str = r#"
:root { --bg: #fff; --fg: #1f2937; --muted: #6b7280; --accent: #4f46e5; --card: #f9fafb; }
[data-theme="dark"] { --bg: #111827; --fg: #f3f4f6; --muted: #9ca3af; --accent: #818cf8; --card: #1f2937; }
@media (prefers-color-scheme: dark) { [data-theme="system"] { --bg: #111827; --fg: #f3f4f6; --muted: #9ca3af; --accent: #818cf8; --card: #1f2937; } }
[data-font-size="small"] { font-size: 14px; } [data-font-size="medium"] { font-size: 16px; } [data-font-size="large"] { font-size: 18px; }
body { margin: 0; background: var(--bg); color: var(--fg); font-family: system-ui, sans-serif; }
.layout { display: grid; grid-template-columns: var(--sidebar-width) 1fr; min-height: 100vh; }
.focus-mode .layout { grid-template-columns: 1fr; } .focus-mode .sidebar { display: none; }
.sidebar { border-right: 1px solid var(--muted); padding: 1rem; overflow-y: auto; }
.lesson { padding: 1.5rem; max-width: 60rem; }
.lesson-item { display: flex; align-items: center; gap: .4rem; padding: .15rem 0; }
.lesson-item.is-selected > a { font-weight: 700; color: var(--accent); }
.inline { display: inline; } .inline button { background: none; border: 0; cursor: pointer; color: inherit; }
.badge { font-size: .75em; color: var(--muted); min-width: 1.5em; text-align: right; }
mark { background: #fde68a; color: inherit; }
.banner { background: var(--card); padding: .75rem 1rem; border-radius: .5rem; }
.hint { color: #b45309; }
.question.correct { border-color: #16a34a; } .question.incorrect { border-color: #dc2626; }
.playground textarea { width: 100%; font-family: monospace; }
.playground iframe { width: 100%; border: 1px solid var(--muted); background: #fff; }
.console-log { font-family: monospace; font-size: .85em; }
"#;

// Relays console messages from the sandboxed preview. With /ws available,
// links and forms become messages and the server sends back changed fragments.
const HOST_SCRIPT: &str = r#"
(function () {
  var log = document.getElementById("playground-console-log");
  window.addEventListener("message", function (ev) {
    var d = ev.data;
    if (!d || d.source !== "{console_source}") return;
    var line = document.createElement("div");
    line.className = "console-" + d.level;
    line.textContent = "[" + d.level + "] " + (d.args || []).join(" ");
    log.appendChild(line);
  });
  var dismiss = document.querySelector("[data-dismiss-install]");
  if (dismiss) dismiss.addEventListener("click", function () {
    fetch("/api/v1/prefs", { method: "POST", headers: { "content-type": "application/json" }, body: JSON.stringify({ installPromptDismissed: true }) });
    dismiss.closest(".install-prompt").remove();
  });

  if (!("WebSocket" in window)) return;
  var sock = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws");
  var open = false;
  function send(msg) {
    if (!open) return false;
    sock.send(JSON.stringify(msg));
    return true;
  }
  function lessonOf(path) {
    var m = /^\/lesson\/([^\/]+)$/.exec(path);
    return m ? decodeURIComponent(m[1]) : null;
  }
  function hello() {
    send({ type: "hello", lesson: lessonOf(location.pathname), q: new URLSearchParams(location.search).get("q") || "" });
  }
  sock.onopen = function () { open = true; hello(); };
  sock.onclose = function () { open = false; };
  sock.onmessage = function (ev) {
    var m = JSON.parse(ev.data);
    if (m.type !== "render") return;
    if (m.sidebar != null) document.getElementById("sidebar").innerHTML = m.sidebar;
    if (m.lesson != null) document.getElementById("lesson").innerHTML = m.lesson;
    if (m.href && m.href !== location.pathname + location.search) history.pushState(null, "", m.href);
  };
  window.addEventListener("popstate", hello);
  document.addEventListener("click", function (ev) {
    if (ev.metaKey || ev.ctrlKey || ev.shiftKey) return;
    if (ev.target.closest("a.quiz-retry")) {
      if (send({ type: "retry_quiz" })) ev.preventDefault();
      return;
    }
    if (ev.target.closest("a.clear-search")) {
      if (send({ type: "clear_search" })) ev.preventDefault();
      return;
    }
    var a = ev.target.closest("a[href^='/lesson/']");
    if (!a) return;
    var id = lessonOf(new URL(a.href).pathname);
    if (id && send({ type: "select", id: id })) ev.preventDefault();
  });
  document.addEventListener("submit", function (ev) {
    var f = ev.target, action = f.getAttribute("action") || "", m, msg = null;
    if ((m = /^\/lesson\/([^\/]+)\/complete$/.exec(action))) {
      msg = { type: "toggle_complete", id: decodeURIComponent(m[1]) };
    } else if ((m = /^\/lesson\/([^\/]+)\/bookmark$/.exec(action))) {
      msg = { type: "toggle_bookmark", id: decodeURIComponent(m[1]) };
    } else if ((m = /^\/sections\/([^\/]+)\/toggle$/.exec(action))) {
      msg = { type: "toggle_section", section: m[1] };
    } else if (/\/quiz$/.test(action)) {
      var answers = [];
      f.querySelectorAll("fieldset.question").forEach(function (_, i) {
        var c = f.querySelector("input[name=q" + i + "]:checked");
        answers.push(c ? Number(c.value) : null);
      });
      msg = { type: "submit_quiz", answers: answers };
    } else if (/\/playground$/.test(action)) {
      var op = ev.submitter ? ev.submitter.value : "run";
      if (!send({ type: "edit_playground", source: f.source.value })) return;
      ev.preventDefault();
      if (op === "run") send({ type: "run_playground" });
      if (op === "reset") send({ type: "reset_playground" });
      return;
    } else if (f.classList.contains("search")) {
      msg = { type: "search", query: f.q.value };
    }
    if (msg && send(msg)) ev.preventDefault();
  });
})();
"#;

/// The full tracker page.
pub fn render_page(catalog: &Catalog, ui: &UiState, prefs: &Preferences, now: &DateTime<FixedOffset>) -> String {
    let parts = fragments(catalog, ui, prefs, now);
    let title = ui
        .selected
        .as_deref()
        .and_then(|id| catalog.lesson(id))
        .map(|(_, item)| format!("{} · Learning tracker", item.title))
        .unwrap_or_else(|| "Learning tracker".to_string());
    let install = if prefs.install_prompt_dismissed {
        String::new()
    } else {
        r#"<div class="install-prompt banner">Install this app for quick offline access to the lesson list. <button type="button" data-dismiss-install>Dismiss</button></div>"#.to_string()
    };
    let script = HOST_SCRIPT.replace("{console_source}", CONSOLE_SOURCE);
    let sidebar_width = prefs.sidebar_width.to_string();
    let title = escape_html(&title);
    let pairs = [
        ("theme", prefs.theme.as_str()),
        ("font_size", prefs.font_size.as_str()),
        ("html_class", if prefs.focus_mode { "focus-mode" } else { "" }),
        ("title", title.as_str()),
        ("style", BASE_STYLE),
        ("install", install.as_str()),
        ("sidebar_width", sidebar_width.as_str()),
        ("script", script.as_str()),
    ];
    // Fragments are spliced in after templating so their text is never
    // mistaken for a placeholder.
    let (head, rest) = PAGE_TEMPLATE.split_once("{sidebar}").unwrap_or((PAGE_TEMPLATE, ""));
    let (middle, tail) = rest.split_once("{lesson}").unwrap_or((rest, ""));
    let mut html = fill_template(head, &pairs);
    html.push_str(&parts.sidebar);
    html.push_str(&fill_template(middle, &pairs));
    html.push_str(&parts.lesson);
    html.push_str(&fill_template(tail, &pairs));
    html
}

const THEMED_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en" data-theme="{theme}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}
.viewer { padding: 1.5rem; max-width: 64rem; margin: 0 auto; }
.viewer img, .viewer embed, .viewer iframe { max-width: 100%; }
</style>
</head>
<body>
<div class="viewer">
{body}
</div>
</body>
</html>"#;

/// Standalone page in the tracker's look, used by the lesson router.
/// `body` must already be safe HTML.
pub fn themed_page(title: &str, body: &str, theme: Theme) -> String {
    fill_template(
        THEMED_TEMPLATE,
        &[("theme", theme.as_str()), ("title", &escape_html(title)), ("style", BASE_STYLE), ("body", body)],
    )
}
