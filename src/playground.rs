//! Code playground: starter documents, the edit/run state machine, and the
//! console shim injected into the sandboxed preview.
//!
//! The preview runs in `<iframe sandbox="allow-scripts">` (no same-origin), so
//! the only way out is `postMessage`. The shim wraps `console.log/warn/error`
//! and uncaught errors and posts `{ source, level, args }` to the parent.

use serde::Serialize;

/// Message source tag the host page filters on.
pub const CONSOLE_SOURCE: &str = "lesson-playground";

pub const DEFAULT_FRAME_HEIGHT: u32 = 320;
pub const DEFAULT_EDITOR_HEIGHT: u32 = 280;
const MIN_HEIGHT: u32 = 120;
const MAX_HEIGHT: u32 = 1200;

pub const DEFAULT_STARTER: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Playground</title></head>
<body>
  <h1>Hello from the playground</h1>
  <p id="out">Edit HTML/JS and click Run.</p>
  <script>
    document.getElementById('out').textContent = 'You ran the code at ' + new Date().toLocaleTimeString();
  </script>
</body>
</html>"#;

const STARTER_01: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Hello</title></head>
<body>
  <h1>Hello from the playground</h1>
  <p id="out">Edit and click Run.</p>
  <script>
    document.getElementById('out').textContent = 'Ran at ' + new Date().toLocaleTimeString();
  </script>
</body>
</html>"#;

const STARTER_19: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>DOM intro</title></head>
<body>
  <p id="target">Change me.</p>
  <button id="btn">Click</button>
  <script>
    document.getElementById('btn').addEventListener('click', function() {
      document.getElementById('target').textContent = 'Clicked at ' + new Date().toLocaleTimeString();
    });
  </script>
</body>
</html>"#;

const STARTER_22: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Slider</title></head>
<body>
  <div class="slider-wrap" style="padding: 1rem;">
    <input type="range" id="slider" min="0" max="100" value="50" style="width: 200px;">
    <output id="value">50</output>
  </div>
  <script>
    var slider = document.getElementById('slider');
    var output = document.getElementById('value');
    slider.addEventListener('input', function() {
      output.textContent = slider.value;
    });
  </script>
</body>
</html>"#;

const STARTER_26: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Digital clock</title></head>
<body>
  <div style="font-family: monospace; font-size: 2rem; padding: 1rem;" id="clock">--:--:--</div>
  <script>
    function tick() {
      var now = new Date();
      document.getElementById('clock').textContent = now.toLocaleTimeString();
    }
    tick();
    setInterval(tick, 1000);
  </script>
</body>
</html>"#;

/// Lesson-specific starter, if one exists.
pub fn lesson_starter(lesson_id: &str) -> Option<&'static str> {
  match lesson_id {
    "01" => Some(STARTER_01),
    "19" => Some(STARTER_19),
    "22" => Some(STARTER_22),
    "26" => Some(STARTER_26),
    _ => None,
  }
}

pub fn starter_for(lesson_id: Option<&str>) -> &'static str {
  lesson_id.and_then(lesson_starter).unwrap_or(DEFAULT_STARTER)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  #[default]
  Idle,
  Dirty,
  Rendered,
}

/// Editor contents and what the preview currently shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Playground {
  pub source: String,
  pub phase: Phase,
  /// The source the preview was last run with.
  pub rendered: Option<String>,
  pub frame_height: u32,
  pub editor_height: u32,
}

impl Default for Playground {
  fn default() -> Self {
    Self::new(DEFAULT_STARTER.to_string())
  }
}

impl Playground {
  pub fn new(source: String) -> Self {
    Self {
      source,
      phase: Phase::Idle,
      rendered: None,
      frame_height: DEFAULT_FRAME_HEIGHT,
      editor_height: DEFAULT_EDITOR_HEIGHT,
    }
  }

  pub fn edit(mut self, source: String) -> Self {
    if source != self.source {
      self.source = source;
      self.phase = Phase::Dirty;
    }
    self
  }

  pub fn run(mut self) -> Self {
    self.rendered = Some(self.source.clone());
    self.phase = Phase::Rendered;
    self
  }

  /// Replace the source with the lesson's starter (or the generic one).
  pub fn reset(self, lesson_id: Option<&str>) -> Self {
    self.edit(starter_for(lesson_id).to_string())
  }

  pub fn resize(mut self, frame: Option<u32>, editor: Option<u32>) -> Self {
    if let Some(h) = frame { self.frame_height = h.clamp(MIN_HEIGHT, MAX_HEIGHT); }
    if let Some(h) = editor { self.editor_height = h.clamp(MIN_HEIGHT, MAX_HEIGHT); }
    self
  }
}

/// The script inserted into every previewed document.
pub fn console_shim() -> String {
  format!(
    r#"<script>(function () {{
  var SOURCE = "{CONSOLE_SOURCE}";
  function fmt(v) {{
    if (typeof v === "string") return v;
    try {{ return JSON.stringify(v); }} catch (e) {{ return String(v); }}
  }}
  function send(level, args) {{
    try {{
      parent.postMessage({{ source: SOURCE, level: level, args: Array.prototype.map.call(args, fmt) }}, "*");
    }} catch (e) {{}}
  }}
  ["log", "warn", "error"].forEach(function (level) {{
    var orig = console[level];
    console[level] = function () {{
      send(level, arguments);
      if (orig) orig.apply(console, arguments);
    }};
  }});
  window.addEventListener("error", function (ev) {{ send("error", [ev.message]); }});
}})();</script>"#
  )
}

/// `source` with the console shim placed before any user script runs.
pub fn with_console_shim(source: &str) -> String {
  let shim = console_shim();
  let lower = source.to_ascii_lowercase();
  let at = lower
    .find("<head")
    .and_then(|i| lower[i..].find('>').map(|j| i + j + 1))
    .or_else(|| lower.find("<html").and_then(|i| lower[i..].find('>').map(|j| i + j + 1)));
  match at {
    Some(pos) => format!("{}{}{}", &source[..pos], shim, &source[pos..]),
    None => format!("{shim}{source}"),
  }
}
