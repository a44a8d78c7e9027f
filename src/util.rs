//! Small utility helpers used across modules.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for ch in s.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(ch),
    }
  }
  out
}

// Same set encodeURIComponent leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'!')
  .remove(b'~')
  .remove(b'*')
  .remove(b'\'')
  .remove(b'(')
  .remove(b')');

/// Percent-encode one URL path segment.
pub fn encode_segment(s: &str) -> String {
  utf8_percent_encode(s, COMPONENT).to_string()
}

/// Percent-encode a relative path, keeping the `/` separators.
pub fn encode_path(path: &str) -> String {
  path.split('/').map(encode_segment).collect::<Vec<_>>().join("/")
}

/// Byte ranges of every case-insensitive occurrence of `needle` in `hay`.
/// Matches do not overlap. An empty needle matches nothing.
pub fn find_ci(hay: &str, needle: &str) -> Vec<(usize, usize)> {
  let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
  if needle.is_empty() {
    return Vec::new();
  }
  let mut out = Vec::new();
  let mut start = 0;
  'outer: while start < hay.len() {
    let mut want = needle.iter();
    let mut pending = want.next();
    for (off, ch) in hay[start..].char_indices() {
      for lc in ch.to_lowercase() {
        match pending {
          Some(w) if *w == lc => pending = want.next(),
          _ => {
            start += hay[start..].chars().next().map_or(1, char::len_utf8);
            continue 'outer;
          }
        }
      }
      if pending.is_none() {
        let end = start + off + ch.len_utf8();
        out.push((start, end));
        start = end;
        continue 'outer;
      }
    }
    break;
  }
  out
}

/// True if `needle` occurs in `hay`, ignoring case.
pub fn contains_ci(hay: &str, needle: &str) -> bool {
  !find_ci(hay, needle).is_empty()
}

/// Escape `text` and wrap each case-insensitive match of `needle` in `<mark>`.
pub fn highlight(text: &str, needle: &str) -> String {
  let mut out = String::with_capacity(text.len() + 16);
  let mut last = 0;
  for (s, e) in find_ci(text, needle) {
    out.push_str(&escape_html(&text[last..s]));
    out.push_str("<mark>");
    out.push_str(&escape_html(&text[s..e]));
    out.push_str("</mark>");
    last = e;
  }
  out.push_str(&escape_html(&text[last..]));
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
