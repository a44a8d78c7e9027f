//! Tracing setup for the tracker.
//!
//! LOG_LEVEL holds EnvFilter directives ("debug", or per target such as
//! "info,progress=debug,lessons=debug"). An unparsable value falls back to
//! the default filter instead of silencing everything.
//! LOG_FORMAT is "pretty" (default), "compact" or "json".
//!
//! Targets used by the crate: `tracker` (startup, pages, sockets),
//! `progress` (store), `quiz`, `lessons` (lesson router). Per-request spans
//! come from tower-http's TraceLayer.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tracker=debug,progress=info,quiz=info,lessons=info,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn from_env_value(v: Option<&str>) -> Self {
        match v.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(s) if s.eq_ignore_ascii_case("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok();
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_from(level.as_deref()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Each format is its own subscriber type.
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.init(),
    }
}
