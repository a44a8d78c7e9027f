//! Sidebar: search results, or the progress summary, bookmarks and the four
//! collapsible sections.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};

use crate::catalog::Catalog;
use crate::domain::{LessonItem, SectionKind};
use crate::logic::UiState;
use crate::render::{lesson_href, return_to_field};
use crate::streak::recency;
use crate::util::{contains_ci, encode_segment, escape_html, highlight};

pub fn render_sidebar(catalog: &Catalog, ui: &UiState, now: &DateTime<FixedOffset>) -> String {
    let mut out = String::new();
    out.push_str(&search_box(ui));
    if ui.searching() {
        out.push_str(&search_results(catalog, ui));
    } else {
        out.push_str(&summary(catalog, ui, now));
        out.push_str(&bookmarks(catalog, ui));
        for section in catalog.sections() {
            out.push_str(&section_block(catalog, ui, section.key, &section.title, &section.items));
        }
    }
    out
}

fn search_box(ui: &UiState) -> String {
    let action = match &ui.selected {
        Some(id) => lesson_href(id, ""),
        None => "/".to_string(),
    };
    let mut out = format!(
        r#"<form class="search" method="get" action="{}" role="search"><input type="search" name="q" value="{}" placeholder="Search lessons" aria-label="Search lessons">"#,
        escape_html(&action),
        escape_html(&ui.search)
    );
    if ui.searching() {
        let _ = write!(out, r#" <a class="clear-search" href="{}">Clear</a>"#, escape_html(&action));
    }
    out.push_str("</form>");
    out
}

fn matches(item: &LessonItem, query: &str) -> bool {
    contains_ci(&item.id, query) || contains_ci(&item.title, query) || contains_ci(&item.topics, query)
}

fn search_results(catalog: &Catalog, ui: &UiState) -> String {
    let query = ui.search.trim();
    let hits: Vec<_> = catalog.lessons().filter(|(_, item)| matches(item, query)).collect();
    if hits.is_empty() {
        let clear = match &ui.selected {
            Some(id) => lesson_href(id, ""),
            None => "/".to_string(),
        };
        return format!(
            r#"<div class="search-empty"><p>No lessons match “{}”.</p><a class="clear-search" href="{}">Clear search</a></div>"#,
            escape_html(query),
            escape_html(&clear)
        );
    }

    let mut out = format!(r#"<div class="search-results"><p class="muted">{} result(s)</p><ul>"#, hits.len());
    for (_, item) in hits {
        let selected = ui.selected.as_deref() == Some(item.id.as_str());
        let _ = write!(
            out,
            r#"<li class="lesson-item{}"><a href="{}"{}><span class="badge">{}</span> {}</a><div class="topics">{}</div></li>"#,
            if selected { " is-selected" } else { "" },
            escape_html(&lesson_href(&item.id, "")),
            if selected { r#" aria-current="page""# } else { "" },
            highlight(&item.id, query),
            highlight(&item.title, query),
            highlight(&item.topics, query),
        );
    }
    out.push_str("</ul></div>");
    out
}

fn summary(catalog: &Catalog, ui: &UiState, now: &DateTime<FixedOffset>) -> String {
    let p = &ui.progress;
    let total = catalog.total_lessons();
    let done = catalog.lessons().filter(|(_, i)| p.is_completed(&i.id)).count();
    let quizzes = catalog.quiz_count();
    let passed = p.quiz_passed.iter().filter(|(id, ok)| **ok && catalog.quiz(id).is_some()).count();
    let bookmarks = p.bookmarks.iter().filter(|id| catalog.contains(id)).count();
    let days = if p.streak == 1 { "day" } else { "days" };
    format!(
        r#"<div class="progress-summary banner"><p><strong>{done}</strong>/{total} lessons completed</p><progress value="{done}" max="{total}"></progress><p>Quizzes passed: {passed}/{quizzes}</p><p>Bookmarks: {bookmarks}</p><p>Last visit: {}</p><p>Streak: {} {days}</p></div>"#,
        recency(now, p.last_access.as_deref()),
        p.streak,
    )
}

fn bookmarks(catalog: &Catalog, ui: &UiState) -> String {
    let items: Vec<_> = ui
        .progress
        .bookmarks
        .iter()
        .filter_map(|id| catalog.lesson(id))
        .collect();
    if items.is_empty() {
        return String::new();
    }
    let mut out = String::from(r#"<div class="bookmarks"><h3>Bookmarks</h3><ul>"#);
    for (kind, item) in items {
        out.push_str(&item_row(catalog, ui, kind, item));
    }
    out.push_str("</ul></div>");
    out
}

fn section_block(catalog: &Catalog, ui: &UiState, kind: SectionKind, title: &str, items: &[LessonItem]) -> String {
    let collapsed = ui.is_collapsed(kind);
    let mut out = format!(
        r#"<section class="sidebar-section" data-section="{key}" data-collapsed="{collapsed}"><form class="inline" method="post" action="/sections/{key}/toggle">{ret}<button type="submit" aria-expanded="{expanded}">{arrow} {title}</button></form>"#,
        key = kind.key(),
        ret = return_to_field(ui),
        expanded = !collapsed,
        arrow = if collapsed { "▸" } else { "▾" },
        title = escape_html(title),
    );
    if !collapsed {
        out.push_str("<ul>");
        for item in items {
            out.push_str(&item_row(catalog, ui, kind, item));
        }
        out.push_str("</ul>");
    }
    out.push_str("</section>");
    out
}

fn item_row(catalog: &Catalog, ui: &UiState, kind: SectionKind, item: &LessonItem) -> String {
    let p = &ui.progress;
    let id = encode_segment(&item.id);
    let selected = ui.selected.as_deref() == Some(item.id.as_str());
    let done = p.is_completed(&item.id);
    let starred = p.is_bookmarked(&item.id);
    let ret = return_to_field(ui);

    let mut classes = String::from("lesson-item");
    if selected { classes.push_str(" is-selected"); }
    if done { classes.push_str(" is-complete"); }

    let mut out = format!(r#"<li class="{classes}" data-lesson="{}">"#, escape_html(&item.id));
    let _ = write!(
        out,
        r#"<form class="inline" method="post" action="/lesson/{id}/complete">{ret}<button class="complete-toggle" type="submit" aria-pressed="{done}" title="{}">{}</button></form>"#,
        if done { "Mark as not completed" } else { "Mark as completed" },
        if done { "✓" } else { "○" },
    );
    if kind == SectionKind::Core {
        if let Some(n) = catalog.core_index(&item.id) {
            let _ = write!(out, r#"<span class="badge">{}</span>"#, n + 1);
        }
    }
    let _ = write!(
        out,
        r#"<a href="{}"{}>{}</a>"#,
        escape_html(&lesson_href(&item.id, "")),
        if selected { r#" aria-current="page""# } else { "" },
        escape_html(&item.title),
    );
    if kind == SectionKind::Core && catalog.quiz(&item.id).is_some() {
        let passed = p.quiz_passed(&item.id);
        let _ = write!(
            out,
            r#"<span class="quiz-status {}" title="{}">{}</span>"#,
            if passed { "passed" } else { "pending" },
            if passed { "Quiz passed" } else { "Quiz not attempted" },
            if passed { "🏅" } else { "?" },
        );
    }
    let _ = write!(
        out,
        r#"<form class="inline" method="post" action="/lesson/{id}/bookmark">{ret}<button class="bookmark-star" type="submit" aria-pressed="{starred}" title="{}">{}</button></form>"#,
        if starred { "Remove bookmark" } else { "Bookmark" },
        if starred { "★" } else { "☆" },
    );
    out.push_str("</li>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00+00:00").unwrap()
    }

    fn ui() -> UiState {
        UiState::default()
    }

    #[test]
    fn search_highlights_across_sections() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = ui();
        state.search = "dom".into();
        let html = render_sidebar(&catalog, &state, &now());
        assert!(html.contains("search-results"));
        // Core lesson 19 topics and the help DOM folder both match.
        assert!(html.contains("<mark>DOM</mark> intro"));
        assert!(html.contains(r#"href="/lesson/help-dom""#));
        assert!(!html.contains("progress-summary"));
    }

    #[test]
    fn search_without_hits_offers_clear() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = ui();
        state.search = "<zzz>".into();
        let html = render_sidebar(&catalog, &state, &now());
        assert!(html.contains("No lessons match “&lt;zzz&gt;”."));
        assert!(html.contains("Clear search"));
    }

    #[test]
    fn browse_mode_summarizes_progress() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = ui();
        state.progress.completed.extend(["01".to_string(), "02".to_string(), "ghost".to_string()]);
        state.progress.quiz_passed.insert("01".into(), true);
        state.progress.streak = 1;
        state.progress.last_access = Some("2024-04-30T08:00:00Z".into());
        let html = render_sidebar(&catalog, &state, &now());
        let total = catalog.total_lessons();
        assert!(html.contains(&format!("<strong>2</strong>/{total} lessons completed")));
        assert!(html.contains(&format!("Quizzes passed: 1/{}", catalog.quiz_count())));
        assert!(html.contains("Last visit: yesterday"));
        assert!(html.contains("Streak: 1 day<"));
    }

    #[test]
    fn unknown_bookmarks_are_dropped() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = ui();
        state.progress.bookmarks.insert("ghost".into());
        let html = render_sidebar(&catalog, &state, &now());
        assert!(!html.contains(r#"class="bookmarks""#));
        assert!(html.contains("Bookmarks: 0"));

        state.progress.bookmarks.insert("07".into());
        let html = render_sidebar(&catalog, &state, &now());
        assert!(html.contains(r#"class="bookmarks""#));
        assert!(html.contains("Bookmarks: 1"));
    }

    #[test]
    fn collapsed_section_hides_items() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = ui();
        state.collapsed.insert("help".into(), true);
        let html = render_sidebar(&catalog, &state, &now());
        assert!(html.contains(r#"data-section="help" data-collapsed="true""#));
        assert!(!html.contains(r#"data-lesson="help-dom""#));
        assert!(html.contains(r#"data-lesson="ready-works""#));
    }

    #[test]
    fn core_rows_carry_badge_and_quiz_status() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = ui();
        state.selected = Some("05".into());
        state.progress.quiz_passed.insert("05".into(), true);
        let html = render_sidebar(&catalog, &state, &now());
        assert!(html.contains(r#"<li class="lesson-item is-selected" data-lesson="05">"#));
        assert!(html.contains(r#"<span class="badge">5</span>"#));
        assert!(html.contains(r#"title="Quiz passed""#));
        // Help rows have neither.
        let help_row = html.split(r#"data-lesson="help-bom""#).nth(1).unwrap();
        let help_row = &help_row[..help_row.find("</li>").unwrap()];
        assert!(!help_row.contains("badge"));
        assert!(!help_row.contains("quiz-status"));
    }
}
