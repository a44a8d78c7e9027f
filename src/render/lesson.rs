//! Lesson view: metadata, completion banner with prerequisite hint, core
//! navigation, the playground and the quiz.

use std::fmt::Write as _;

use crate::catalog::Catalog;
use crate::domain::{LessonItem, Preferences, Quiz, SectionKind};
use crate::logic::{first_missing_prerequisite, QuizFeedback, UiState};
use crate::playground::{with_console_shim, Phase};
use crate::quiz::threshold;
use crate::render::{lesson_href, return_to_field};
use crate::util::{encode_path, encode_segment, escape_html};

pub fn render_lesson(catalog: &Catalog, ui: &UiState, prefs: &Preferences) -> String {
    let Some((kind, item)) = ui.selected.as_deref().and_then(|id| catalog.lesson(id)) else {
        return empty_state();
    };

    let mut out = String::from(r#"<article class="lesson-view">"#);
    out.push_str(&header(catalog, kind, item));
    out.push_str(&banner(catalog, ui, item));
    if kind == SectionKind::Core {
        out.push_str(&core_nav(catalog, &item.id));
    }
    out.push_str(&playground(ui, item));
    if let Some(quiz) = catalog.quiz(&item.id) {
        out.push_str(&quiz_form(ui, item, quiz, prefs));
    }
    out.push_str("</article>");
    out
}

fn empty_state() -> String {
    r#"<div class="lesson-empty"><h2>Select a lesson</h2><p>Pick a lesson from the sidebar to see its topics, practice in the playground and take the quiz.</p></div>"#.to_string()
}

/// URL of the lesson material as served by the lesson router.
pub fn material_href(item: &LessonItem) -> String {
    let path = encode_path(item.path.trim_matches('/'));
    let is_file = item.path.rsplit('/').next().is_some_and(|last| last.contains('.'));
    if is_file { format!("/{path}") } else { format!("/{path}/") }
}

fn header(catalog: &Catalog, kind: SectionKind, item: &LessonItem) -> String {
    let section_title = catalog
        .sections()
        .iter()
        .find(|s| s.key == kind)
        .map(|s| s.title.as_str())
        .unwrap_or_default();
    let mut out = format!(
        r#"<header><p class="muted">{}</p><h1>{}</h1><p class="topics">{}</p><p><a class="open-material" href="{}" target="_blank" rel="noopener">Open lesson folder</a></p>"#,
        escape_html(section_title),
        escape_html(&item.title),
        escape_html(&item.topics),
        escape_html(&material_href(item)),
    );
    let related: Vec<_> = item.related.iter().filter_map(|id| catalog.lesson(id)).collect();
    if !related.is_empty() {
        out.push_str(r#"<p class="related">Related: "#);
        let links: Vec<String> = related
            .iter()
            .map(|(_, r)| format!(r#"<a href="{}">{}</a>"#, escape_html(&lesson_href(&r.id, "")), escape_html(&r.title)))
            .collect();
        out.push_str(&links.join(", "));
        out.push_str("</p>");
    }
    out.push_str("</header>");
    out
}

fn banner(catalog: &Catalog, ui: &UiState, item: &LessonItem) -> String {
    let done = ui.progress.is_completed(&item.id);
    let mut out = format!(
        r#"<div class="banner completion{}"><form class="inline" method="post" action="/lesson/{}/complete">{}"#,
        if done { " is-complete" } else { "" },
        encode_segment(&item.id),
        return_to_field(ui),
    );
    if done {
        out.push_str(r#"<span>✓ You completed this lesson.</span> <button type="submit">Mark as not completed</button>"#);
    } else {
        out.push_str(r#"<span>Not completed yet.</span> <button type="submit">Mark as completed</button>"#);
    }
    out.push_str("</form>");
    if !done {
        if let Some(missing) = first_missing_prerequisite(catalog, &ui.progress, &item.id) {
            let title = catalog.lesson(missing).map(|(_, l)| l.title.as_str()).unwrap_or(missing);
            let _ = write!(
                out,
                r#"<p class="hint">Tip: complete <a href="{}">{}</a> first.</p>"#,
                escape_html(&lesson_href(missing, "")),
                escape_html(title),
            );
        }
    }
    out.push_str("</div>");
    out
}

fn core_nav(catalog: &Catalog, id: &str) -> String {
    let (prev, next) = catalog.core_neighbours(id);
    let mut out = String::from(r#"<nav class="lesson-nav">"#);
    if let Some(p) = prev {
        let _ = write!(out, r#"<a rel="prev" href="{}">← {}</a>"#, escape_html(&lesson_href(&p.id, "")), escape_html(&p.title));
    }
    if let Some(n) = next {
        let _ = write!(out, r#"<a rel="next" href="{}">{} →</a>"#, escape_html(&lesson_href(&n.id, "")), escape_html(&n.title));
    }
    out.push_str("</nav>");
    out
}

fn playground(ui: &UiState, item: &LessonItem) -> String {
    let pg = &ui.playground;
    let phase = match pg.phase {
        Phase::Idle => "idle",
        Phase::Dirty => "dirty",
        Phase::Rendered => "rendered",
    };
    let mut out = format!(
        r#"<section class="playground" data-phase="{phase}"><h2>Playground</h2><form method="post" action="/lesson/{}/playground"><textarea name="source" spellcheck="false" style="height: {}px">{}</textarea><div class="playground-actions"><button type="submit" name="op" value="run">Run</button> <button type="submit" name="op" value="save">Save</button> <button type="submit" name="op" value="reset">Reset to starter</button></div></form>"#,
        encode_segment(&item.id),
        pg.editor_height,
        escape_html(&pg.source),
    );
    if let Some(rendered) = &pg.rendered {
        let _ = write!(
            out,
            r#"<iframe class="playground-preview" title="Playground preview" sandbox="allow-scripts" style="height: {}px" srcdoc="{}"></iframe>"#,
            pg.frame_height,
            escape_html(&with_console_shim(rendered)),
        );
    }
    out.push_str("</section>");
    out
}

fn quiz_form(ui: &UiState, item: &LessonItem, quiz: &Quiz, prefs: &Preferences) -> String {
    let scored = match &ui.quiz {
        Some(QuizFeedback::Scored(o)) => Some(o),
        _ => None,
    };
    let needed = threshold(prefs.quiz_threshold, quiz.questions.len());
    let mut out = format!(
        r#"<section class="quiz" id="quiz"><h2>{}</h2><p class="muted">Pass with {} of {} correct.</p>"#,
        escape_html(&quiz.title),
        needed,
        quiz.questions.len(),
    );
    if ui.progress.quiz_passed(&item.id) {
        out.push_str(r#"<p class="quiz-passed">🏅 You have passed this quiz. Retrying is optional.</p>"#);
    }
    let _ = write!(out, r#"<form method="post" action="/lesson/{}/quiz">"#, encode_segment(&item.id));
    for (i, q) in quiz.questions.iter().enumerate() {
        let verdict = scored.and_then(|o| o.per_question.get(i).copied());
        let class = match verdict {
            Some(true) => " correct",
            Some(false) => " incorrect",
            None => "",
        };
        let _ = write!(
            out,
            r#"<fieldset class="question{class}" id="quiz-q{i}"><legend>{}. {}</legend>"#,
            i + 1,
            escape_html(&q.prompt),
        );
        let picked = scored.and_then(|o| o.answers.get(i).copied());
        for (j, option) in q.options.iter().enumerate() {
            let _ = write!(
                out,
                r#"<label><input type="radio" name="q{i}" value="{j}"{}> {}</label>"#,
                if picked == Some(j) { " checked" } else { "" },
                escape_html(option),
            );
        }
        match verdict {
            Some(true) => out.push_str(r#"<p class="feedback ok">✓ Correct</p>"#),
            Some(false) => {
                let answer = q.options.get(q.correct).map(String::as_str).unwrap_or_default();
                let _ = write!(out, r#"<p class="feedback wrong">✗ Correct answer: {}</p>"#, escape_html(answer));
            }
            None => {}
        }
        out.push_str("</fieldset>");
    }
    out.push_str(r#"<button type="submit">Submit answers</button></form>"#);

    match &ui.quiz {
        Some(QuizFeedback::Scored(o)) => {
            let _ = write!(
                out,
                r#"<p class="quiz-result {}">{}</p><a class="quiz-retry" href="{}#quiz">Retry</a>"#,
                if o.passed { "passed" } else { "failed" },
                escape_html(&o.summary()),
                escape_html(&lesson_href(&item.id, &ui.search)),
            );
        }
        Some(QuizFeedback::Rejected { first_unanswered, message }) => {
            let _ = write!(
                out,
                r##"<p class="quiz-error" role="alert">{} <a href="#quiz-q{}">Go to question</a></p>"##,
                escape_html(message),
                first_unanswered,
            );
        }
        None => {}
    }
    out.push_str("</section>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuizThreshold;
    use crate::logic::{reduce, Action};

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    fn select(c: &Catalog, id: &str) -> UiState {
        reduce(c, UiState::default(), Action::Select { id: id.into(), now: None })
    }

    #[test]
    fn nothing_selected_shows_prompt() {
        let html = render_lesson(&catalog(), &UiState::default(), &Preferences::default());
        assert!(html.contains("Select a lesson"));
    }

    #[test]
    fn first_missing_prerequisite_is_named() {
        let c = catalog();
        let html = render_lesson(&c, &select(&c, "05"), &Preferences::default());
        assert!(html.contains(r#"Tip: complete <a href="/lesson/04">04_GiveLesson</a> first."#));
    }

    #[test]
    fn no_hint_once_prerequisites_are_done() {
        let c = catalog();
        let mut ui = select(&c, "05");
        for id in ["01", "02", "03", "04"] {
            ui = reduce(&c, ui, Action::ToggleComplete { id: id.into() });
        }
        let html = render_lesson(&c, &ui, &Preferences::default());
        assert!(!html.contains("Tip: complete"));
    }

    #[test]
    fn help_lessons_have_no_nav_or_quiz() {
        let c = catalog();
        let html = render_lesson(&c, &select(&c, "help-regexp"), &Preferences::default());
        assert!(!html.contains("lesson-nav"));
        assert!(!html.contains(r#"class="quiz""#));
        assert!(html.contains(r#"href="/About_My_Lessons_HELP_FILES/RegExp/""#));
    }

    #[test]
    fn file_lessons_link_without_trailing_slash() {
        let c = catalog();
        let (_, item) = c.lesson("help-difficult").unwrap();
        assert_eq!(material_href(item), "/About_My_Lessons_HELP_FILES/Difficult_Tasks_by_js.html");
    }

    #[test]
    fn core_nav_links_neighbours() {
        let c = catalog();
        let html = render_lesson(&c, &select(&c, "05"), &Preferences::default());
        assert!(html.contains(r#"<a rel="prev" href="/lesson/04">"#));
        assert!(html.contains(r#"<a rel="next" href="/lesson/06">"#));
    }

    #[test]
    fn scored_quiz_shows_result_and_marks() {
        let c = catalog();
        let ui = select(&c, "01");
        let ui = reduce(&c, ui, Action::SubmitQuiz { answers: vec![Some(1), Some(2), Some(0)], threshold: QuizThreshold::TwoThirds });
        let html = render_lesson(&c, &ui, &Preferences::default());
        assert!(html.contains("Score: 2/3 — Passed!"));
        assert!(html.contains(r#"<fieldset class="question incorrect" id="quiz-q2">"#));
        assert!(html.contains(r#"name="q0" value="1" checked"#));
        assert!(html.contains("You have passed this quiz"));
    }

    #[test]
    fn rejected_quiz_points_at_first_gap() {
        let c = catalog();
        let ui = select(&c, "01");
        let ui = reduce(&c, ui, Action::SubmitQuiz { answers: vec![Some(1)], threshold: QuizThreshold::TwoThirds });
        let html = render_lesson(&c, &ui, &Preferences::default());
        assert!(html.contains("Please answer question 2 before submitting."));
        assert!(html.contains(r##"href="#quiz-q1""##));
        assert!(!html.contains("Score:"));
    }

    #[test]
    fn preview_only_after_run() {
        let c = catalog();
        let ui = select(&c, "01");
        let html = render_lesson(&c, &ui, &Preferences::default());
        assert!(!html.contains("playground-preview"));

        let ui = reduce(&c, ui, Action::RunPlayground);
        let html = render_lesson(&c, &ui, &Preferences::default());
        assert!(html.contains(r#"sandbox="allow-scripts""#));
        assert!(!html.contains("allow-same-origin"));
        assert!(html.contains(r#"data-phase="rendered""#));
    }
}
