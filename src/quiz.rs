//! Quiz scoring. Pure: the caller decides what to persist.

use serde::Serialize;

use crate::domain::{Quiz, QuizThreshold};
use crate::error::QuizError;

/// Result of one scored submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
  pub correct: usize,
  pub total: usize,
  pub threshold: usize,
  pub passed: bool,
  /// Per question: did the selected option match.
  pub per_question: Vec<bool>,
  /// The selections that were scored, kept so feedback can re-check them.
  pub answers: Vec<usize>,
}

impl QuizOutcome {
  pub fn summary(&self) -> String {
    let verdict = if self.passed { "Passed!" } else { "Try again." };
    format!("Score: {}/{} — {}", self.correct, self.total, verdict)
  }
}

/// Number of correct answers needed to pass `total` questions.
pub fn threshold(mode: QuizThreshold, total: usize) -> usize {
  match mode {
    QuizThreshold::TwoThirds => (total * 2).div_ceil(3),
    QuizThreshold::All => total,
  }
}

/// Score `answers` (one optional option index per question).
///
/// Any unanswered question rejects the whole submission, naming the first one.
pub fn score(quiz: &Quiz, answers: &[Option<usize>], mode: QuizThreshold) -> Result<QuizOutcome, QuizError> {
  let total = quiz.questions.len();
  let mut picked = Vec::with_capacity(total);
  for i in 0..total {
    match answers.get(i).copied().flatten() {
      Some(a) => picked.push(a),
      None => return Err(QuizError::Unanswered(i)),
    }
  }

  let per_question: Vec<bool> = quiz.questions.iter().zip(&picked).map(|(q, a)| q.correct == *a).collect();
  let correct = per_question.iter().filter(|ok| **ok).count();
  let needed = threshold(mode, total);
  Ok(QuizOutcome {
    correct,
    total,
    threshold: needed,
    passed: correct >= needed,
    per_question,
    answers: picked,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Question;

  fn quiz(correct: &[usize]) -> Quiz {
    Quiz {
      lesson: "01".into(),
      title: "Lesson 01".into(),
      questions: correct
        .iter()
        .map(|c| Question { prompt: "?".into(), options: vec!["a".into(), "b".into(), "c".into(), "d".into()], correct: *c })
        .collect(),
    }
  }

  #[test]
  fn two_thirds_rounds_up() {
    assert_eq!(threshold(QuizThreshold::TwoThirds, 3), 2);
    assert_eq!(threshold(QuizThreshold::TwoThirds, 4), 3);
    assert_eq!(threshold(QuizThreshold::TwoThirds, 1), 1);
    assert_eq!(threshold(QuizThreshold::TwoThirds, 0), 0);
    assert_eq!(threshold(QuizThreshold::All, 4), 4);
  }

  #[test]
  fn two_of_three_passes_with_two_thirds() {
    let q = quiz(&[1, 2, 1]);
    let out = score(&q, &[Some(1), Some(2), Some(0)], QuizThreshold::TwoThirds).unwrap();
    assert_eq!(out.correct, 2);
    assert!(out.passed);
    assert_eq!(out.per_question, vec![true, true, false]);
    assert_eq!(out.summary(), "Score: 2/3 — Passed!");
  }

  #[test]
  fn two_of_three_fails_when_all_required() {
    let q = quiz(&[1, 2, 1]);
    let out = score(&q, &[Some(1), Some(2), Some(0)], QuizThreshold::All).unwrap();
    assert!(!out.passed);
    assert_eq!(out.summary(), "Score: 2/3 — Try again.");
  }

  #[test]
  fn unanswered_rejects_with_first_gap() {
    let q = quiz(&[0, 0, 0]);
    assert_eq!(score(&q, &[Some(0), None, None], QuizThreshold::TwoThirds), Err(QuizError::Unanswered(1)));
    assert_eq!(score(&q, &[Some(0)], QuizThreshold::TwoThirds), Err(QuizError::Unanswered(1)));
    assert_eq!(
      QuizError::Unanswered(1).to_string(),
      "Please answer question 2 before submitting."
    );
  }

  #[test]
  fn scoring_is_deterministic() {
    let q = quiz(&[3, 0, 2]);
    let answers = [Some(3), Some(1), Some(2)];
    let first = score(&q, &answers, QuizThreshold::TwoThirds).unwrap();
    for _ in 0..5 {
      assert_eq!(score(&q, &answers, QuizThreshold::TwoThirds).unwrap(), first);
    }
  }
}
