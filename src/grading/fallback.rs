//! Offline similarity scorer used when the text-generation service is disabled
//! or unreachable. Crude by nature: shared vocabulary, not meaning.

use std::collections::HashSet;

use super::GradingResult;

pub const FALLBACK_FEEDBACK: &str = "Basic evaluation";
pub const FALLBACK_IMPROVEMENT: &str = "Compare your answer with the reference material";

/// Distinct lowercase words shared by both answers, over the total word count
/// of the reference, scaled to 100 and capped there.
pub fn similarity_score(student_answer: &str, reference_answer: &str) -> f64 {
  let total_words = reference_answer.split_whitespace().count();
  if total_words == 0 {
    return 0.0;
  }

  let student_lower = student_answer.to_lowercase();
  let reference_lower = reference_answer.to_lowercase();
  let student: HashSet<&str> = student_lower.split_whitespace().collect();
  let reference: HashSet<&str> = reference_lower.split_whitespace().collect();
  let common = student.intersection(&reference).count();

  (common as f64 / total_words as f64 * 100.0).min(100.0)
}

pub fn fallback_grade(student_answer: &str, reference_answer: &str) -> GradingResult {
  GradingResult::new(
    similarity_score(student_answer, reference_answer),
    FALLBACK_FEEDBACK,
    FALLBACK_IMPROVEMENT,
  )
}
