//! Line-oriented scanner for the grading service reply.
//!
//! Expected shape (any order, extra lines ignored):
//!
//! ```text
//! SCORE: 85
//! FEEDBACK: ...
//! IMPROVEMENT: ...
//! ```
//!
//! The scanner is total: every input produces a result, and a bad field only
//! costs that field its value.

use super::{clamp_score, GradingResult, DEFAULT_FEEDBACK, DEFAULT_IMPROVEMENT, NEUTRAL_SCORE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
  Score,
  Feedback,
  Improvement,
}

/// Recognized prefixes. Matching is case-sensitive and anchored at line start.
const PREFIXES: [(&str, Field); 3] = [
  ("SCORE:", Field::Score),
  ("FEEDBACK:", Field::Feedback),
  ("IMPROVEMENT:", Field::Improvement),
];

fn scan_line(line: &str) -> Option<(Field, &str)> {
  PREFIXES
    .iter()
    .find_map(|(prefix, field)| line.strip_prefix(prefix).map(|rest| (*field, rest.trim())))
}

/// Parse a score value. Non-finite NaN is treated as unparseable.
fn parse_score(raw: &str) -> Option<f64> {
  raw.parse::<f64>().ok().filter(|v| !v.is_nan()).map(clamp_score)
}

/// Map a raw service reply to a `GradingResult`.
///
/// Later lines overwrite earlier ones for the same prefix, except that an
/// unparseable SCORE keeps whatever score was already held.
pub fn parse(raw_text: &str) -> GradingResult {
  let mut score = NEUTRAL_SCORE;
  let mut feedback: Option<&str> = None;
  let mut improvement: Option<&str> = None;

  for (field, value) in raw_text.lines().filter_map(scan_line) {
    match field {
      Field::Score => {
        if let Some(v) = parse_score(value) {
          score = v;
        }
      }
      Field::Feedback => feedback = Some(value),
      Field::Improvement => improvement = Some(value),
    }
  }

  // An empty remainder ("FEEDBACK:") would break the non-empty invariant.
  let feedback = feedback.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_FEEDBACK);
  let improvement = improvement.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_IMPROVEMENT);

  GradingResult::new(score, feedback, improvement)
}
