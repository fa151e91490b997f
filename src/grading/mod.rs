//! Grading pipeline: prompt -> text generation -> line parser -> bounded result.
//!
//! Every path through this module ends in a well-formed `GradingResult`.
//! Failures are classified into a `GradeStatus` for logging and for callers that
//! want to flag low-confidence grades, but they are never raised.

pub mod fallback;
pub mod generator;
pub mod orchestrator;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use generator::{GenerationError, TextGenerator};
pub use orchestrator::Grader;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Score used whenever the service gave us nothing trustworthy.
pub const NEUTRAL_SCORE: f64 = 50.0;

pub const DEFAULT_FEEDBACK: &str = "No feedback generated";
pub const DEFAULT_IMPROVEMENT: &str = "No suggestions provided";

/// One student answer checked against one reference answer. Never stored.
#[derive(Clone, Debug)]
pub struct GradingRequest<'a> {
  pub student_answer: &'a str,
  pub reference_answer: &'a str,
}

impl<'a> GradingRequest<'a> {
  pub fn new(student_answer: &'a str, reference_answer: &'a str) -> Self {
    Self { student_answer, reference_answer }
  }

  /// Both sides must carry non-whitespace content for a real attempt.
  pub fn is_complete(&self) -> bool {
    !self.student_answer.trim().is_empty() && !self.reference_answer.trim().is_empty()
  }
}

/// The only value the grading core produces.
/// `score` is always within [0, 100]; `feedback` and `improvement` are never empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
  pub score: f64,
  pub feedback: String,
  pub improvement: String,
}

impl GradingResult {
  pub fn new(score: f64, feedback: impl Into<String>, improvement: impl Into<String>) -> Self {
    Self { score: clamp_score(score), feedback: feedback.into(), improvement: improvement.into() }
  }

  pub fn missing_content() -> Self {
    Self::new(0.0, "Missing content", "Please provide complete answers")
  }

  pub fn service_unavailable() -> Self {
    Self::new(NEUTRAL_SCORE, "Grading service unavailable", "Please try again later")
  }

  pub fn malformed_response() -> Self {
    Self::new(NEUTRAL_SCORE, "Grading error", "Could not parse the grading results")
  }

  /// True when the feedback is one of the fixed placeholder strings rather than
  /// something the grader actually wrote.
  pub fn has_placeholder_feedback(&self) -> bool {
    matches!(
      self.feedback.as_str(),
      DEFAULT_FEEDBACK | "Grading service unavailable" | "Grading error"
    )
  }
}

impl Default for GradingResult {
  fn default() -> Self {
    Self::new(NEUTRAL_SCORE, DEFAULT_FEEDBACK, DEFAULT_IMPROVEMENT)
  }
}

/// How a grading attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStatus {
  /// The service answered and the parser produced the result.
  Graded,
  /// Student or reference answer was empty; no call was made.
  InvalidInput,
  /// Transport, HTTP, decode or timeout failure talking to the service.
  ServiceUnavailable,
  /// The service answered with an empty payload.
  MalformedResponse,
  /// The offline similarity scorer produced the result.
  Fallback,
}

impl GradeStatus {
  pub fn is_degraded(self) -> bool {
    matches!(self, GradeStatus::ServiceUnavailable | GradeStatus::MalformedResponse | GradeStatus::Fallback)
  }
}

/// Result plus the diagnostics of the attempt that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct GradeReport {
  pub result: GradingResult,
  pub status: GradeStatus,
  /// Error text for failed attempts.
  pub detail: Option<String>,
}

impl GradeReport {
  /// The score should not be read as a judgement of the answer: degraded
  /// paths, inputs that could not be graded, or a placeholder result.
  pub fn low_confidence(&self) -> bool {
    self.status.is_degraded()
      || self.status == GradeStatus::InvalidInput
      || (self.result.score == NEUTRAL_SCORE && self.result.has_placeholder_feedback())
  }
}

/// Constrain a score to [0, 100]. NaN has no position in the interval and maps to neutral.
pub fn clamp_score(score: f64) -> f64 {
  if score.is_nan() {
    return NEUTRAL_SCORE;
  }
  score.clamp(MIN_SCORE, MAX_SCORE)
}
