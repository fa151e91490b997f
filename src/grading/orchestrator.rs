//! Grading orchestrator: input checks, prompt construction, the bounded call to
//! the text-generation service, and conversion of every outcome into a result.

use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use super::fallback::fallback_grade;
use super::parser::parse;
use super::{GenerationError, GradeReport, GradeStatus, GradingRequest, GradingResult, TextGenerator};
use crate::config::{bounded_permits, GradingMode, GradingSettings, Prompts};
use crate::util::{fill_template, trunc_for_log};

pub struct Grader {
  generator: Option<Arc<dyn TextGenerator>>,
  prompts: Prompts,
  mode: GradingMode,
  timeout: Duration,
  permits: Arc<Semaphore>,
}

impl Grader {
  /// Without a generator every mode degrades to `Offline`.
  pub fn new(settings: &GradingSettings, prompts: Prompts, generator: Option<Arc<dyn TextGenerator>>) -> Self {
    let mode = match (&generator, settings.mode) {
      (None, GradingMode::Ai | GradingMode::AiWithFallback) => {
        warn!(target: "grading", requested = settings.mode.as_str(), "No text generator configured; grading offline");
        GradingMode::Offline
      }
      (_, m) => m,
    };
    info!(
      target: "grading",
      mode = mode.as_str(),
      generator = generator.as_ref().map(|g| g.name()).unwrap_or("none"),
      timeout_secs = settings.timeout_secs,
      max_concurrent = settings.max_concurrent,
      "Grader ready"
    );
    Self {
      generator,
      prompts,
      mode,
      timeout: Duration::from_secs(settings.timeout_secs),
      permits: Arc::new(Semaphore::new(bounded_permits(settings.max_concurrent))),
    }
  }

  /// Override the per-call deadline.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn mode(&self) -> GradingMode {
    self.mode
  }

  pub fn generator_name(&self) -> Option<&str> {
    self.generator.as_deref().map(|g| g.name())
  }

  pub fn build_prompt(&self, req: &GradingRequest<'_>) -> String {
    fill_template(
      &self.prompts.grading_user_template,
      &[("reference_answer", req.reference_answer), ("student_answer", req.student_answer)],
    )
  }

  /// Grade one answer. Never fails.
  pub async fn grade(&self, student_answer: &str, reference_answer: &str) -> GradingResult {
    self.grade_detailed(&GradingRequest::new(student_answer, reference_answer)).await.result
  }

  /// Grade one answer and report how the result was obtained.
  #[instrument(
    level = "info",
    skip(self, req),
    fields(mode = self.mode.as_str(), student_len = req.student_answer.len(), reference_len = req.reference_answer.len())
  )]
  pub async fn grade_detailed(&self, req: &GradingRequest<'_>) -> GradeReport {
    if !req.is_complete() {
      return GradeReport { result: GradingResult::missing_content(), status: GradeStatus::InvalidInput, detail: None };
    }

    let generator = match (&self.generator, self.mode) {
      (Some(g), GradingMode::Ai | GradingMode::AiWithFallback) => g,
      _ => return self.offline(req, None),
    };

    let prompt = self.build_prompt(req);
    let start = std::time::Instant::now();
    let outcome = self.call_service(&**generator, &prompt).await;
    let elapsed = start.elapsed();

    let (status, detail) = match outcome {
      Ok(text) if !text.trim().is_empty() => {
        debug!(target: "grading", ?elapsed, reply = %trunc_for_log(&text, 300), "Grading reply received");
        let result = parse(&text);
        info!(target: "grading", ?elapsed, score = result.score, "Answer graded");
        return GradeReport { result, status: GradeStatus::Graded, detail: None };
      }
      Ok(_) => {
        let detail = "empty response from text generator".to_string();
        error!(target: "grading", ?elapsed, generator = generator.name(), error = %detail, "Malformed grading reply");
        (GradeStatus::MalformedResponse, detail)
      }
      Err(e) => {
        let detail = e.to_string();
        error!(target: "grading", ?elapsed, generator = generator.name(), error = %detail, "Grading service call failed");
        (GradeStatus::ServiceUnavailable, detail)
      }
    };

    if self.mode == GradingMode::AiWithFallback {
      warn!(target: "grading", "Falling back to offline similarity scoring");
      return self.offline(req, Some(detail));
    }

    let result = match status {
      GradeStatus::MalformedResponse => GradingResult::malformed_response(),
      _ => GradingResult::service_unavailable(),
    };
    GradeReport { result, status, detail: Some(detail) }
  }

  fn offline(&self, req: &GradingRequest<'_>, detail: Option<String>) -> GradeReport {
    let result = fallback_grade(req.student_answer, req.reference_answer);
    debug!(target: "grading", score = result.score, "Answer graded offline");
    GradeReport { result, status: GradeStatus::Fallback, detail }
  }

  /// One bounded call: waiting for a permit counts against the same deadline.
  async fn call_service(&self, generator: &dyn TextGenerator, prompt: &str) -> Result<String, GenerationError> {
    let call = async {
      let _permit = self
        .permits
        .acquire()
        .await
        .map_err(|e| GenerationError::Transport(e.to_string()))?;
      generator.generate(&self.prompts.grading_system, prompt).await
    };
    match tokio::time::timeout(self.timeout, call).await {
      Ok(r) => r,
      Err(_) => Err(GenerationError::Timeout(self.timeout)),
    }
  }
}
