//! The external text-generation capability as seen by the grading core.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("transport error: {0}")]
  Transport(String),
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("could not decode service response: {0}")]
  Decode(String),
  #[error("no reply within {0:?}")]
  Timeout(Duration),
}

/// Anything that turns a prompt into free-form text.
///
/// Implementations report failures as `GenerationError`; they make no promise
/// that the text follows the requested format.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;

  /// Short label for logs and health output.
  fn name(&self) -> &str;
}
