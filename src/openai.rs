//! Minimal OpenAI-compatible client used as the grading text generator.
//!
//! We only call chat.completions and request plain text.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::grading::{GenerationError, TextGenerator};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    enabled_or_logged(Self::new(api_key, base_url, model))
  }

  pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, GenerationError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| GenerationError::Transport(e.to_string()))?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, temperature: 0.2 })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, prompt_len = user.len()))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "classroom-grader/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| {
        if e.is_timeout() { GenerationError::Timeout(Duration::from_secs(20)) } else { GenerationError::Transport(e.to_string()) }
      })?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(GenerationError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(first_choice_text(body))
  }
}

#[async_trait]
impl TextGenerator for OpenAI {
  async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
    self.chat_plain(system, prompt).await
  }

  fn name(&self) -> &str {
    &self.model
  }
}

/// A key was configured but the client could not be built: say why before disabling.
fn enabled_or_logged(built: Result<OpenAI, GenerationError>) -> Option<OpenAI> {
  match built {
    Ok(oa) => Some(oa),
    Err(e) => {
      error!(target: "classroom_grader", error = %e, "OPENAI_API_KEY is set but the HTTP client failed to build; AI grading disabled");
      None
    }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Missing choices or null content come back as an empty string.
fn first_choice_text(body: ChatCompletionResponse) -> String {
  body.choices.into_iter().next()
    .and_then(|c| c.message.content)
    .unwrap_or_default().trim().to_string()
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
