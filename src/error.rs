//! API error type. Every variant maps to one HTTP status and a JSON body
//! `{ "error": message }`.

use axum::{
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{0}")]
  Unauthorized(String),
  #[error("{0}")]
  Forbidden(String),
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  Conflict(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = Json(serde_json::json!({ "error": self.to_string() }));
    (self.status(), body).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

/// Ids are opaque to clients: one that does not parse names nothing we hold.
impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    ApiError::NotFound(format!("Not found: {}", rejection.body_text()))
  }
}
