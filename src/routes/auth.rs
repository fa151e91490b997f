//! Bearer-token extractors. `CurrentUser` resolves the session; `TeacherUser`
//! and `StudentUser` additionally enforce the role.

use std::sync::Arc;

use axum::{
  async_trait,
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts},
};

use crate::domain::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;

pub struct CurrentUser {
  pub user: User,
  pub token: String,
}

pub struct TeacherUser(pub User);
pub struct StudentUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
  parts
    .headers
    .get(AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts)
      .ok_or_else(|| ApiError::Unauthorized("Missing or invalid Authorization header".into()))?
      .to_string();
    let user = state
      .user_for_token(&token)
      .await
      .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".into()))?;
    Ok(CurrentUser { user, token })
  }
}

async fn require_role(parts: &mut Parts, state: &Arc<AppState>, role: Role) -> Result<User, ApiError> {
  let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;
  if user.role != role {
    return Err(ApiError::Forbidden("Unauthorized access".into()));
  }
  Ok(user)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for TeacherUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    require_role(parts, state, Role::Teacher).await.map(TeacherUser)
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StudentUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    require_role(parts, state, Role::Student).await.map(StudentUser)
  }
}
