//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; spans record ids and sizes, never answer text.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;
use crate::logic;
use crate::routes::auth::{CurrentUser, StudentUser, TeacherUser};
use crate::routes::extract::{ApiJson, ApiPath};

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    grading_mode: state.grader.mode().as_str(),
    generator: state.grader.generator_name().map(str::to_string),
  })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_register(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<RegisterIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::register(&state, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_login(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<LoginIn>,
) -> Result<Json<SessionOut>, ApiError> {
  logic::login(&state, body).await.map(Json)
}

#[instrument(level = "info", skip(state, current), fields(user_id = %current.user.id))]
pub async fn http_logout(State(state): State<Arc<AppState>>, current: CurrentUser) -> StatusCode {
  logic::logout(&state, &current.token).await;
  StatusCode::NO_CONTENT
}

pub async fn http_me(current: CurrentUser) -> Json<UserOut> {
  Json(UserOut::from(&current.user))
}

// --- Teacher ---

#[instrument(level = "info", skip(state, teacher, body), fields(teacher_id = %teacher.id))]
pub async fn http_create_class(
  State(state): State<Arc<AppState>>,
  TeacherUser(teacher): TeacherUser,
  ApiJson(body): ApiJson<CreateClassIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::create_class(&state, &teacher, &body.name).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, teacher), fields(teacher_id = %teacher.id))]
pub async fn http_list_classes(
  State(state): State<Arc<AppState>>,
  TeacherUser(teacher): TeacherUser,
) -> Json<Vec<ClassOverviewOut>> {
  Json(logic::teacher_classes(&state, &teacher).await)
}

#[instrument(level = "info", skip(state, teacher), fields(teacher_id = %teacher.id))]
pub async fn http_class_detail(
  State(state): State<Arc<AppState>>,
  TeacherUser(teacher): TeacherUser,
  ApiPath(class_id): ApiPath<Uuid>,
) -> Result<Json<ClassDetailOut>, ApiError> {
  logic::class_detail(&state, &teacher, class_id).await.map(Json)
}

#[instrument(level = "info", skip(state, teacher, body), fields(teacher_id = %teacher.id))]
pub async fn http_create_assignment(
  State(state): State<Arc<AppState>>,
  TeacherUser(teacher): TeacherUser,
  ApiPath(class_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<CreateAssignmentIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::create_assignment(&state, &teacher, class_id, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, teacher), fields(teacher_id = %teacher.id))]
pub async fn http_assignment_submissions(
  State(state): State<Arc<AppState>>,
  TeacherUser(teacher): TeacherUser,
  ApiPath(assignment_id): ApiPath<Uuid>,
) -> Result<Json<Vec<SubmissionOut>>, ApiError> {
  logic::assignment_submissions(&state, &teacher, assignment_id).await.map(Json)
}

// --- Student ---

#[instrument(level = "info", skip(state, student, body), fields(student_id = %student.id))]
pub async fn http_join_class(
  State(state): State<Arc<AppState>>,
  StudentUser(student): StudentUser,
  ApiJson(body): ApiJson<JoinClassIn>,
) -> Result<Json<JoinClassOut>, ApiError> {
  logic::join_class(&state, &student, &body.code).await.map(Json)
}

#[instrument(level = "info", skip(state, student), fields(student_id = %student.id))]
pub async fn http_enrollments(
  State(state): State<Arc<AppState>>,
  StudentUser(student): StudentUser,
) -> Json<Vec<EnrollmentOut>> {
  Json(logic::student_enrollments(&state, &student).await)
}

#[instrument(level = "info", skip(state, student), fields(student_id = %student.id))]
pub async fn http_student_class(
  State(state): State<Arc<AppState>>,
  StudentUser(student): StudentUser,
  ApiPath(class_id): ApiPath<Uuid>,
) -> Result<Json<StudentClassOut>, ApiError> {
  logic::student_class(&state, &student, class_id).await.map(Json)
}

#[instrument(level = "info", skip(state, student, body), fields(student_id = %student.id, answer_len = body.answer.len()))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  StudentUser(student): StudentUser,
  ApiPath(assignment_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<SubmitIn>,
) -> Result<Json<SubmitOut>, ApiError> {
  logic::submit_answer(&state, &student, assignment_id, &body.answer).await.map(Json)
}

#[instrument(level = "info", skip(state, student), fields(student_id = %student.id))]
pub async fn http_my_submission(
  State(state): State<Arc<AppState>>,
  StudentUser(student): StudentUser,
  ApiPath(assignment_id): ApiPath<Uuid>,
) -> Result<Json<SubmissionOut>, ApiError> {
  logic::my_submission(&state, &student, assignment_id).await.map(Json)
}
