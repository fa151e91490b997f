//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Registration, login and logout
//!   - Class creation, joining by code, and the teacher/student class views
//!   - Assignment creation and submission listing
//!   - Answer submission: grading through the orchestrator, then upsert

use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Assignment, Role, Submission, User};
use crate::error::ApiError;
use crate::grading::{GradeStatus, GradingRequest};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state, body), fields(email_len = body.email.len()))]
pub async fn register(state: &AppState, body: RegisterIn) -> Result<SessionOut, ApiError> {
  let email = body.email.trim().to_string();
  let password = body.password.trim().to_string();
  let name = body.name.trim().to_string();
  if email.is_empty() || password.is_empty() || name.is_empty() {
    return Err(ApiError::BadRequest("All fields are required".into()));
  }
  let role = match body.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
    None => Role::Student,
    Some(r) => Role::parse(r).ok_or_else(|| ApiError::BadRequest(format!("Unknown role: {}", r)))?,
  };

  let user = User { id: Uuid::new_v4(), email, password, name, role };
  if !state.insert_user(user.clone()).await {
    return Err(ApiError::Conflict("Email already registered".into()));
  }
  let token = state.open_session(user.id).await;
  info!(target: "classroom", user_id = %user.id, ?role, "User registered");
  Ok(SessionOut { token, user: UserOut::from(&user) })
}

#[instrument(level = "info", skip(state, body), fields(email_len = body.email.len()))]
pub async fn login(state: &AppState, body: LoginIn) -> Result<SessionOut, ApiError> {
  let email = body.email.trim();
  let password = body.password.trim();
  if email.is_empty() || password.is_empty() {
    return Err(ApiError::BadRequest("Both email and password are required".into()));
  }
  let user = state
    .find_user_by_credentials(email, password)
    .await
    .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;
  let token = state.open_session(user.id).await;
  info!(target: "classroom", user_id = %user.id, "User logged in");
  Ok(SessionOut { token, user: UserOut::from(&user) })
}

pub async fn logout(state: &AppState, token: &str) {
  state.close_session(token).await;
}

#[instrument(level = "info", skip(state, teacher, name), fields(teacher_id = %teacher.id))]
pub async fn create_class(state: &AppState, teacher: &User, name: &str) -> Result<ClassOut, ApiError> {
  let name = name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("Class name is required".into()));
  }
  let class = state.insert_class(name.to_string(), teacher.id).await;
  info!(target: "classroom", class_id = %class.id, code = %class.code, "Class created");
  Ok(ClassOut::from(&class))
}

async fn students_of(state: &AppState, class_id: Uuid) -> Vec<UserOut> {
  let mut out = Vec::new();
  for e in state.enrollments_for_class(class_id).await {
    if let Some(u) = state.get_user(e.student_id).await {
      out.push(UserOut::from(&u));
    }
  }
  out
}

pub async fn teacher_classes(state: &AppState, teacher: &User) -> Vec<ClassOverviewOut> {
  let mut out = Vec::new();
  for class in state.classes_for_teacher(teacher.id).await {
    let students = students_of(state, class.id).await;
    out.push(ClassOverviewOut { class: ClassOut::from(&class), students });
  }
  out
}

/// Load a class the teacher owns. Someone else's class is a 403.
async fn owned_class(state: &AppState, teacher: &User, class_id: Uuid) -> Result<crate::domain::Classroom, ApiError> {
  let class = state
    .get_class(class_id)
    .await
    .ok_or_else(|| ApiError::NotFound("Class not found".into()))?;
  if class.teacher_id != teacher.id {
    warn!(target: "classroom", %class_id, teacher_id = %teacher.id, "Access to foreign class refused");
    return Err(ApiError::Forbidden("Unauthorized access".into()));
  }
  Ok(class)
}

pub async fn class_detail(state: &AppState, teacher: &User, class_id: Uuid) -> Result<ClassDetailOut, ApiError> {
  let class = owned_class(state, teacher, class_id).await?;
  let assignments = state
    .assignments_for_class(class_id)
    .await
    .iter()
    .map(AssignmentOut::for_teacher)
    .collect();
  let students = students_of(state, class_id).await;
  Ok(ClassDetailOut { class: ClassOut::from(&class), assignments, students })
}

pub fn parse_due_date(raw: &str) -> Result<NaiveDateTime, ApiError> {
  NaiveDateTime::parse_from_str(raw.trim(), DUE_DATE_FORMAT)
    .map_err(|_| ApiError::BadRequest("Invalid date format".into()))
}

#[instrument(level = "info", skip(state, teacher, body), fields(teacher_id = %teacher.id, %class_id))]
pub async fn create_assignment(
  state: &AppState,
  teacher: &User,
  class_id: Uuid,
  body: CreateAssignmentIn,
) -> Result<AssignmentOut, ApiError> {
  owned_class(state, teacher, class_id).await?;
  let due_date = parse_due_date(&body.due_date)?;
  let title = body.title.trim().to_string();
  if title.is_empty() {
    return Err(ApiError::BadRequest("Title is required".into()));
  }
  let reference_answer = body.reference_answer.trim().to_string();
  if reference_answer.is_empty() {
    // Allowed, but every submission will grade as missing content.
    warn!(target: "classroom", %class_id, "Assignment created without a reference answer");
  }
  let a = Assignment {
    id: Uuid::new_v4(),
    title,
    description: body.description.trim().to_string(),
    due_date,
    class_id,
    reference_answer,
  };
  state.insert_assignment(a.clone()).await;
  info!(target: "classroom", assignment_id = %a.id, "Assignment created");
  Ok(AssignmentOut::for_teacher(&a))
}

pub async fn assignment_submissions(
  state: &AppState,
  teacher: &User,
  assignment_id: Uuid,
) -> Result<Vec<SubmissionOut>, ApiError> {
  let a = state
    .get_assignment(assignment_id)
    .await
    .ok_or_else(|| ApiError::NotFound("Assignment not found".into()))?;
  owned_class(state, teacher, a.class_id).await?;
  let mut out = Vec::new();
  for s in state.submissions_for_assignment(assignment_id).await {
    let name = state.get_user(s.student_id).await.map(|u| u.name);
    out.push(SubmissionOut::new(&s, name));
  }
  Ok(out)
}

#[instrument(level = "info", skip(state, student, code), fields(student_id = %student.id))]
pub async fn join_class(state: &AppState, student: &User, code: &str) -> Result<JoinClassOut, ApiError> {
  let code = code.trim().to_uppercase();
  if code.is_empty() {
    return Err(ApiError::BadRequest("Class code is required".into()));
  }
  let class = state
    .class_by_code(&code)
    .await
    .ok_or_else(|| ApiError::NotFound("Invalid class code".into()))?;
  let (_, created) = state.enroll(student.id, class.id).await;
  if created {
    info!(target: "classroom", class_id = %class.id, "Student joined class");
  }
  Ok(JoinClassOut { class: ClassOut::from(&class), already_enrolled: !created })
}

pub async fn student_enrollments(state: &AppState, student: &User) -> Vec<EnrollmentOut> {
  let mut out = Vec::new();
  for e in state.enrollments_for_student(student.id).await {
    let Some(class) = state.get_class(e.class_id).await else { continue };
    let teacher_name = state.get_user(class.teacher_id).await.map(|u| u.name).unwrap_or_default();
    out.push(EnrollmentOut { class: ClassOut::from(&class), teacher_name, joined_at: e.joined_at });
  }
  out
}

pub async fn student_class(state: &AppState, student: &User, class_id: Uuid) -> Result<StudentClassOut, ApiError> {
  if !state.is_enrolled(student.id, class_id).await {
    return Err(ApiError::NotFound("Class not found".into()));
  }
  let class = state
    .get_class(class_id)
    .await
    .ok_or_else(|| ApiError::NotFound("Class not found".into()))?;
  let assignments = state
    .assignments_for_class(class_id)
    .await
    .iter()
    .map(AssignmentOut::for_student)
    .collect();
  Ok(StudentClassOut { class: ClassOut::from(&class), assignments })
}

/// Assignment visible to this student (enrolled in its class), else 404.
async fn enrolled_assignment(state: &AppState, student: &User, assignment_id: Uuid) -> Result<Assignment, ApiError> {
  let a = state
    .get_assignment(assignment_id)
    .await
    .ok_or_else(|| ApiError::NotFound("Assignment not found".into()))?;
  if !state.is_enrolled(student.id, a.class_id).await {
    return Err(ApiError::NotFound("Assignment not found".into()));
  }
  Ok(a)
}

/// Grade the answer and store it as the student's only submission for the assignment.
/// Grading never fails the request; a degraded grade is flagged as low confidence.
#[instrument(level = "info", skip(state, student, answer), fields(student_id = %student.id, %assignment_id, answer_len = answer.len()))]
pub async fn submit_answer(
  state: &AppState,
  student: &User,
  assignment_id: Uuid,
  answer: &str,
) -> Result<SubmitOut, ApiError> {
  let assignment = enrolled_assignment(state, student, assignment_id).await?;
  let answer = answer.trim();
  if answer.is_empty() {
    return Err(ApiError::BadRequest("Answer cannot be empty".into()));
  }

  let resubmitted = state.get_submission(student.id, assignment_id).await.is_some();
  let report = state
    .grader
    .grade_detailed(&GradingRequest::new(answer, &assignment.reference_answer))
    .await;
  let low_confidence = report.low_confidence();

  let mut submission = Submission {
    id: Uuid::new_v4(),
    content: answer.to_string(),
    score: 0.0,
    feedback: String::new(),
    improvement: String::new(),
    grade_status: report.status,
    student_id: student.id,
    assignment_id,
    submitted_at: chrono::Utc::now(),
  };
  submission.apply_grade(&report.result, report.status);
  let stored = state.upsert_submission(submission).await;

  info!(
    target: "classroom",
    submission_id = %stored.id,
    score = stored.score,
    status = ?report.status,
    %resubmitted,
    %low_confidence,
    "Submission graded"
  );
  let message = match report.status {
    GradeStatus::InvalidInput => "Assignment submitted, but it could not be graded: the assignment has no reference answer yet.",
    _ if low_confidence => "Assignment submitted. Automatic grading was not fully available; your score may be revised.",
    _ => "Assignment submitted and graded!",
  };
  Ok(SubmitOut {
    submission: SubmissionOut::new(&stored, Some(student.name.clone())),
    resubmitted,
    low_confidence,
    message: message.into(),
  })
}

pub async fn my_submission(state: &AppState, student: &User, assignment_id: Uuid) -> Result<SubmissionOut, ApiError> {
  enrolled_assignment(state, student, assignment_id).await?;
  state
    .get_submission(student.id, assignment_id)
    .await
    .map(|s| SubmissionOut::new(&s, Some(student.name.clone())))
    .ok_or_else(|| ApiError::NotFound("No submission yet".into()))
}
