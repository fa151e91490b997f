//! JSON request/response types for the HTTP API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Assignment, Classroom, Role, Submission, User};
use crate::grading::GradeStatus;

/// Accepted due-date format (HTML `datetime-local`).
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

// --- Inbound ---

#[derive(Debug, Deserialize)]
pub struct RegisterIn {
  #[serde(default)] pub email: String,
  #[serde(default)] pub password: String,
  #[serde(default)] pub name: String,
  #[serde(default)] pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginIn {
  #[serde(default)] pub email: String,
  #[serde(default)] pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateClassIn {
  #[serde(default)] pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinClassIn {
  #[serde(default)] pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentIn {
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub due_date: String,
  #[serde(default)] pub reference_answer: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
  #[serde(default)] pub answer: String,
}

// --- Outbound ---

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub grading_mode: &'static str,
  pub generator: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserOut {
  pub id: Uuid,
  pub email: String,
  pub name: String,
  pub role: Role,
}

impl From<&User> for UserOut {
  fn from(u: &User) -> Self {
    Self { id: u.id, email: u.email.clone(), name: u.name.clone(), role: u.role }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionOut {
  pub token: String,
  pub user: UserOut,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassOut {
  pub id: Uuid,
  pub name: String,
  pub code: String,
  pub teacher_id: Uuid,
}

impl From<&Classroom> for ClassOut {
  fn from(c: &Classroom) -> Self {
    Self { id: c.id, name: c.name.clone(), code: c.code.clone(), teacher_id: c.teacher_id }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassOverviewOut {
  pub class: ClassOut,
  pub students: Vec<UserOut>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignmentOut {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub due_date: NaiveDateTime,
  pub class_id: Uuid,
  /// Only present for the owning teacher.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference_answer: Option<String>,
}

impl AssignmentOut {
  pub fn for_teacher(a: &Assignment) -> Self {
    Self { reference_answer: Some(a.reference_answer.clone()), ..Self::for_student(a) }
  }

  pub fn for_student(a: &Assignment) -> Self {
    Self {
      id: a.id,
      title: a.title.clone(),
      description: a.description.clone(),
      due_date: a.due_date,
      class_id: a.class_id,
      reference_answer: None,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassDetailOut {
  pub class: ClassOut,
  pub assignments: Vec<AssignmentOut>,
  pub students: Vec<UserOut>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinClassOut {
  pub class: ClassOut,
  pub already_enrolled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollmentOut {
  pub class: ClassOut,
  pub teacher_name: String,
  pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentClassOut {
  pub class: ClassOut,
  pub assignments: Vec<AssignmentOut>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionOut {
  pub id: Uuid,
  pub assignment_id: Uuid,
  pub student_id: Uuid,
  #[serde(default)]
  pub student_name: Option<String>,
  pub content: String,
  pub score: f64,
  pub feedback: String,
  pub improvement: String,
  pub feedback_text: String,
  pub status: GradeStatus,
  pub submitted_at: DateTime<Utc>,
}

impl SubmissionOut {
  pub fn new(s: &Submission, student_name: Option<String>) -> Self {
    Self {
      id: s.id,
      assignment_id: s.assignment_id,
      student_id: s.student_id,
      student_name,
      content: s.content.clone(),
      score: s.score,
      feedback: s.feedback.clone(),
      improvement: s.improvement.clone(),
      feedback_text: s.feedback_text(),
      status: s.grade_status,
      submitted_at: s.submitted_at,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitOut {
  pub submission: SubmissionOut,
  pub resubmitted: bool,
  /// Grade came from a degraded path or is indistinguishable from a placeholder.
  pub low_confidence: bool,
  pub message: String,
}
