//! Domain models for the classroom: users, classes, enrollments, assignments and submissions.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::{GradeStatus, GradingResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Teacher,
  Student,
}
impl Default for Role {
  fn default() -> Self { Role::Student }
}

impl Role {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "teacher" => Some(Role::Teacher),
      "student" => Some(Role::Student),
      _ => None,
    }
  }
}

/// Passwords are kept exactly as registered; there is no hashing layer.
#[derive(Clone, Debug)]
pub struct User {
  pub id: Uuid,
  pub email: String,
  pub password: String,
  pub name: String,
  pub role: Role,
}

#[derive(Clone, Debug, Serialize)]
pub struct Classroom {
  pub id: Uuid,
  pub name: String,
  /// Join code handed out by the teacher (6 uppercase hex chars).
  pub code: String,
  pub teacher_id: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct Enrollment {
  pub id: Uuid,
  pub student_id: Uuid,
  pub class_id: Uuid,
  pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Assignment {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub due_date: NaiveDateTime,
  pub class_id: Uuid,
  pub reference_answer: String,
}

/// One per (student, assignment). Resubmission overwrites content and grade.
#[derive(Clone, Debug, Serialize)]
pub struct Submission {
  pub id: Uuid,
  pub content: String,
  pub score: f64,
  pub feedback: String,
  pub improvement: String,
  pub grade_status: GradeStatus,
  pub student_id: Uuid,
  pub assignment_id: Uuid,
  pub submitted_at: DateTime<Utc>,
}

impl Submission {
  pub fn apply_grade(&mut self, result: &GradingResult, status: GradeStatus) {
    self.score = result.score;
    self.feedback = result.feedback.clone();
    self.improvement = result.improvement.clone();
    self.grade_status = status;
  }

  /// Feedback block as shown to the student.
  pub fn feedback_text(&self) -> String {
    format!("{}\n\nAreas for improvement:\n{}", self.feedback, self.improvement)
  }
}
