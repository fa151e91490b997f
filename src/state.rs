//! Application state: in-memory stores and the grading orchestrator.
//!
//! This module owns:
//!   - user, session, class, enrollment, assignment and submission stores
//!   - the `Grader` (prompts, mode, optional OpenAI-compatible generator)
//!
//! Stores are plain maps behind `RwLock`; nothing is persisted across restarts.

use std::{collections::HashMap, sync::Arc};
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{load_config_from_env, GraderConfig};
use crate::domain::{Assignment, Classroom, Enrollment, Submission, User};
use crate::grading::{Grader, TextGenerator};
use crate::openai::OpenAI;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<RwLock<HashMap<Uuid, User>>>,
    /// Bearer token -> user id.
    pub sessions: Arc<RwLock<HashMap<String, Uuid>>>,
    pub classes: Arc<RwLock<HashMap<Uuid, Classroom>>>,
    pub enrollments: Arc<RwLock<Vec<Enrollment>>>,
    pub assignments: Arc<RwLock<HashMap<Uuid, Assignment>>>,
    /// Keyed by (student_id, assignment_id).
    pub submissions: Arc<RwLock<HashMap<(Uuid, Uuid), Submission>>>,
    pub grader: Arc<Grader>,
}

impl AppState {
    /// Build state from env: load config, apply env overrides, init OpenAI, build the grader.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let GraderConfig { prompts, mut grading } = load_config_from_env().unwrap_or_default();
        grading.apply_env();

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "classroom_grader", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "classroom_grader", "OpenAI disabled (no OPENAI_API_KEY). Using offline grading.");
        }
        let generator = openai.map(|oa| Arc::new(oa) as Arc<dyn TextGenerator>);

        Self::with_grader(Grader::new(&grading, prompts, generator))
    }

    /// Empty stores around a ready-made grader.
    pub fn with_grader(grader: Grader) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            classes: Arc::new(RwLock::new(HashMap::new())),
            enrollments: Arc::new(RwLock::new(Vec::new())),
            assignments: Arc::new(RwLock::new(HashMap::new())),
            submissions: Arc::new(RwLock::new(HashMap::new())),
            grader: Arc::new(grader),
        }
    }

    /// Insert a user unless the email is taken. Returns false on duplicate.
    #[instrument(level = "debug", skip(self, user), fields(id = %user.id))]
    pub async fn insert_user(&self, user: User) -> bool {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return false;
        }
        users.insert(user.id, user);
        true
    }

    pub async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    pub async fn find_user_by_credentials(&self, email: &str, password: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email && u.password == password)
            .cloned()
    }

    /// Issue a new bearer token for the user.
    pub async fn open_session(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(token.clone(), user_id);
        token
    }

    pub async fn close_session(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn user_for_token(&self, token: &str) -> Option<User> {
        let id = { self.sessions.read().await.get(token).copied() }?;
        self.get_user(id).await
    }

    /// Create a class with a fresh join code, unique among existing classes.
    #[instrument(level = "debug", skip(self))]
    pub async fn insert_class(&self, name: String, teacher_id: Uuid) -> Classroom {
        let mut classes = self.classes.write().await;
        let code = loop {
            let candidate = generate_class_code();
            if !classes.values().any(|c| c.code == candidate) {
                break candidate;
            }
        };
        let class = Classroom { id: Uuid::new_v4(), name, code, teacher_id };
        classes.insert(class.id, class.clone());
        class
    }

    pub async fn get_class(&self, id: Uuid) -> Option<Classroom> {
        self.classes.read().await.get(&id).cloned()
    }

    pub async fn class_by_code(&self, code: &str) -> Option<Classroom> {
        self.classes.read().await.values().find(|c| c.code == code).cloned()
    }

    pub async fn classes_for_teacher(&self, teacher_id: Uuid) -> Vec<Classroom> {
        let mut out: Vec<Classroom> = self
            .classes
            .read()
            .await
            .values()
            .filter(|c| c.teacher_id == teacher_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Enroll the student. Returns the existing enrollment if already present.
    pub async fn enroll(&self, student_id: Uuid, class_id: Uuid) -> (Enrollment, bool) {
        let mut enrollments = self.enrollments.write().await;
        if let Some(e) = enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.class_id == class_id)
        {
            return (e.clone(), false);
        }
        let e = Enrollment {
            id: Uuid::new_v4(),
            student_id,
            class_id,
            joined_at: chrono::Utc::now(),
        };
        enrollments.push(e.clone());
        (e, true)
    }

    pub async fn is_enrolled(&self, student_id: Uuid, class_id: Uuid) -> bool {
        self.enrollments
            .read()
            .await
            .iter()
            .any(|e| e.student_id == student_id && e.class_id == class_id)
    }

    pub async fn enrollments_for_class(&self, class_id: Uuid) -> Vec<Enrollment> {
        self.enrollments
            .read()
            .await
            .iter()
            .filter(|e| e.class_id == class_id)
            .cloned()
            .collect()
    }

    pub async fn enrollments_for_student(&self, student_id: Uuid) -> Vec<Enrollment> {
        self.enrollments
            .read()
            .await
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect()
    }

    pub async fn insert_assignment(&self, a: Assignment) {
        self.assignments.write().await.insert(a.id, a);
    }

    pub async fn get_assignment(&self, id: Uuid) -> Option<Assignment> {
        self.assignments.read().await.get(&id).cloned()
    }

    pub async fn assignments_for_class(&self, class_id: Uuid) -> Vec<Assignment> {
        let mut out: Vec<Assignment> = self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| a.class_id == class_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.due_date);
        out
    }

    /// Insert or overwrite the student's submission for an assignment.
    pub async fn upsert_submission(&self, s: Submission) -> Submission {
        let key = (s.student_id, s.assignment_id);
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&key) {
            Some(existing) => {
                existing.content = s.content;
                existing.score = s.score;
                existing.feedback = s.feedback;
                existing.improvement = s.improvement;
                existing.grade_status = s.grade_status;
                existing.submitted_at = s.submitted_at;
                existing.clone()
            }
            None => {
                submissions.insert(key, s.clone());
                s
            }
        }
    }

    pub async fn get_submission(&self, student_id: Uuid, assignment_id: Uuid) -> Option<Submission> {
        self.submissions
            .read()
            .await
            .get(&(student_id, assignment_id))
            .cloned()
    }

    pub async fn submissions_for_assignment(&self, assignment_id: Uuid) -> Vec<Submission> {
        let mut out: Vec<Submission> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.submitted_at);
        out
    }
}

/// Six uppercase hex characters.
fn generate_class_code() -> String {
    let bytes: [u8; 3] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
