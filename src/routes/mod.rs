//! Router assembly: JSON API, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod auth;
pub mod extract;
pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...` (bearer-token sessions)
/// - Static frontend from `./static` with index fallback
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Sessions
        .route("/api/v1/register", post(http::http_register))
        .route("/api/v1/login", post(http::http_login))
        .route("/api/v1/logout", post(http::http_logout))
        .route("/api/v1/me", get(http::http_me))
        // Teacher
        .route("/api/v1/classes", get(http::http_list_classes).post(http::http_create_class))
        .route("/api/v1/classes/:class_id", get(http::http_class_detail))
        .route("/api/v1/classes/:class_id/assignments", post(http::http_create_assignment))
        .route("/api/v1/assignments/:assignment_id/submissions", get(http::http_assignment_submissions))
        // Student
        .route("/api/v1/enrollments", get(http::http_enrollments).post(http::http_join_class))
        .route("/api/v1/student/classes/:class_id", get(http::http_student_class))
        .route("/api/v1/assignments/:assignment_id/submit", post(http::http_submit))
        .route("/api/v1/assignments/:assignment_id/submission", get(http::http_my_submission))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GradingMode, GradingSettings, Prompts};
    use crate::grading::{GenerationError, Grader, TextGenerator};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Replies from a fixed list, one per call; `None` simulates an outage.
    struct QueueGenerator {
        replies: std::sync::Mutex<Vec<Option<&'static str>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for QueueGenerator {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut q = self.replies.lock().unwrap();
                if q.is_empty() { None } else { q.remove(0) }
            };
            next.map(str::to_string)
                .ok_or_else(|| GenerationError::Transport("connection reset".into()))
        }

        fn name(&self) -> &str {
            "queue"
        }
    }

    struct Harness {
        app: Router,
        generator: Arc<QueueGenerator>,
    }

    fn harness(replies: Vec<Option<&'static str>>) -> Harness {
        let generator = Arc::new(QueueGenerator {
            replies: std::sync::Mutex::new(replies),
            calls: AtomicUsize::new(0),
        });
        let settings = GradingSettings { mode: GradingMode::Ai, timeout_secs: 5, max_concurrent: 2 };
        let dyn_gen: Arc<dyn TextGenerator> = generator.clone();
        let grader = Grader::new(&settings, Prompts::default(), Some(dyn_gen));
        let app = build_router(Arc::new(AppState::with_grader(grader)));
        Harness { app, generator }
    }

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value)
    }

    async fn call_raw(app: &Router, method: &str, uri: &str, token: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let res = app.clone().oneshot(builder.body(Body::from(body.to_string())).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(app: &Router, email: &str, role: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/v1/register",
            None,
            Some(json!({ "email": email, "password": "pw", "name": email, "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Teacher with one class and one assignment; student enrolled.
    async fn classroom(app: &Router) -> (String, String, String, String) {
        let teacher = register(app, "t@school.test", "teacher").await;
        let student = register(app, "s@school.test", "student").await;

        let (status, class) = call(app, "POST", "/api/v1/classes", Some(&teacher), Some(json!({ "name": "Biology" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let class_id = class["id"].as_str().unwrap().to_string();
        let code = class["code"].as_str().unwrap().to_lowercase();

        let (status, assignment) = call(
            app,
            "POST",
            &format!("/api/v1/classes/{class_id}/assignments"),
            Some(&teacher),
            Some(json!({
                "title": "Photosynthesis",
                "description": "Explain it",
                "due_date": "2026-12-01T08:00",
                "reference_answer": "plants convert light into chemical energy"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{assignment}");
        let assignment_id = assignment["id"].as_str().unwrap().to_string();

        let (status, joined) = call(app, "POST", "/api/v1/enrollments", Some(&student), Some(json!({ "code": format!("  {code} ") }))).await;
        assert_eq!(status, StatusCode::OK, "{joined}");
        assert_eq!(joined["already_enrolled"], false);

        (teacher, student, class_id, assignment_id)
    }

    #[tokio::test]
    async fn health_reports_grading_mode() {
        let h = harness(vec![]);
        let (status, body) = call(&h.app, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["grading_mode"], "ai");
        assert_eq!(body["generator"], "queue");
    }

    #[tokio::test]
    async fn register_validates_and_rejects_duplicates() {
        let h = harness(vec![]);
        let (status, _) = call(&h.app, "POST", "/api/v1/register", None, Some(json!({ "email": "x@y.z", "password": "", "name": "X" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        register(&h.app, "x@y.z", "student").await;
        let (status, body) = call(&h.app, "POST", "/api/v1/register", None, Some(json!({ "email": "x@y.z", "password": "pw", "name": "X" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn login_logout_cycle() {
        let h = harness(vec![]);
        register(&h.app, "a@b.c", "student").await;

        let (status, _) = call(&h.app, "POST", "/api/v1/login", None, Some(json!({ "email": "a@b.c", "password": "nope" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&h.app, "POST", "/api/v1/login", None, Some(json!({ "email": "a@b.c", "password": "pw" }))).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = call(&h.app, "GET", "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["role"], "student");

        let (status, _) = call(&h.app, "POST", "/api/v1/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&h.app, "GET", "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn roles_are_enforced() {
        let h = harness(vec![]);
        let student = register(&h.app, "s@x.y", "student").await;
        let (status, _) = call(&h.app, "POST", "/api/v1/classes", Some(&student), Some(json!({ "name": "Hack" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&h.app, "GET", "/api/v1/classes", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submit_grades_and_resubmit_overwrites() {
        let h = harness(vec![
            Some("SCORE: 72\nFEEDBACK: Correct idea.\nIMPROVEMENT: Name the pigment."),
            Some("IMPROVEMENT: None needed.\nFEEDBACK: Complete.\nSCORE: 140"),
        ]);
        let (teacher, student, _class_id, assignment_id) = classroom(&h.app).await;
        let submit = format!("/api/v1/assignments/{assignment_id}/submit");

        let (status, first) = call(&h.app, "POST", &submit, Some(&student), Some(json!({ "answer": "plants use light" }))).await;
        assert_eq!(status, StatusCode::OK, "{first}");
        assert_eq!(first["submission"]["score"], 72.0);
        assert_eq!(first["submission"]["feedback"], "Correct idea.");
        assert_eq!(first["submission"]["status"], "graded");
        assert_eq!(first["resubmitted"], false);
        assert_eq!(first["low_confidence"], false);

        let (status, second) = call(&h.app, "POST", &submit, Some(&student), Some(json!({ "answer": "plants turn light into sugar" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["submission"]["score"], 100.0);
        assert_eq!(second["submission"]["improvement"], "None needed.");
        assert_eq!(second["resubmitted"], true);
        assert_eq!(second["submission"]["id"], first["submission"]["id"]);

        let (status, list) = call(&h.app, "GET", &format!("/api/v1/assignments/{assignment_id}/submissions"), Some(&teacher), None).await;
        assert_eq!(status, StatusCode::OK);
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["content"], "plants turn light into sugar");
        assert_eq!(list[0]["feedback_text"], "Complete.\n\nAreas for improvement:\nNone needed.");
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn service_outage_still_saves_submission() {
        let h = harness(vec![None]);
        let (_teacher, student, _class_id, assignment_id) = classroom(&h.app).await;

        let (status, out) = call(
            &h.app,
            "POST",
            &format!("/api/v1/assignments/{assignment_id}/submit"),
            Some(&student),
            Some(json!({ "answer": "no idea" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["submission"]["score"], 50.0);
        assert_eq!(out["submission"]["feedback"], "Grading service unavailable");
        assert_eq!(out["submission"]["status"], "service_unavailable");
        assert_eq!(out["low_confidence"], true);

        let (status, mine) = call(&h.app, "GET", &format!("/api/v1/assignments/{assignment_id}/submission"), Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["content"], "no idea");
    }

    #[tokio::test]
    async fn empty_answer_is_rejected_without_grading() {
        let h = harness(vec![Some("SCORE: 90")]);
        let (_teacher, student, _class_id, assignment_id) = classroom(&h.app).await;
        let (status, body) = call(
            &h.app,
            "POST",
            &format!("/api/v1/assignments/{assignment_id}/submit"),
            Some(&student),
            Some(json!({ "answer": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Answer cannot be empty");
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn outsiders_cannot_see_or_submit() {
        let h = harness(vec![]);
        let (_teacher, _student, class_id, assignment_id) = classroom(&h.app).await;
        let other_teacher = register(&h.app, "o@school.test", "teacher").await;
        let outsider = register(&h.app, "x@school.test", "student").await;

        let (status, _) = call(&h.app, "GET", &format!("/api/v1/classes/{class_id}"), Some(&other_teacher), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&h.app, "GET", &format!("/api/v1/student/classes/{class_id}"), Some(&outsider), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(
            &h.app,
            "POST",
            &format!("/api/v1/assignments/{assignment_id}/submit"),
            Some(&outsider),
            Some(json!({ "answer": "sneaky" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn class_views_for_both_roles() {
        let h = harness(vec![]);
        let (teacher, student, class_id, _assignment_id) = classroom(&h.app).await;

        let (status, classes) = call(&h.app, "GET", "/api/v1/classes", Some(&teacher), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(classes[0]["students"][0]["email"], "s@school.test");

        let (status, detail) = call(&h.app, "GET", &format!("/api/v1/classes/{class_id}"), Some(&teacher), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["assignments"][0]["reference_answer"], "plants convert light into chemical energy");

        let (status, view) = call(&h.app, "GET", &format!("/api/v1/student/classes/{class_id}"), Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(view["assignments"][0].get("reference_answer").is_none());

        let (status, enrolled) = call(&h.app, "GET", "/api/v1/enrollments", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(enrolled[0]["teacher_name"], "t@school.test");
    }

    #[tokio::test]
    async fn join_edge_cases() {
        let h = harness(vec![]);
        let (_teacher, student, _class_id, _assignment_id) = classroom(&h.app).await;
        let (status, _) = call(&h.app, "POST", "/api/v1/enrollments", Some(&student), Some(json!({ "code": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(&h.app, "POST", "/api/v1/enrollments", Some(&student), Some(json!({ "code": "ZZZZZZ" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Invalid class code");
    }

    #[tokio::test]
    async fn invalid_due_date_is_rejected() {
        let h = harness(vec![]);
        let teacher = register(&h.app, "t@x.y", "teacher").await;
        let (_, class) = call(&h.app, "POST", "/api/v1/classes", Some(&teacher), Some(json!({ "name": "Maths" }))).await;
        let class_id = class["id"].as_str().unwrap();
        let (status, body) = call(
            &h.app,
            "POST",
            &format!("/api/v1/classes/{class_id}/assignments"),
            Some(&teacher),
            Some(json!({ "title": "T", "description": "", "due_date": "next friday", "reference_answer": "r" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid date format");
    }

    #[tokio::test]
    async fn malformed_json_body_gets_json_error() {
        let h = harness(vec![]);
        let (status, body) = call_raw(&h.app, "POST", "/api/v1/register", None, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|m| !m.is_empty()), "{body}");
    }

    #[tokio::test]
    async fn non_uuid_ids_are_not_found() {
        let h = harness(vec![]);
        let (teacher, student, _class_id, _assignment_id) = classroom(&h.app).await;

        let (status, body) = call(&h.app, "GET", "/api/v1/classes/abc", Some(&teacher), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string(), "{body}");

        let (status, body) = call(
            &h.app,
            "POST",
            "/api/v1/assignments/42/submit",
            Some(&student),
            Some(json!({ "answer": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string(), "{body}");
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_reference_answer_is_flagged_not_graded() {
        let h = harness(vec![Some("SCORE: 90")]);
        let teacher = register(&h.app, "t@x.y", "teacher").await;
        let student = register(&h.app, "s@x.y", "student").await;
        let (_, class) = call(&h.app, "POST", "/api/v1/classes", Some(&teacher), Some(json!({ "name": "History" }))).await;
        let class_id = class["id"].as_str().unwrap().to_string();
        let code = class["code"].as_str().unwrap().to_string();
        let (status, assignment) = call(
            &h.app,
            "POST",
            &format!("/api/v1/classes/{class_id}/assignments"),
            Some(&teacher),
            Some(json!({ "title": "Essay", "description": "", "due_date": "2026-12-01T08:00", "reference_answer": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let assignment_id = assignment["id"].as_str().unwrap().to_string();
        call(&h.app, "POST", "/api/v1/enrollments", Some(&student), Some(json!({ "code": code }))).await;

        let (status, out) = call(
            &h.app,
            "POST",
            &format!("/api/v1/assignments/{assignment_id}/submit"),
            Some(&student),
            Some(json!({ "answer": "The war ended in 1918." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["submission"]["score"], 0.0);
        assert_eq!(out["submission"]["status"], "invalid_input");
        assert_eq!(out["low_confidence"], true);
        assert!(out["message"].as_str().unwrap().contains("could not be graded"));
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }
}
