//! Integration tests for the HTTP API against a live server.
//!
//! Each test binds an ephemeral port, serves the real router, and talks to
//! it over HTTP with `reqwest`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use eterna_tutor::{
    create_router, AppState, ChatResponse, Config, HealthResponse, InMemoryBackend,
    LanguageModel, MemoryBank, ProgressResponse, Result, Tutor,
};
use serde_json::json;

const QUIZ: &str = "Q1: 2+2?\nA) 4\nB) 5\nC) 6\nD) 7\nCorrect: A\n\n\
Q2: 3*3?\nA) 6\nB) 9\nC) 12\nD) 3\nCorrect: B";

/// Replies with a two-question quiz to quiz prompts and a short
/// explanation otherwise.
struct FakeModel;

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.starts_with("Create a quiz on:") {
            Ok(QUIZ.to_string())
        } else {
            Ok("Here is an explanation.".to_string())
        }
    }
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Spawns the API on an ephemeral port.
async fn spawn_test_server() -> TestServer {
    let mut config = Config::default();
    config.quiz.question_count = 2;
    config.student_id = "default_student".to_string();

    let bank = MemoryBank::open(Arc::new(InMemoryBackend::new()))
        .await
        .expect("Failed to open memory bank");
    let tutor = Arc::new(Tutor::new(&config, Arc::new(FakeModel), Arc::new(bank)));
    let router = create_router(AppState::new(tutor, config.student_id.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr: SocketAddr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    TestServer {
        base_url: format!("http://{addr}/api"),
        client: reqwest::Client::new(),
        _handle: handle,
    }
}

async fn chat(server: &TestServer, body: serde_json::Value) -> reqwest::Response {
    server
        .client
        .post(server.url("/chat"))
        .json(&body)
        .send()
        .await
        .expect("Request failed")
}

#[tokio::test]
async fn test_health() {
    let server = spawn_test_server().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let health: HealthResponse = response.json().await.expect("Invalid body");
    assert_eq!(health.status, "ok");
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_quiz_round_trip_over_http() {
    let server = spawn_test_server().await;

    let quiz: ChatResponse = chat(
        &server,
        json!({ "studentId": "ada", "message": "quiz me on arithmetic" }),
    )
    .await
    .json()
    .await
    .expect("Invalid body");
    assert_eq!(quiz.intent, "quiz");
    assert!(!quiz.reply.contains("Correct:"));
    let session_id = quiz.session_id.expect("session id");
    assert!(session_id.starts_with("session_ada_"));

    let result: ChatResponse = chat(
        &server,
        json!({ "studentId": "ada", "message": "1.A 2.B" }),
    )
    .await
    .json()
    .await
    .expect("Invalid body");
    assert_eq!(result.intent, "evaluate");
    assert!(result.reply.contains("**Score: 2/2 (100%)**"));
    assert_eq!(result.session_id.as_deref(), Some(session_id.as_str()));

    let progress: ProgressResponse = server
        .client
        .get(server.url("/students/ada/progress"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid body");
    assert_eq!(progress.student_id, "ada");
    assert_eq!(progress.stats.total_quizzes, 1);
    assert!((progress.stats.average_score - 1.0).abs() < 1e-9);
    assert!(progress.summary.contains("• arithmetic: 100%"));

    let health: HealthResponse = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid body");
    assert_eq!(health.active_sessions, 1);
}

#[tokio::test]
async fn test_missing_student_uses_default() {
    let server = spawn_test_server().await;

    let reply: ChatResponse = chat(&server, json!({ "message": "Explain gravity" }))
        .await
        .json()
        .await
        .expect("Invalid body");

    assert_eq!(reply.intent, "explain");
    assert!(reply
        .session_id
        .expect("session id")
        .starts_with("session_default_student_"));
}

#[tokio::test]
async fn test_blank_student_is_rejected() {
    let server = spawn_test_server().await;

    let response = chat(&server, json!({ "studentId": "  ", "message": "hi" })).await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.expect("Invalid body");
    assert_eq!(body["error"], "studentId must not be blank");
}

#[tokio::test]
async fn test_unknown_student_progress_is_empty() {
    let server = spawn_test_server().await;

    let progress: ProgressResponse = server
        .client
        .get(server.url("/students/nobody/progress"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid body");

    assert_eq!(progress.stats.total_quizzes, 0);
    assert!(progress.summary.contains("Quizzes Completed: 0"));
}
