//! End-to-end tests for the tutoring workflow.
//!
//! These drive [`Tutor`] with a fake language model and a real JSON memory
//! bank on disk, from routing through scoring, persistence, and report
//! generation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use eterna_report::{MarkdownGenerator, QuizInput, ReportGenerator, ReportInput};
use eterna_tutor::{
    AnswerKeyEntry, Config, GenerationErrorKind, Intent, LanguageModel, MemoryBank, PendingQuiz,
    QuizPhase, Result, Router, SessionRegistry, Tutor, TutorError,
};

const FIVE_QUESTION_QUIZ: &str = "\
Q1: What do plants absorb?\nA) Oxygen\nB) CO2\nC) Salt\nD) Iron\nCorrect: A\n\n\
Q2: Where does it happen?\nA) Root\nB) Chloroplast\nC) Nucleus\nD) Stem\nCorrect: B\n\n\
Q3: What is released?\nA) CO2\nB) Nitrogen\nC) Oxygen\nD) Helium\nCorrect: C\n\n\
Q4: Which pigment?\nA) Melanin\nB) Keratin\nC) Carotene\nD) Chlorophyll\nCorrect: D\n\n\
Q5: Energy source?\nA) Light\nB) Heat\nC) Wind\nD) Sound\nCorrect: A";

const EXPLANATION: &str = "Photosynthesis turns light into chemical energy.";

/// Answers quiz prompts with a fixed quiz and everything else with a fixed
/// explanation. Fails every call while `failing` is set.
#[derive(Default)]
struct FakeModel {
    failing: AtomicBool,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TutorError::generation(
                GenerationErrorKind::Server,
                "service unavailable",
            ));
        }
        if prompt.starts_with("Create a quiz on:") {
            Ok(FIVE_QUESTION_QUIZ.to_string())
        } else {
            Ok(EXPLANATION.to_string())
        }
    }
}

/// Unique memory bank path under the system temp directory.
fn temp_bank(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("eterna-it-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("memory_bank.json")
}

fn cleanup(path: &PathBuf) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

async fn tutor_at(path: &PathBuf, model: Arc<FakeModel>) -> Tutor {
    let bank = MemoryBank::open_file(path.clone())
        .await
        .expect("Failed to open memory bank");
    Tutor::new(&Config::default(), model, Arc::new(bank))
}

#[tokio::test]
async fn test_quiz_flow_persists_across_restart() {
    let path = temp_bank("quiz-flow");
    let tutor = tutor_at(&path, Arc::new(FakeModel::default())).await;

    let quiz = tutor
        .handle_message("ada", "Quiz me on photosynthesis")
        .await;
    assert_eq!(quiz.intent, "quiz");
    assert!(quiz.text.starts_with("**Quiz: photosynthesis**"));
    assert!(!quiz.text.contains("Correct:"), "answers must be hidden");
    assert!(quiz.text.ends_with("**Submit answers as:** `1.A 2.B 3.C 4.D 5.A`"));

    let result = tutor.handle_message("ada", "1.A 2.X 3.c 4.D 5.B").await;
    assert_eq!(result.intent, "evaluate");
    assert!(result.text.contains("✅ Q3: Correct!"));
    assert!(result.text.contains("❌ Q2: Your answer: ?, Correct: B"));
    assert!(result.text.contains("❌ Q5: Your answer: B, Correct: A"));
    assert!(result.text.contains("**Score: 3/5 (60%)**"));

    tutor.close().await.expect("Failed to close tutor");
    drop(tutor);

    // A fresh process sees the recorded quiz.
    let tutor = tutor_at(&path, Arc::new(FakeModel::default())).await;
    let profile = tutor
        .bank()
        .find_profile("ada")
        .await
        .expect("Profile should be persisted");
    assert_eq!(profile.stats.total_quizzes, 1);
    assert_eq!(profile.topics_covered, vec!["photosynthesis"]);
    assert!((profile.quiz_history[0].score - 0.6).abs() < 1e-9);
    assert!(profile.strong_areas.is_empty());
    assert!(profile.weak_areas.is_empty());

    let progress = tutor.handle_message("ada", "how am I doing?").await;
    assert_eq!(progress.intent, "progress");
    assert!(progress.text.contains("Average Score: 60.0%"));

    let raw = std::fs::read_to_string(&path).expect("Failed to read memory bank");
    let document: serde_json::Value = serde_json::from_str(&raw).expect("Invalid JSON");
    assert_eq!(document["students"]["ada"]["stats"]["total_quizzes"], 1);
    assert!(document["metadata"]["created_at"].is_string());

    cleanup(&path);
}

#[tokio::test]
async fn test_explanation_includes_visual_aid() {
    let path = temp_bank("explain");
    let tutor = tutor_at(&path, Arc::new(FakeModel::default())).await;

    let reply = tutor.handle_message("ada", "How does photosynthesis work?").await;
    assert_eq!(reply.intent, "explain");
    assert!(reply.text.starts_with(EXPLANATION));
    assert!(reply.text.contains("**Visual Aid:**\n```mermaid\nflowchart LR"));

    // The explained topic feeds a bare quiz request.
    let quiz = tutor.handle_message("ada", "quiz").await;
    assert!(quiz
        .text
        .starts_with("**Quiz: How does photosynthesis work?**"));

    cleanup(&path);
}

#[tokio::test]
async fn test_failures_become_apologies_and_state_survives() {
    let path = temp_bank("failures");
    let model = Arc::new(FakeModel::default());
    let tutor = tutor_at(&path, Arc::clone(&model)).await;

    model.failing.store(true, Ordering::SeqCst);
    let reply = tutor.handle_message("ada", "quiz me on optics").await;
    assert_eq!(reply.text, "I had trouble creating a quiz. Please try again.");

    let reply = tutor.handle_message("ada", "1.A 2.B").await;
    assert_eq!(reply.intent, "explain");
    assert!(reply.text.starts_with("I had trouble explaining"));

    model.failing.store(false, Ordering::SeqCst);
    let reply = tutor.handle_message("ada", "quiz me on optics").await;
    assert_eq!(reply.intent, "quiz");

    let session = tutor.current_session("ada").await;
    assert_eq!(session.quiz_phase, QuizPhase::Generated);
    assert_eq!(session.conversation_history.len(), 6);

    cleanup(&path);
}

#[tokio::test]
async fn test_concurrent_results_for_one_student() {
    let path = temp_bank("concurrent");
    let bank = Arc::new(MemoryBank::open_file(path.clone()).await.expect("open"));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let bank = Arc::clone(&bank);
            tokio::spawn(async move {
                let topic = if i % 2 == 0 { "algebra" } else { "optics" };
                bank.record_quiz_result("ada", topic, 0.8, 5, 4).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task panicked");
    }

    let profile = bank.find_profile("ada").await.expect("profile");
    assert_eq!(profile.stats.total_quizzes, 20);
    assert_eq!(profile.quiz_history.len(), 20);
    assert_eq!(profile.topics_covered.len(), 2);

    let reopened = MemoryBank::open_file(path.clone()).await.expect("reopen");
    let profile = reopened.find_profile("ada").await.expect("profile");
    assert_eq!(profile.stats.total_quizzes, 20);

    cleanup(&path);
}

#[tokio::test]
async fn test_corrupted_bank_is_fatal() {
    let path = temp_bank("corrupted");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, "{ not json").expect("write");

    let err = MemoryBank::open_file(path.clone())
        .await
        .err()
        .expect("Corrupted file should not open");
    assert!(err.is_fatal());

    cleanup(&path);
}

#[test]
fn test_sessions_expire_after_inactivity() {
    let mut registry = SessionRegistry::new(Duration::minutes(30));
    let start = Utc::now();

    let first = registry.get_or_create_at("ada", start).session_id.clone();
    let same = registry
        .get_or_create_at("ada", start + Duration::minutes(30))
        .session_id
        .clone();
    assert_eq!(first, same);

    let fresh = registry
        .get_or_create_at("ada", start + Duration::minutes(31))
        .session_id
        .clone();
    assert_ne!(first, fresh);
    assert!(fresh.starts_with("session_ada_"));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_expired_session_drops_pending_quiz() {
    let timeout = Duration::minutes(30);
    let mut registry = SessionRegistry::new(timeout);
    let start = Utc::now();

    registry
        .get_or_create_at("ada", start)
        .begin_quiz(PendingQuiz {
            topic: "photosynthesis".to_string(),
            answer_key: vec![
                AnswerKeyEntry {
                    question_index: 1,
                    correct_letter: 'A',
                },
                AnswerKeyEntry {
                    question_index: 2,
                    correct_letter: 'B',
                },
            ],
            raw_question_text: FIVE_QUESTION_QUIZ.to_string(),
            created_at: start,
        })
        .expect("Idle -> Generated");

    let fresh = registry.get_or_create_at("ada", start + timeout + Duration::seconds(1));
    assert!(fresh.pending_quiz.is_none());
    assert_eq!(fresh.quiz_phase, QuizPhase::Idle);

    // Answers sent after expiry are not scored against the old quiz.
    assert_eq!(
        Router::default().route("ada", "1.A 2.B", fresh),
        Intent::Explain {
            topic: "1.A 2.B".to_string()
        }
    );
}

#[tokio::test]
async fn test_report_from_persisted_profile() {
    let path = temp_bank("report");
    let tutor = tutor_at(&path, Arc::new(FakeModel::default())).await;

    tutor.handle_message("ada", "quiz me on photosynthesis").await;
    tutor.handle_message("ada", "1.A 2.B 3.C 4.D 5.A").await;

    let profile = tutor.bank().find_profile("ada").await.expect("profile");
    let input = ReportInput {
        student_id: profile.id.clone(),
        created_at: profile.created_at,
        topics_covered: profile.topics_covered.clone(),
        strong_areas: profile.strong_areas.clone(),
        weak_areas: profile.weak_areas.clone(),
        quiz_history: profile
            .quiz_history
            .iter()
            .map(|q| QuizInput {
                timestamp: q.timestamp,
                topic: q.topic.clone(),
                score: q.score,
                total_questions: q.total_questions,
                correct_answers: q.correct_answers,
            })
            .collect(),
    };

    let report = ReportGenerator::new(input).generate().expect("report");
    let markdown = MarkdownGenerator::new(&report).generate();

    assert!(markdown.contains("| photosynthesis | 1 | 100.0% | 100.0% | 100.0% | Strong |"));
    assert!(markdown.contains("| Correct Answers | 5 / 5 |"));

    cleanup(&path);
}
