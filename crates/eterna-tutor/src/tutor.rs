//! The request boundary.
//!
//! [`Tutor::handle_message`] is the single entry point used by every
//! surface. It serializes work per student, routes the message, dispatches
//! to the quiz engine, the explainer, or the progress report, writes the
//! session back, and turns every failure into a message for the student.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{Result, TutorError};
use crate::explain::Explainer;
use crate::llm::LanguageModel;
use crate::quiz::QuizEngine;
use crate::router::{Intent, Router};
use crate::session::{Role, Session, SessionRegistry};
use crate::store::MemoryBank;

/// Reply to an empty message.
pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a message :)";

/// Reply when a quiz could not be generated.
pub const QUIZ_APOLOGY: &str = "I had trouble creating a quiz. Please try again.";

/// Reply when answers arrive with no quiz pending.
pub const NO_ACTIVE_QUIZ_REPLY: &str = "No active quiz found!";

/// Reply for any unexpected failure.
pub const GENERIC_APOLOGY: &str = "Something went wrong on my side. Please try again!";

/// Number of recent quizzes listed in a progress report.
const RECENT_QUIZZES: usize = 3;

/// Words that end an interactive session.
const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

/// Returns `true` if `input` asks to leave the interactive session.
///
/// # Examples
///
/// ```
/// use eterna_tutor::tutor::is_exit_command;
///
/// assert!(is_exit_command(" Bye "));
/// assert!(!is_exit_command("bye for now"));
/// ```
#[must_use]
pub fn is_exit_command(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    EXIT_WORDS.contains(&lowered.as_str())
}

/// The tutor's answer to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Name of the routed intent (`explain`, `quiz`, `evaluate`, `progress`),
    /// or `empty`/`error` when nothing was routed.
    pub intent: &'static str,
    /// Markdown text shown to the student.
    pub text: String,
    /// Session that handled the message, if one was involved.
    pub session_id: Option<String>,
}

/// Tutoring service shared by the CLI and the HTTP API.
pub struct Tutor {
    router: Router,
    quiz: QuizEngine,
    explainer: Explainer,
    bank: Arc<MemoryBank>,
    sessions: Mutex<SessionRegistry>,
    student_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Tutor {
    /// Assembles a tutor from configuration, a model, and an opened store.
    pub fn new(config: &Config, model: Arc<dyn LanguageModel>, bank: Arc<MemoryBank>) -> Self {
        Self {
            router: Router::new(&config.routing),
            quiz: QuizEngine::new(model.clone(), &config.quiz),
            explainer: Explainer::new(model, config.visuals.clone()),
            bank,
            sessions: Mutex::new(SessionRegistry::new(config.session_timeout())),
            student_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The memory bank backing this tutor.
    #[must_use]
    pub const fn bank(&self) -> &Arc<MemoryBank> {
        &self.bank
    }

    /// Handles one message. Never fails.
    pub async fn handle_message(&self, student_id: &str, message: &str) -> Reply {
        let message = message.trim();
        if message.is_empty() {
            return Reply {
                intent: "empty",
                text: EMPTY_MESSAGE_REPLY.to_string(),
                session_id: None,
            };
        }

        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;

        match AssertUnwindSafe(self.process(student_id, message))
            .catch_unwind()
            .await
        {
            Ok(reply) => reply,
            Err(_) => {
                tracing::error!(student_id, "Request panicked");
                Reply {
                    intent: "error",
                    text: GENERIC_APOLOGY.to_string(),
                    session_id: None,
                }
            }
        }
    }

    async fn student_lock(&self, student_id: &str) -> Arc<Mutex<()>> {
        self.student_locks
            .lock()
            .await
            .entry(student_id.to_string())
            .or_default()
            .clone()
    }

    async fn process(&self, student_id: &str, message: &str) -> Reply {
        let mut session = {
            let mut registry = self.sessions.lock().await;
            let session = registry.get_or_create(student_id);
            session.settle_quiz();
            session.clone()
        };

        let intent = self.router.route(student_id, message, &session);
        let text = match self.dispatch(student_id, &intent, &mut session).await {
            Ok(text) => text,
            Err(e) => recover(&intent, &e),
        };

        session.append_message(Role::Student, message);
        session.append_message(Role::Assistant, text.clone());
        let session_id = session.session_id.clone();

        if !self.sessions.lock().await.store(session) {
            tracing::warn!(student_id, session_id = %session_id, "Session vanished before write-back");
        }

        Reply {
            intent: intent.name(),
            text,
            session_id: Some(session_id),
        }
    }

    async fn dispatch(
        &self,
        student_id: &str,
        intent: &Intent,
        session: &mut Session,
    ) -> Result<String> {
        match intent {
            Intent::ShowProgress => Ok(self.progress_report(student_id).await),
            Intent::SubmitAnswers { answers } => {
                let evaluation = self
                    .quiz
                    .evaluate(student_id, answers, session, &self.bank)
                    .await?;
                Ok(evaluation.render())
            }
            Intent::StartQuiz { request } => self.quiz.generate(request, session).await,
            Intent::Explain { topic } => self.explainer.explain(topic, session).await,
        }
    }

    /// Progress summary plus the most recent quizzes. Never creates a profile.
    pub async fn progress_report(&self, student_id: &str) -> String {
        let mut report = self.bank.progress_summary(student_id).await;
        if let Some(profile) = self.bank.find_profile(student_id).await {
            let recent = profile.recent_quizzes(RECENT_QUIZZES);
            if !recent.is_empty() {
                report.push_str("\n\n**Recent Quizzes:**");
                for quiz in recent {
                    let _ = write!(report, "\n• {}: {:.0}%", quiz.topic, quiz.percent());
                }
            }
        }
        report
    }

    /// A copy of the live session for `student_id`, creating one if needed.
    pub async fn current_session(&self, student_id: &str) -> Session {
        self.sessions
            .lock()
            .await
            .get_or_create(student_id)
            .clone()
    }

    /// Number of sessions that have not expired.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.active_count()
    }

    /// Flushes the memory bank.
    pub async fn close(&self) -> Result<()> {
        self.bank.close().await
    }
}

fn recover(intent: &Intent, error: &TutorError) -> String {
    match (intent, error) {
        (_, TutorError::NoActiveQuiz) => NO_ACTIVE_QUIZ_REPLY.to_string(),
        (
            Intent::StartQuiz { .. },
            TutorError::GenerationError { .. } | TutorError::MalformedQuiz { .. },
        ) => {
            tracing::warn!(error = %error, "Quiz generation failed");
            QUIZ_APOLOGY.to_string()
        }
        (Intent::Explain { topic }, TutorError::GenerationError { .. }) => {
            tracing::warn!(error = %error, "Explanation failed");
            format!("I had trouble explaining {topic}. Could you rephrase your question?")
        }
        _ => {
            tracing::error!(intent = intent.name(), error = %error, "Request failed");
            GENERIC_APOLOGY.to_string()
        }
    }
}
