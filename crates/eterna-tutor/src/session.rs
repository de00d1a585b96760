//! Conversational sessions and the registry that owns them.
//!
//! Sessions are ephemeral. They hold the conversation history, the current
//! topic, and the quiz that is waiting for answers, and they expire after a
//! period of inactivity.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Number of recent messages shown by [`Session::context_summary`].
const CONTEXT_MESSAGES: usize = 5;

/// Characters kept per message in [`Session::context_summary`].
const CONTEXT_PREVIEW_CHARS: usize = 50;

// ============================================================================
// QuizPhase
// ============================================================================

/// Where a session is in the quiz lifecycle.
///
/// The phase cycles `Idle` -> `Generated` -> `Evaluated` -> `Idle`. A new
/// quiz may be generated from any phase and replaces a pending one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    /// No quiz in progress.
    #[default]
    Idle,
    /// A quiz was shown and its answer key is pending.
    Generated,
    /// The last quiz was scored.
    Evaluated,
}

impl QuizPhase {
    /// Returns `true` if moving from `self` to `next` is allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use eterna_tutor::session::QuizPhase;
    ///
    /// assert!(QuizPhase::Idle.can_transition_to(QuizPhase::Generated));
    /// assert!(QuizPhase::Generated.can_transition_to(QuizPhase::Evaluated));
    /// assert!(!QuizPhase::Idle.can_transition_to(QuizPhase::Evaluated));
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Generated) | (Self::Generated, Self::Evaluated) | (Self::Evaluated, Self::Idle)
        )
    }
}

impl std::fmt::Display for QuizPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Generated => write!(f, "generated"),
            Self::Evaluated => write!(f, "evaluated"),
        }
    }
}

// ============================================================================
// Messages and pending quizzes
// ============================================================================

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The learner.
    Student,
    /// The tutor.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
}

/// The correct option for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    /// 1-based question number.
    pub question_index: usize,
    /// Correct option, one of `A`..=`D`.
    pub correct_letter: char,
}

/// A quiz that has been shown and is waiting for answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuiz {
    /// Topic the quiz covers.
    pub topic: String,
    /// Answer key in question order.
    pub answer_key: Vec<AnswerKeyEntry>,
    /// Generated text with the answer lines still in place.
    pub raw_question_text: String,
    /// When the quiz was generated.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Session
// ============================================================================

/// Conversational state for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: String,
    /// Owning student.
    pub student_id: String,
    /// When the session started.
    pub created_at: DateTime<Utc>,
    /// Last time a message was appended.
    pub last_activity_at: DateTime<Utc>,
    /// Topic of the last explanation or quiz.
    pub current_topic: Option<String>,
    /// Append-only message log.
    pub conversation_history: Vec<ChatMessage>,
    /// Quiz waiting for answers, if any.
    pub pending_quiz: Option<PendingQuiz>,
    /// Quiz lifecycle phase.
    pub quiz_phase: QuizPhase,
}

impl Session {
    /// Creates a session for `student_id` starting at `now`.
    #[must_use]
    pub fn new(student_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let student_id = student_id.into();
        Self {
            session_id: format!("session_{student_id}_{}", now.timestamp_micros()),
            student_id,
            created_at: now,
            last_activity_at: now,
            current_topic: None,
            conversation_history: Vec::new(),
            pending_quiz: None,
            quiz_phase: QuizPhase::Idle,
        }
    }

    /// Updates the activity timestamp to the current time.
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Appends a message and refreshes the activity timestamp.
    pub fn append_message(&mut self, role: Role, content: impl Into<String>) {
        self.conversation_history.push(ChatMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        self.touch();
    }

    /// Returns `true` once more than `timeout` has passed since the last activity.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity_at > timeout
    }

    /// Returns `true` if a quiz is waiting for answers.
    #[must_use]
    pub const fn has_pending_quiz(&self) -> bool {
        self.pending_quiz.is_some()
    }

    /// Moves the quiz lifecycle to `next`.
    pub fn transition(&mut self, next: QuizPhase) -> Result<()> {
        if !self.quiz_phase.can_transition_to(next) {
            return Err(TutorError::invalid_transition(self.quiz_phase, next));
        }
        self.quiz_phase = next;
        Ok(())
    }

    /// Stores a freshly generated quiz, replacing any pending one.
    pub fn begin_quiz(&mut self, quiz: PendingQuiz) -> Result<()> {
        self.transition(QuizPhase::Generated)?;
        if let Some(previous) = self.pending_quiz.replace(quiz) {
            tracing::debug!(
                session_id = %self.session_id,
                topic = %previous.topic,
                "Discarded unanswered quiz"
            );
        }
        Ok(())
    }

    /// Takes the pending quiz for scoring and marks the phase as evaluated.
    pub fn finish_quiz(&mut self) -> Result<PendingQuiz> {
        let quiz = self.pending_quiz.take().ok_or(TutorError::NoActiveQuiz)?;
        self.transition(QuizPhase::Evaluated)?;
        Ok(quiz)
    }

    /// Returns an evaluated session to idle. No-op in any other phase.
    pub fn settle_quiz(&mut self) {
        if self.quiz_phase == QuizPhase::Evaluated {
            self.quiz_phase = QuizPhase::Idle;
        }
    }

    /// Renders the current topic and the last few messages.
    #[must_use]
    pub fn context_summary(&self) -> String {
        if self.conversation_history.is_empty() {
            return "New session started.".to_string();
        }

        let start = self
            .conversation_history
            .len()
            .saturating_sub(CONTEXT_MESSAGES);
        let recent = &self.conversation_history[start..];

        let mut summary = format!(
            "Current topic: {}\nRecent messages ({}):\n",
            self.current_topic.as_deref().unwrap_or("General"),
            recent.len()
        );
        for message in recent {
            let preview: String = message.content.chars().take(CONTEXT_PREVIEW_CHARS).collect();
            let _ = writeln!(summary, "- {}: {preview}...", message.role);
        }
        summary
    }
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// Owns every session. Expired sessions are kept but never returned.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    timeout: Duration,
}

impl SessionRegistry {
    /// Creates an empty registry with the given inactivity timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            sessions: Vec::new(),
            timeout,
        }
    }

    /// Returns the live session for `student_id`, creating one if needed.
    pub fn get_or_create(&mut self, student_id: &str) -> &mut Session {
        self.get_or_create_at(student_id, Utc::now())
    }

    /// Same as [`Self::get_or_create`] with an explicit clock.
    pub fn get_or_create_at(&mut self, student_id: &str, now: DateTime<Utc>) -> &mut Session {
        let timeout = self.timeout;
        let position = self
            .sessions
            .iter()
            .position(|s| s.student_id == student_id && !s.is_expired(now, timeout));

        let index = if let Some(index) = position {
            index
        } else {
            let session = Session::new(student_id, now);
            tracing::info!(student_id, session_id = %session.session_id, "Started new session");
            self.sessions.push(session);
            self.sessions.len() - 1
        };
        &mut self.sessions[index]
    }

    /// Looks up a session by id, whether or not it has expired.
    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.session_id == session_id)
    }

    /// Replaces the stored session that has the same id as `session`.
    ///
    /// Returns `false` if no such session exists.
    pub fn store(&mut self, session: Session) -> bool {
        match self.get_mut(&session.session_id) {
            Some(slot) => {
                *slot = session;
                true
            }
            None => false,
        }
    }

    /// Number of sessions that have not expired.
    #[must_use]
    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|s| !s.is_expired(now, self.timeout))
            .count()
    }

    /// Number of sessions held, including expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions have been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
