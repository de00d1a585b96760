//! Intent routing.
//!
//! A [`Router`] walks an ordered list of [`Rule`]s and returns the intent of
//! the first rule that matches. Messages that match nothing are explained.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::session::Session;

/// A digit immediately followed by a dot, as in `1.A`.
static ANSWER_TOKEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d\.").ok());

/// What the student is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Explain a topic.
    Explain {
        /// The message to explain, used verbatim as the topic.
        topic: String,
    },
    /// Generate a new quiz.
    StartQuiz {
        /// The raw quiz request.
        request: String,
    },
    /// Score answers against the pending quiz.
    SubmitAnswers {
        /// The raw submission.
        answers: String,
    },
    /// Show progress statistics.
    ShowProgress,
}

impl Intent {
    /// Short name used in logs and API responses.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Explain { .. } => "explain",
            Self::StartQuiz { .. } => "quiz",
            Self::SubmitAnswers { .. } => "evaluate",
            Self::ShowProgress => "progress",
        }
    }
}

/// One routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Any of these substrings requests progress.
    ProgressKeywords(Vec<String>),
    /// An answer token while a quiz is pending submits answers.
    AnswerSubmission,
    /// Any of these substrings requests a quiz.
    QuizKeywords(Vec<String>),
}

impl Rule {
    /// Returns the intent this rule yields for `message`, if it matches.
    ///
    /// `lowered` is `message` in lowercase.
    fn apply(&self, message: &str, lowered: &str, session: &Session) -> Option<Intent> {
        match self {
            Self::ProgressKeywords(keywords) => {
                contains_any(lowered, keywords).then_some(Intent::ShowProgress)
            }
            Self::AnswerSubmission => {
                let looks_like_answers = ANSWER_TOKEN
                    .as_ref()
                    .is_some_and(|re| re.is_match(message));
                (looks_like_answers && session.has_pending_quiz()).then(|| Intent::SubmitAnswers {
                    answers: message.to_string(),
                })
            }
            Self::QuizKeywords(keywords) => {
                contains_any(lowered, keywords).then(|| Intent::StartQuiz {
                    request: message.to_string(),
                })
            }
        }
    }
}

fn contains_any(lowered: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && lowered.contains(&k))
}

/// Classifies messages into intents.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<Rule>,
}

impl Router {
    /// Builds the default rule order from routing keywords:
    /// progress, answer submission, quiz.
    #[must_use]
    pub fn new(config: &RoutingConfig) -> Self {
        Self::with_rules(vec![
            Rule::ProgressKeywords(config.progress_keywords.clone()),
            Rule::AnswerSubmission,
            Rule::QuizKeywords(config.quiz_keywords.clone()),
        ])
    }

    /// Builds a router from an explicit rule list, evaluated in order.
    #[must_use]
    pub const fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Routes `message` for `student_id`.
    pub fn route(&self, student_id: &str, message: &str, session: &Session) -> Intent {
        let lowered = message.to_lowercase();
        let intent = self
            .rules
            .iter()
            .find_map(|rule| rule.apply(message, &lowered, session))
            .unwrap_or_else(|| Intent::Explain {
                topic: message.to_string(),
            });

        tracing::info!(student_id, intent = intent.name(), "Routed message");
        intent
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}
