//! Quiz generation and scoring.
//!
//! [`QuizEngine::generate`] asks the model for a fixed-format multiple-choice
//! quiz, keeps the answer key in the session, and returns the quiz with the
//! answers removed. [`QuizEngine::evaluate`] scores a submission against the
//! pending key and records the result in the memory bank.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::QuizConfig;
use crate::error::{Result, TutorError};
use crate::llm::LanguageModel;
use crate::profile::{score_fraction, STRONG_THRESHOLD, WEAK_THRESHOLD};
use crate::session::{AnswerKeyEntry, PendingQuiz, Session};
use crate::store::MemoryBank;

/// Lexical patterns that name the topic of a quiz request, tried in order.
static TOPIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"quiz me on (.+)",
        r"quiz me about (.+)",
        r"quiz on (.+)",
        r"quiz about (.+)",
        r"test me on (.+)",
        r"(.+) quiz",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// An answer line such as `Correct: B` or `**Correct Answer: b)**`.
static ANSWER_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^[\s*_>-]*correct(?:\s+answer)?\s*:\s*\W*([a-d])\b").ok());

/// A question label at the start of a line, such as `Q3:` or `**Q3.**`.
static QUESTION_LABEL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?im)^[\s*_#>-]*q(\d+)\s*[:.)]").ok());

/// A submitted answer token, such as `3.c`.
static SUBMISSION_TOKEN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d+)\.([A-Da-d])").ok());

const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

// ============================================================================
// Parsing
// ============================================================================

/// Extracts the topic from a quiz request, lowercased.
///
/// # Examples
///
/// ```
/// use eterna_tutor::quiz::extract_topic;
///
/// assert_eq!(extract_topic("Quiz me on Photosynthesis"), Some("photosynthesis".to_string()));
/// assert_eq!(extract_topic("algebra quiz"), Some("algebra".to_string()));
/// assert_eq!(extract_topic("give me questions"), None);
/// ```
#[must_use]
pub fn extract_topic(request: &str) -> Option<String> {
    let lowered = request.to_lowercase();
    TOPIC_PATTERNS.iter().find_map(|re| {
        re.captures(&lowered)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().trim_end_matches(['?', '!', '.']).trim().to_string())
            .filter(|topic| !topic.is_empty())
    })
}

fn answer_letter(line: &str) -> Option<char> {
    let re = ANSWER_LINE.as_ref()?;
    re.captures(line.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

/// Reads the answer key from `Correct:` lines in the order they appear.
///
/// The n-th answer line is the key for question n.
#[must_use]
pub fn parse_answer_key(text: &str) -> Vec<AnswerKeyEntry> {
    text.lines()
        .filter_map(answer_letter)
        .enumerate()
        .map(|(i, correct_letter)| AnswerKeyEntry {
            question_index: i + 1,
            correct_letter,
        })
        .collect()
}

/// Counts `Q{n}` labels at line starts.
#[must_use]
pub fn count_question_labels(text: &str) -> usize {
    QUESTION_LABEL
        .as_ref()
        .map_or(0, |re| re.find_iter(text).count())
}

/// Removes answer lines so the quiz can be shown to the student.
#[must_use]
pub fn strip_answers(text: &str) -> String {
    text.lines()
        .filter(|line| answer_letter(line).is_none())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Checks a parsed key against the requested shape.
///
/// Rejects a key with fewer entries than `expected`, and a quiz whose
/// question labels disagree in count with its answer lines.
pub fn validate_quiz(text: &str, key: &[AnswerKeyEntry], expected: usize) -> Result<()> {
    if key.len() < expected {
        return Err(TutorError::malformed_quiz(expected, key.len()));
    }
    let labels = count_question_labels(text);
    if labels > 0 && labels != key.len() {
        return Err(TutorError::malformed_quiz(labels, key.len()));
    }
    Ok(())
}

/// Parses `{number}.{letter}` tokens. The last answer for a question wins.
///
/// # Examples
///
/// ```
/// use eterna_tutor::quiz::parse_submission;
///
/// let answers = parse_submission("1.a, 2.B then 1.C");
/// assert_eq!(answers.get(&1), Some(&'C'));
/// assert_eq!(answers.get(&2), Some(&'B'));
/// ```
#[must_use]
pub fn parse_submission(raw: &str) -> BTreeMap<usize, char> {
    let Some(re) = SUBMISSION_TOKEN.as_ref() else {
        return BTreeMap::new();
    };
    re.captures_iter(raw)
        .filter_map(|caps| {
            let index = caps.get(1)?.as_str().parse::<usize>().ok()?;
            let letter = caps.get(2)?.as_str().chars().next()?.to_ascii_uppercase();
            Some((index, letter))
        })
        .collect()
}

// ============================================================================
// Scoring
// ============================================================================

/// Qualitative band for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// `score >= 0.8`.
    Excellent,
    /// `0.6 <= score < 0.8`.
    Good,
    /// `score < 0.6`.
    KeepPracticing,
}

impl ScoreBand {
    /// Classifies a score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= STRONG_THRESHOLD {
            Self::Excellent
        } else if score >= WEAK_THRESHOLD {
            Self::Good
        } else {
            Self::KeepPracticing
        }
    }

    /// The encouragement line shown under a score.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Excellent => "🎉 Excellent work!",
            Self::Good => "👍 Good job!",
            Self::KeepPracticing => "💪 Keep practicing!",
        }
    }
}

/// Outcome for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionOutcome {
    /// 1-based question number.
    pub question_index: usize,
    /// What the student answered, if anything.
    pub submitted: Option<char>,
    /// The correct option.
    pub correct: char,
}

impl QuestionOutcome {
    /// Returns `true` if the submitted answer matches the key.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.submitted == Some(self.correct)
    }
}

/// A scored submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Topic of the scored quiz.
    pub topic: String,
    /// One outcome per key entry, in question order.
    pub outcomes: Vec<QuestionOutcome>,
    /// Number of correct answers.
    pub correct_count: usize,
    /// Number of questions in the key.
    pub total: usize,
    /// `correct_count / total`, or `0.0` for an empty key.
    pub score: f64,
}

impl Evaluation {
    /// Scores `submitted` against `key`. Unanswered questions count as wrong.
    #[must_use]
    pub fn score(
        topic: impl Into<String>,
        key: &[AnswerKeyEntry],
        submitted: &BTreeMap<usize, char>,
    ) -> Self {
        let outcomes: Vec<_> = key
            .iter()
            .map(|entry| QuestionOutcome {
                question_index: entry.question_index,
                submitted: submitted.get(&entry.question_index).copied(),
                correct: entry.correct_letter,
            })
            .collect();
        let correct_count = outcomes.iter().filter(|o| o.is_correct()).count();
        let total = key.len();

        Self {
            topic: topic.into(),
            outcomes,
            correct_count,
            total,
            score: score_fraction(correct_count, total),
        }
    }

    /// The qualitative band of this score.
    #[must_use]
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.score)
    }

    /// Renders per-question feedback, the score line, and the band message.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("📊 **Quiz Results: {}**\n\n", self.topic);
        for outcome in &self.outcomes {
            let i = outcome.question_index;
            if outcome.is_correct() {
                let _ = writeln!(out, "✅ Q{i}: Correct!");
            } else {
                let submitted = outcome.submitted.unwrap_or('?');
                let _ = writeln!(
                    out,
                    "❌ Q{i}: Your answer: {submitted}, Correct: {}",
                    outcome.correct
                );
            }
        }
        let _ = write!(
            out,
            "\n**Score: {}/{} ({:.0}%)**\n\n{}",
            self.correct_count,
            self.total,
            self.score * 100.0,
            self.band().message()
        );
        out
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Generates quizzes and scores submissions.
pub struct QuizEngine {
    model: Arc<dyn LanguageModel>,
    question_count: usize,
    default_topic: String,
}

impl QuizEngine {
    /// Creates an engine backed by `model`.
    pub fn new(model: Arc<dyn LanguageModel>, config: &QuizConfig) -> Self {
        Self {
            model,
            question_count: config.question_count,
            default_topic: config.default_topic.clone(),
        }
    }

    /// Resolves the topic for a request: explicit, then session, then default.
    #[must_use]
    pub fn resolve_topic(&self, request: &str, session: &Session) -> String {
        extract_topic(request)
            .or_else(|| session.current_topic.clone())
            .unwrap_or_else(|| self.default_topic.clone())
    }

    /// Builds the generation prompt for `topic`.
    #[must_use]
    pub fn build_prompt(&self, topic: &str) -> String {
        format!(
            "Create a quiz on: {topic}\n\n\
             Generate exactly {} multiple-choice questions. Format:\n\n\
             Q1: [Question]\n\
             A) [Option A]\n\
             B) [Option B]\n\
             C) [Option C]\n\
             D) [Option D]\n\
             Correct: [A/B/C/D]\n\n\
             Make questions test understanding.",
            self.question_count
        )
    }

    fn submission_hint(&self) -> String {
        (1..=self.question_count)
            .map(|i| format!("{i}.{}", OPTION_LETTERS[(i - 1) % OPTION_LETTERS.len()]))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Generates a quiz and stores its answer key in `session`.
    ///
    /// Replaces any quiz that was still pending. Nothing is persisted. The
    /// session is left untouched when generation or validation fails.
    pub async fn generate(&self, request: &str, session: &mut Session) -> Result<String> {
        let topic = self.resolve_topic(request, session);
        tracing::info!(session_id = %session.session_id, topic = %topic, "Generating quiz");

        let text = self.model.generate(&self.build_prompt(&topic)).await?;
        let answer_key = parse_answer_key(&text);
        if let Err(e) = validate_quiz(&text, &answer_key, self.question_count) {
            tracing::warn!(topic = %topic, error = %e, "Rejected generated quiz");
            return Err(e);
        }

        let display = format!(
            "**Quiz: {topic}**\n\n{}\n\n**Submit answers as:** `{}`",
            strip_answers(&text),
            self.submission_hint()
        );

        session.begin_quiz(PendingQuiz {
            topic: topic.clone(),
            answer_key,
            raw_question_text: text,
            created_at: Utc::now(),
        })?;
        session.current_topic = Some(topic);

        Ok(display)
    }

    /// Scores `raw_answers` against the pending quiz and records the result.
    ///
    /// Fails with [`TutorError::NoActiveQuiz`] when nothing is pending. The
    /// pending quiz is consumed, so a second submission is not scored again.
    pub async fn evaluate(
        &self,
        student_id: &str,
        raw_answers: &str,
        session: &mut Session,
        bank: &MemoryBank,
    ) -> Result<Evaluation> {
        let quiz = session.finish_quiz()?;
        let submitted = parse_submission(raw_answers);
        let evaluation = Evaluation::score(&quiz.topic, &quiz.answer_key, &submitted);

        tracing::info!(
            student_id,
            topic = %evaluation.topic,
            correct = evaluation.correct_count,
            total = evaluation.total,
            "Evaluated quiz"
        );

        bank.record_quiz_result(
            student_id,
            &evaluation.topic,
            evaluation.score,
            evaluation.total,
            evaluation.correct_count,
        )
        .await;

        Ok(evaluation)
    }
}
