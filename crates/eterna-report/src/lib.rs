//! EternaLearn Report Generation
//!
//! This crate turns a student's learning record into a progress report.
//! Reports can be serialized to JSON for programmatic access or rendered to
//! Markdown for the student or a teacher to read.
//!
//! # Types
//!
//! - [`ReportInput`] / [`QuizInput`] - Learning record handed in by the caller
//! - [`ProgressReport`] - The complete derived report
//! - [`ReportSummary`] - Headline statistics
//! - [`TopicBreakdown`] - Per-topic attempts and scores
//! - [`TimelineEntry`] - One quiz in chronological order
//!
//! # Generators
//!
//! - [`ReportGenerator`] - Derive a [`ProgressReport`] from a [`ReportInput`]
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use eterna_report::{json::JsonGenerator, QuizInput, ReportGenerator, ReportInput};
//!
//! let input = ReportInput {
//!     student_id: "student_001".to_string(),
//!     created_at: Utc::now(),
//!     topics_covered: vec!["algebra".to_string()],
//!     strong_areas: vec!["algebra".to_string()],
//!     weak_areas: vec![],
//!     quiz_history: vec![QuizInput {
//!         timestamp: Utc::now(),
//!         topic: "algebra".to_string(),
//!         score: 0.8,
//!         total_questions: 5,
//!         correct_answers: 4,
//!     }],
//! };
//!
//! let report = ReportGenerator::new(input).generate().unwrap();
//! assert_eq!(report.summary.total_quizzes, 1);
//!
//! let json = JsonGenerator::new(&report).generate_pretty().unwrap();
//! assert!(json.contains("\"student_id\""));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Score at or above which an attempt counts as mastered.
const STRONG_THRESHOLD: f64 = 0.8;

/// Score below which an attempt needs review.
const WEAK_THRESHOLD: f64 = 0.6;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Input (local copy to avoid cross-crate dependency)
// ============================================================================

/// A student's learning record.
///
/// This mirrors the tutor's `StudentProfile` so this crate does not depend
/// on the tutoring engine. Callers convert their profile into this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    /// Student identifier.
    pub student_id: String,
    /// When the student's profile was created.
    pub created_at: DateTime<Utc>,
    /// Topics in first-seen order.
    pub topics_covered: Vec<String>,
    /// Topics classified as strong.
    pub strong_areas: Vec<String>,
    /// Topics classified as needing review.
    pub weak_areas: Vec<String>,
    /// Chronological quiz history.
    pub quiz_history: Vec<QuizInput>,
}

/// One recorded quiz in a [`ReportInput`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizInput {
    /// When the quiz was scored.
    pub timestamp: DateTime<Utc>,
    /// Topic of the quiz.
    pub topic: String,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Questions in the quiz.
    pub total_questions: usize,
    /// Questions answered correctly.
    pub correct_answers: usize,
}

// ============================================================================
// Report
// ============================================================================

/// Complete progress report for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Student the report is about.
    pub student_id: String,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,

    /// Headline statistics.
    pub summary: ReportSummary,

    /// Per-topic breakdown in first-seen order.
    pub topics: Vec<TopicBreakdown>,

    /// Every quiz in chronological order.
    pub timeline: Vec<TimelineEntry>,
}

impl ProgressReport {
    /// Serializes the report to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ReportError::from)
    }

    /// Topics that need review, worst mean score first.
    #[must_use]
    pub fn topics_to_review(&self) -> Vec<&TopicBreakdown> {
        let mut review: Vec<_> = self
            .topics
            .iter()
            .filter(|t| matches!(t.mastery, Mastery::Review | Mastery::Mixed))
            .collect();
        review.sort_by(|a, b| a.mean_score.total_cmp(&b.mean_score));
        review
    }
}

/// Headline statistics for a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// When the student started.
    pub member_since: Option<DateTime<Utc>>,
    /// Distinct topics covered.
    pub total_topics: usize,
    /// Quizzes completed.
    pub total_quizzes: usize,
    /// Unweighted mean of all quiz scores.
    pub average_score: f64,
    /// Questions answered correctly across all quizzes.
    pub total_correct: usize,
    /// Questions asked across all quizzes.
    pub total_questions: usize,
    /// Topics classified as strong.
    pub strong_areas: Vec<String>,
    /// Topics classified as needing review.
    pub weak_areas: Vec<String>,
}

/// How well a topic is going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mastery {
    /// Listed only as a strong area.
    Strong,
    /// Listed only as needing review.
    Review,
    /// Listed as both strong and needing review.
    Mixed,
    /// Neither list yet.
    InProgress,
}

impl Mastery {
    /// Returns a human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Strong => "Strong",
            Self::Review => "Needs review",
            Self::Mixed => "Mixed",
            Self::InProgress => "In progress",
        }
    }
}

impl std::fmt::Display for Mastery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Attempts and scores for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicBreakdown {
    /// Topic name.
    pub topic: String,
    /// Number of quizzes on this topic.
    pub attempts: usize,
    /// Highest score.
    pub best_score: f64,
    /// Most recent score.
    pub latest_score: f64,
    /// Mean score over all attempts.
    pub mean_score: f64,
    /// Classification from the strong/weak lists.
    pub mastery: Mastery,
}

/// One quiz in the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// When the quiz was scored.
    pub timestamp: DateTime<Utc>,
    /// Topic of the quiz.
    pub topic: String,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Questions answered correctly.
    pub correct_answers: usize,
    /// Questions in the quiz.
    pub total_questions: usize,
}

// ============================================================================
// Report Generator
// ============================================================================

/// Derives a [`ProgressReport`] from a [`ReportInput`].
pub struct ReportGenerator {
    input: ReportInput,
}

impl ReportGenerator {
    /// Creates a generator for `input`.
    #[must_use]
    pub const fn new(input: ReportInput) -> Self {
        Self { input }
    }

    /// Generates the report stamped with the current time.
    pub fn generate(self) -> Result<ProgressReport> {
        self.generate_at(Utc::now())
    }

    /// Generates the report stamped with `generated_at`.
    ///
    /// Fails with [`ReportError::InvalidData`] for a blank student id or a
    /// score outside `[0, 1]`.
    pub fn generate_at(self, generated_at: DateTime<Utc>) -> Result<ProgressReport> {
        let input = self.input;
        if input.student_id.trim().is_empty() {
            return Err(ReportError::InvalidData(
                "student id must not be empty".to_string(),
            ));
        }
        if let Some(quiz) = input
            .quiz_history
            .iter()
            .find(|q| !(0.0..=1.0).contains(&q.score))
        {
            return Err(ReportError::InvalidData(format!(
                "score {} for topic '{}' is outside [0, 1]",
                quiz.score, quiz.topic
            )));
        }

        let topics = topic_breakdowns(&input);
        let summary = summarize(&input);
        let timeline = input
            .quiz_history
            .into_iter()
            .map(|q| TimelineEntry {
                timestamp: q.timestamp,
                topic: q.topic,
                score: q.score,
                correct_answers: q.correct_answers,
                total_questions: q.total_questions,
            })
            .collect();

        Ok(ProgressReport {
            student_id: input.student_id,
            generated_at,
            summary,
            topics,
            timeline,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn summarize(input: &ReportInput) -> ReportSummary {
    let scores: Vec<f64> = input.quiz_history.iter().map(|q| q.score).collect();
    ReportSummary {
        member_since: Some(input.created_at),
        total_topics: input.topics_covered.len(),
        total_quizzes: input.quiz_history.len(),
        average_score: mean(&scores),
        total_correct: input.quiz_history.iter().map(|q| q.correct_answers).sum(),
        total_questions: input.quiz_history.iter().map(|q| q.total_questions).sum(),
        strong_areas: input.strong_areas.clone(),
        weak_areas: input.weak_areas.clone(),
    }
}

fn topic_breakdowns(input: &ReportInput) -> Vec<TopicBreakdown> {
    let mut order: Vec<&str> = input.topics_covered.iter().map(String::as_str).collect();
    for quiz in &input.quiz_history {
        if !order.contains(&quiz.topic.as_str()) {
            order.push(&quiz.topic);
        }
    }

    order
        .into_iter()
        .filter_map(|topic| {
            let scores: Vec<f64> = input
                .quiz_history
                .iter()
                .filter(|q| q.topic == topic)
                .map(|q| q.score)
                .collect();
            let latest = *scores.last()?;
            Some(TopicBreakdown {
                topic: topic.to_string(),
                attempts: scores.len(),
                best_score: scores.iter().copied().fold(0.0, f64::max),
                latest_score: latest,
                mean_score: mean(&scores),
                mastery: classify(input, topic, latest),
            })
        })
        .collect()
}

fn classify(input: &ReportInput, topic: &str, latest: f64) -> Mastery {
    let strong = input.strong_areas.iter().any(|t| t == topic);
    let weak = input.weak_areas.iter().any(|t| t == topic);
    match (strong, weak) {
        (true, true) => Mastery::Mixed,
        (true, false) => Mastery::Strong,
        (false, true) => Mastery::Review,
        (false, false) if latest >= STRONG_THRESHOLD => Mastery::Strong,
        (false, false) if latest < WEAK_THRESHOLD => Mastery::Review,
        (false, false) => Mastery::InProgress,
    }
}

// ============================================================================
// Tests
// ============================================================================
