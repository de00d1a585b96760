//! Student profiles and progress tracking.
//!
//! A [`StudentProfile`] carries the quiz history of one student together
//! with aggregate statistics derived from it. All mutation goes through
//! [`StudentProfile::record_quiz_result`], which keeps the statistics and
//! the strong/weak classification consistent with the history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score at or above which a topic is classified as a strong area.
pub const STRONG_THRESHOLD: f64 = 0.8;

/// Score below which a topic is classified as a weak area.
pub const WEAK_THRESHOLD: f64 = 0.6;

/// Maximum number of strong or weak areas listed in a summary.
const SUMMARY_AREA_LIMIT: usize = 3;

const SUMMARY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// One scored quiz attempt. Immutable once appended to a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    /// When the result was recorded.
    pub timestamp: DateTime<Utc>,
    /// Topic the quiz covered.
    pub topic: String,
    /// Fraction of correct answers in `[0, 1]`.
    pub score: f64,
    /// Number of questions in the answer key.
    pub total_questions: usize,
    /// Number of questions answered correctly.
    pub correct_answers: usize,
}

impl QuizResult {
    /// Builds a result from raw counts, computing the score.
    ///
    /// A quiz with zero questions scores `0.0`.
    #[must_use]
    pub fn from_counts(topic: impl Into<String>, correct: usize, total: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            topic: topic.into(),
            score: score_fraction(correct, total),
            total_questions: total,
            correct_answers: correct,
        }
    }

    /// Score as a whole percentage.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.score * 100.0
    }
}

/// Computes `correct / total`, or `0.0` when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_fraction(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

/// Learning preferences stored with a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Preferred presentation style.
    pub learning_style: String,
    /// Preferred difficulty.
    pub difficulty_level: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            learning_style: "visual".to_string(),
            difficulty_level: "medium".to_string(),
        }
    }
}

/// Aggregates derived from a profile's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    /// Number of distinct topics covered.
    pub total_topics: usize,
    /// Number of recorded quizzes.
    pub total_quizzes: usize,
    /// Unweighted mean of all quiz scores.
    pub average_score: f64,
}

/// Persistent learning record for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Stable external identifier.
    pub id: String,
    /// When the profile was first created.
    pub created_at: DateTime<Utc>,
    /// Topics seen in quizzes, in first-seen order, without duplicates.
    #[serde(default)]
    pub topics_covered: Vec<String>,
    /// Chronological, append-only quiz history.
    #[serde(default)]
    pub quiz_history: Vec<QuizResult>,
    /// Topics that scored below the weak threshold at least once.
    #[serde(default)]
    pub weak_areas: Vec<String>,
    /// Topics that scored at or above the strong threshold at least once.
    #[serde(default)]
    pub strong_areas: Vec<String>,
    /// Learning preferences.
    #[serde(default)]
    pub preferences: Preferences,
    /// Aggregates derived from `quiz_history` and `topics_covered`.
    #[serde(default)]
    pub stats: ProfileStats,
}

impl StudentProfile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            topics_covered: Vec::new(),
            quiz_history: Vec::new(),
            weak_areas: Vec::new(),
            strong_areas: Vec::new(),
            preferences: Preferences::default(),
            stats: ProfileStats::default(),
        }
    }

    /// Appends a result and updates statistics and classification.
    pub fn record_quiz_result(&mut self, result: QuizResult) {
        let topic = result.topic.clone();
        let score = result.score;
        self.quiz_history.push(result);

        if !self.topics_covered.contains(&topic) {
            self.topics_covered.push(topic.clone());
        }

        if score >= STRONG_THRESHOLD {
            if !self.strong_areas.contains(&topic) {
                self.strong_areas.push(topic);
            }
        } else if score < WEAK_THRESHOLD && !self.weak_areas.contains(&topic) {
            self.weak_areas.push(topic);
        }

        self.stats = self.computed_stats();
    }

    /// Statistics as they should be given the current history.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn computed_stats(&self) -> ProfileStats {
        let total_quizzes = self.quiz_history.len();
        let average_score = if total_quizzes == 0 {
            0.0
        } else {
            self.quiz_history.iter().map(|q| q.score).sum::<f64>() / total_quizzes as f64
        };
        ProfileStats {
            total_topics: self.topics_covered.len(),
            total_quizzes,
            average_score,
        }
    }

    /// Recomputes statistics from history.
    ///
    /// Returns `true` when the stored statistics disagreed and were replaced.
    pub fn reconcile_stats(&mut self) -> bool {
        let computed = self.computed_stats();
        let consistent = computed.total_topics == self.stats.total_topics
            && computed.total_quizzes == self.stats.total_quizzes
            && (computed.average_score - self.stats.average_score).abs() < 1e-9;
        if consistent {
            return false;
        }
        self.stats = computed;
        true
    }

    /// The last `n` quiz results, oldest first.
    #[must_use]
    pub fn recent_quizzes(&self, n: usize) -> &[QuizResult] {
        let start = self.quiz_history.len().saturating_sub(n);
        &self.quiz_history[start..]
    }

    /// Renders the progress summary block.
    #[must_use]
    pub fn summary(&self) -> String {
        render_summary(&self.id, Some(self))
    }
}

/// Renders the progress summary for `student_id`.
///
/// A missing profile renders as an empty one without creating anything.
#[must_use]
pub fn render_summary(student_id: &str, profile: Option<&StudentProfile>) -> String {
    let stats = profile.map(|p| p.stats.clone()).unwrap_or_default();
    let strong = profile
        .map(|p| join_areas(&p.strong_areas))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "None yet".to_string());
    let weak = profile
        .map(|p| join_areas(&p.weak_areas))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "None".to_string());

    format!(
        "Learning Progress for {student_id}\n\
         {SUMMARY_RULE}\n\
         Topics Covered: {}\n\
         Quizzes Completed: {}\n\
         Average Score: {:.1}%\n\
         Strong Areas: {strong}\n\
         Areas to Review: {weak}",
        stats.total_topics,
        stats.total_quizzes,
        stats.average_score * 100.0,
    )
}

fn join_areas(areas: &[String]) -> String {
    areas
        .iter()
        .take(SUMMARY_AREA_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
