//! Markdown rendering of progress reports.
//!
//! [`MarkdownGenerator`] turns a [`ProgressReport`] into a document with:
//!
//! - A summary table with headline statistics
//! - A per-topic breakdown
//! - Strong areas and areas to review
//! - A chronological quiz timeline
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use eterna_report::{MarkdownGenerator, ReportGenerator, ReportInput};
//!
//! let input = ReportInput {
//!     student_id: "student_001".to_string(),
//!     created_at: Utc::now(),
//!     topics_covered: vec![],
//!     strong_areas: vec![],
//!     weak_areas: vec![],
//!     quiz_history: vec![],
//! };
//! let report = ReportGenerator::new(input).generate().unwrap();
//!
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("# Learning Progress Report: student\\_001"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{ProgressReport, TimelineEntry, TopicBreakdown};

/// Generates Markdown progress reports.
pub struct MarkdownGenerator<'a> {
    report: &'a ProgressReport,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a ProgressReport) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_topics(&mut output);
        self.write_areas(&mut output);
        self.write_timeline(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Learning Progress Report: {}\n",
            escape_markdown(&self.report.student_id)
        );
    }

    fn write_summary(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        if let Some(since) = &summary.member_since {
            let _ = writeln!(output, "| Learning Since | {} |", format_date(since));
        }
        let _ = writeln!(output, "| Topics Covered | {} |", summary.total_topics);
        let _ = writeln!(output, "| Quizzes Completed | {} |", summary.total_quizzes);
        let _ = writeln!(
            output,
            "| Average Score | {} |",
            format_percent(summary.average_score)
        );
        let _ = writeln!(
            output,
            "| Correct Answers | {} / {} |",
            summary.total_correct, summary.total_questions
        );
        let _ = writeln!(output);
    }

    fn write_topics(&self, output: &mut String) {
        let _ = writeln!(output, "## Topics\n");

        if self.report.topics.is_empty() {
            let _ = writeln!(output, "*No quizzes taken yet.*\n");
            return;
        }

        let _ = writeln!(
            output,
            "| Topic | Attempts | Best | Latest | Mean | Status |"
        );
        let _ = writeln!(
            output,
            "|-------|----------|------|--------|------|--------|"
        );
        for topic in &self.report.topics {
            Self::write_topic_row(output, topic);
        }
        let _ = writeln!(output);
    }

    fn write_topic_row(output: &mut String, topic: &TopicBreakdown) {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            escape_markdown(&topic.topic),
            topic.attempts,
            format_percent(topic.best_score),
            format_percent(topic.latest_score),
            format_percent(topic.mean_score),
            topic.mastery,
        );
    }

    fn write_areas(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Strong Areas\n");
        write_list(output, &summary.strong_areas, "*None yet.*");

        let _ = writeln!(output, "## Areas to Review\n");
        let review = self.report.topics_to_review();
        if review.is_empty() {
            write_list(output, &summary.weak_areas, "*Nothing to review.*");
            return;
        }
        for (i, topic) in review.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. **{}** (mean {}, latest {})",
                i + 1,
                escape_markdown(&topic.topic),
                format_percent(topic.mean_score),
                format_percent(topic.latest_score),
            );
        }
        let _ = writeln!(output);
    }

    fn write_timeline(&self, output: &mut String) {
        let _ = writeln!(output, "## Quiz Timeline\n");

        if self.report.timeline.is_empty() {
            let _ = writeln!(output, "*No quizzes taken yet.*\n");
            return;
        }

        let _ = writeln!(output, "| Time | Topic | Result | Score |");
        let _ = writeln!(output, "|------|-------|--------|-------|");
        for entry in &self.report.timeline {
            Self::write_timeline_entry(output, entry);
        }
        let _ = writeln!(output);
    }

    fn write_timeline_entry(output: &mut String, entry: &TimelineEntry) {
        let _ = writeln!(
            output,
            "| {} | {} | {}/{} | {} |",
            format_timestamp(&entry.timestamp),
            escape_markdown(&entry.topic),
            entry.correct_answers,
            entry.total_questions,
            format_percent(entry.score),
        );
    }

    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&self.report.generated_at);
        let _ = writeln!(output, "*Generated by EternaLearn at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn write_list(output: &mut String, items: &[String], empty: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "{empty}\n");
        return;
    }
    for item in items {
        let _ = writeln!(output, "- {}", escape_markdown(item));
    }
    let _ = writeln!(output);
}

/// Formats a `[0, 1]` score as a percentage with one decimal.
fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Escapes special Markdown characters in text.
///
/// Topics come straight from student messages, so they can contain
/// anything.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            // table cells cannot span lines
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
