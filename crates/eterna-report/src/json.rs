//! JSON output for progress reports.
//!
//! [`JsonGenerator`] serializes a [`ProgressReport`] as compact single-line
//! JSON or pretty-printed for reading.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use eterna_report::json::JsonGenerator;
//! use eterna_report::{ReportGenerator, ReportInput};
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
//! let generator = JsonGenerator::new(&report);
//!
//! let compact = generator.generate().unwrap();
//! assert!(!compact.contains('\n'));
//!
//! let pretty = generator.generate_pretty().unwrap();
//! assert!(pretty.contains("\n  \"student_id\""));
//!
//! // generator.write_to_file(std::path::Path::new("student_001-progress.json"), true).unwrap();
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{ProgressReport, ReportError, Result};

/// JSON report generator.
pub struct JsonGenerator<'a> {
    report: &'a ProgressReport,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a ProgressReport) -> Self {
        Self { report }
    }

    /// Generates compact JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        self.report.to_json()
    }

    /// Generates pretty-printed JSON output with 2-space indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report to `path`, creating or overwriting the file.
    ///
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    /// Returns [`ReportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}
