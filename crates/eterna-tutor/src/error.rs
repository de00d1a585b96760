//! Error types for the EternaLearn tutoring engine.
//!
//! This module defines the error hierarchy for all tutor operations,
//! including configuration loading, text generation, quiz handling,
//! and persistence of student profiles.

use std::path::PathBuf;

/// A specialized `Result` type for tutor operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can occur while serving a tutoring request.
///
/// Variants are grouped by subsystem. Most of them are recovered at the
/// request boundary and rendered as a plain message; see [`TutorError::is_fatal`]
/// for the ones that stop the process at startup.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your eterna.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The API key for the configured provider is not set.
    #[error("Missing API key: environment variable '{env_var}' is not set\n\nSuggestion: Export {env_var} or add it to a .env file")]
    MissingApiKey {
        /// Name of the environment variable that was checked.
        env_var: String,
    },

    // ========================================================================
    // Text Generation Errors
    // ========================================================================
    /// The language model provider failed to produce text.
    #[error("Generation error ({kind}): {message}")]
    GenerationError {
        /// The category of failure.
        kind: GenerationErrorKind,
        /// Detailed error message from the provider.
        message: String,
    },

    // ========================================================================
    // Quiz Errors
    // ========================================================================
    /// Answers were submitted but the session has no pending quiz.
    #[error("No active quiz found for this session")]
    NoActiveQuiz,

    /// The generated quiz does not follow the expected question/answer schema.
    #[error("Malformed quiz: expected {expected} answer lines, found {found}")]
    MalformedQuiz {
        /// Number of questions requested.
        expected: usize,
        /// Number of usable answer lines found.
        found: usize,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// The memory bank file could not be read.
    #[error("Failed to read memory bank '{path}': {message}\n\nSuggestion: Check that the file is readable")]
    StoreReadError {
        /// Path to the memory bank file.
        path: PathBuf,
        /// Description of the read failure.
        message: String,
    },

    /// The memory bank file could not be written.
    #[error("Failed to write memory bank '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    StoreWriteError {
        /// Path to the memory bank file.
        path: PathBuf,
        /// Description of the write failure.
        message: String,
    },

    /// The memory bank file contains JSON that does not match the schema.
    #[error("Corrupted memory bank '{path}': {message}\n\nSuggestion: Restore the file from a backup or move it aside to start fresh")]
    StoreCorrupted {
        /// Path to the corrupted file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    // ========================================================================
    // General Errors
    // ========================================================================
    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid quiz phase transition attempted.
    #[error("Invalid quiz transition: cannot go from {from} to {to}")]
    InvalidTransition {
        /// The current phase.
        from: String,
        /// The attempted target phase.
        to: String,
    },
}

/// Categories of text generation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Authentication failure (invalid or expired API key).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The provider answered but returned no text.
    EmptyResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::EmptyResponse => write!(f, "empty_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl GenerationErrorKind {
    /// Classifies an HTTP status code returned by a provider.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl TutorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingApiKey` error.
    #[must_use]
    pub fn missing_api_key(env_var: impl Into<String>) -> Self {
        Self::MissingApiKey {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `GenerationError`.
    #[must_use]
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self::GenerationError {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `GenerationError` for a request that exceeded its timeout.
    #[must_use]
    pub fn generation_timeout(timeout_secs: u64) -> Self {
        Self::generation(
            GenerationErrorKind::Timeout,
            format!("no response within {timeout_secs}s"),
        )
    }

    /// Creates a new `MalformedQuiz` error.
    #[must_use]
    pub const fn malformed_quiz(expected: usize, found: usize) -> Self {
        Self::MalformedQuiz { expected, found }
    }

    /// Creates a new `StoreReadError`.
    #[must_use]
    pub fn store_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreReadError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `StoreWriteError`.
    #[must_use]
    pub fn store_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreWriteError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `StoreCorrupted` error.
    #[must_use]
    pub fn store_corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreCorrupted {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and the model call may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GenerationError {
                kind: GenerationErrorKind::RateLimit
                    | GenerationErrorKind::Server
                    | GenerationErrorKind::Network
                    | GenerationErrorKind::Timeout,
                ..
            }
        )
    }

    /// Returns `true` if this error should stop the process at startup.
    ///
    /// Write failures are not fatal. A mid-session write failure is logged
    /// and the in-memory state keeps serving requests.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::MissingApiKey { .. }
                | Self::StoreReadError { .. }
                | Self::StoreCorrupted { .. }
        )
    }

    /// Returns `true` if this error came from the language model boundary.
    #[must_use]
    pub const fn is_generation(&self) -> bool {
        matches!(self, Self::GenerationError { .. })
    }
}
