//! Configuration types for the EternaLearn tutor.
//!
//! This module provides all configuration structures used to control
//! the tutor, including language model selection, session expiry,
//! quiz shape, visual aids, and routing keywords.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "eterna.json";

/// Default student identifier for the interactive surface.
fn default_student_id() -> String {
    "student_001".to_string()
}

/// Default memory bank location.
fn default_memory_bank_path() -> String {
    "./data/memory_bank.json".to_string()
}

/// Default session inactivity timeout in minutes.
const fn default_session_timeout() -> u32 {
    30
}

/// Default log level used when `RUST_LOG` is not set.
fn default_log_level() -> String {
    "info".to_string()
}

/// Default model name.
fn default_model_name() -> String {
    "gemini-2.5-flash".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default output token budget.
const fn default_max_tokens() -> u32 {
    2048
}

/// Default per-request timeout in seconds.
const fn default_request_timeout() -> u64 {
    60
}

/// Default number of retries for transient generation failures.
const fn default_max_retries() -> u32 {
    1
}

/// Default number of questions per quiz.
const fn default_question_count() -> usize {
    5
}

/// Default topic when none can be extracted.
fn default_topic() -> String {
    "general knowledge".to_string()
}

/// Default progress keywords.
fn default_progress_keywords() -> Vec<String> {
    ["progress", "stats", "how am i doing", "my progress"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Default quiz-trigger keywords.
fn default_quiz_keywords() -> Vec<String> {
    ["quiz", "test", "questions"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Default value for boolean options that default to true.
const fn default_true() -> bool {
    true
}

/// Main configuration for the tutor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Student identifier used by the interactive REPL.
    #[serde(default = "default_student_id")]
    pub student_id: String,

    /// Path to the JSON memory bank holding student profiles.
    #[serde(default = "default_memory_bank_path")]
    pub memory_bank_path: String,

    /// Minutes of inactivity after which a session expires.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: u32,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Language model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Quiz generation settings.
    #[serde(default)]
    pub quiz: QuizConfig,

    /// Visual aid settings for explanations.
    #[serde(default)]
    pub visuals: VisualConfig,

    /// Keyword sets used by the router.
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            student_id: default_student_id(),
            memory_bank_path: default_memory_bank_path(),
            session_timeout_minutes: default_session_timeout(),
            log_level: default_log_level(),
            model: ModelConfig::default(),
            quiz: QuizConfig::default(),
            visuals: VisualConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `eterna.json` in the current directory and falls back to
    /// defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TutorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `eterna.json` inside a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration. A file with invalid
    /// JSON yields `TutorError::ConfigParseError`, and invalid values yield
    /// `TutorError::ConfigValidationError`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.student_id.trim().is_empty() {
            return Err(TutorError::config_validation(
                "studentId must not be empty",
                "Set studentId to a stable identifier in your eterna.json",
            ));
        }

        if self.memory_bank_path.trim().is_empty() {
            return Err(TutorError::config_validation(
                "memoryBankPath must not be empty",
                "Provide a file path for memoryBankPath in your eterna.json",
            ));
        }

        if self.session_timeout_minutes == 0 {
            return Err(TutorError::config_validation(
                "sessionTimeoutMinutes must be greater than 0",
                "Set sessionTimeoutMinutes to at least 1 in your eterna.json",
            ));
        }

        if self.model.request_timeout_seconds == 0 {
            return Err(TutorError::config_validation(
                "model.requestTimeoutSeconds must be greater than 0",
                "Set model.requestTimeoutSeconds to at least 1 in your eterna.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(TutorError::config_validation(
                format!(
                    "model.temperature must be between 0.0 and 2.0 (got {})",
                    self.model.temperature
                ),
                "Use a model.temperature such as 0.7 in your eterna.json",
            ));
        }

        if self.model.model_name.trim().is_empty() {
            return Err(TutorError::config_validation(
                "model.modelName must not be empty",
                "Set model.modelName, for example \"gemini-2.5-flash\"",
            ));
        }

        if self.quiz.question_count == 0 {
            return Err(TutorError::config_validation(
                "quiz.questionCount must be greater than 0",
                "Set quiz.questionCount to at least 1 in your eterna.json",
            ));
        }

        if self.quiz.default_topic.trim().is_empty() {
            return Err(TutorError::config_validation(
                "quiz.defaultTopic must not be empty",
                "Set quiz.defaultTopic, for example \"general knowledge\"",
            ));
        }

        if self.routing.quiz_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(TutorError::config_validation(
                "routing.quizKeywords must contain at least one keyword",
                "Remove routing.quizKeywords to use the defaults",
            ));
        }

        Ok(())
    }

    /// Returns the session timeout as a `chrono` duration.
    #[must_use]
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.session_timeout_minutes))
    }
}

/// Supported language model providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    /// Google Gemini REST API (default).
    #[default]
    Gemini,
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
}

impl LlmProvider {
    /// Parses a string into an `LlmProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Returns the provider's default API base URL.
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl<'de> Deserialize<'de> for LlmProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid LLM provider '{s}': expected one of 'gemini', 'openai'"
            ))
        })
    }
}

impl Serialize for LlmProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        };
        serializer.serialize_str(s)
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Which provider to call.
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model identifier sent to the provider.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Overrides the provider's default base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum number of output tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound for a single generation call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Retries for transient failures (rate limits, 5xx, network, timeout).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model_name: default_model_name(),
            api_key_env: default_api_key_env(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_seconds: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ModelConfig {
    /// Returns the base URL to use, honoring an explicit override.
    #[must_use]
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Returns the request timeout as a `std` duration.
    #[must_use]
    pub const fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Quiz generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfig {
    /// Number of multiple-choice questions requested per quiz.
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// Topic used when neither the request nor the session names one.
    #[serde(default = "default_topic")]
    pub default_topic: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_count: default_question_count(),
            default_topic: default_topic(),
        }
    }
}

/// Visual aid settings for explanations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualConfig {
    /// Append a Mermaid diagram to explanations.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ask the model for the diagram instead of using the fallback table.
    #[serde(default)]
    pub generate_with_model: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            generate_with_model: false,
        }
    }
}

/// Keyword sets used by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    /// Substrings that request a progress report.
    #[serde(default = "default_progress_keywords")]
    pub progress_keywords: Vec<String>,

    /// Substrings that request a new quiz.
    #[serde(default = "default_quiz_keywords")]
    pub quiz_keywords: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            progress_keywords: default_progress_keywords(),
            quiz_keywords: default_quiz_keywords(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.student_id, "student_001");
        assert_eq!(config.memory_bank_path, "./data/memory_bank.json");
        assert_eq!(config.session_timeout_minutes, 30);
        assert_eq!(config.model.provider, LlmProvider::Gemini);
        assert_eq!(config.model.model_name, "gemini-2.5-flash");
        assert_eq!(config.model.max_tokens, 2048);
        assert_eq!(config.quiz.question_count, 5);
        assert_eq!(config.quiz.default_topic, "general knowledge");
        assert!(config.visuals.enabled);
        assert!(!config.visuals.generate_with_model);
        assert_eq!(
            config.routing.progress_keywords,
            vec!["progress", "stats", "how am i doing", "my progress"]
        );
        assert_eq!(config.routing.quiz_keywords, vec!["quiz", "test", "questions"]);
    }

    #[test]
    fn test_session_timeout_duration() {
        let config = Config {
            session_timeout_minutes: 45,
            ..Default::default()
        };
        assert_eq!(config.session_timeout(), chrono::Duration::minutes(45));
    }

    #[test]
    fn test_resolved_base_url() {
        let mut model = ModelConfig::default();
        assert_eq!(
            model.resolved_base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );

        model.provider = LlmProvider::OpenAi;
        assert_eq!(model.resolved_base_url(), "https://api.openai.com/v1");

        model.base_url = Some("http://localhost:11434/v1".to_string());
        assert_eq!(model.resolved_base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.student_id, "student_001");
        assert_eq!(config.model.request_timeout_seconds, 60);
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "studentId": "ada",
            "sessionTimeoutMinutes": 10,
            "model": {"provider": "OpenAI", "modelName": "gpt-4o", "maxRetries": 3},
            "quiz": {"questionCount": 3},
            "visuals": {"generateWithModel": true},
            "routing": {"quizKeywords": ["quiz", "drill"]}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.student_id, "ada");
        assert_eq!(config.session_timeout_minutes, 10);
        assert_eq!(config.model.provider, LlmProvider::OpenAi);
        assert_eq!(config.model.model_name, "gpt-4o");
        assert_eq!(config.model.max_retries, 3);
        assert_eq!(config.quiz.question_count, 3);
        assert_eq!(config.quiz.default_topic, "general knowledge");
        assert!(config.visuals.enabled);
        assert!(config.visuals.generate_with_model);
        assert_eq!(config.routing.quiz_keywords, vec!["quiz", "drill"]);
        assert_eq!(config.routing.progress_keywords.len(), 4);
    }

    #[test]
    fn test_invalid_provider_error() {
        let result: std::result::Result<Config, _> =
            serde_json::from_str(r#"{"model": {"provider": "llama"}}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid LLM provider"));
        assert!(err.contains("llama"));
    }

    #[test]
    fn test_provider_serialization() {
        assert_eq!(
            serde_json::to_string(&LlmProvider::Gemini).unwrap(),
            "\"gemini\""
        );
        assert_eq!(
            serde_json::to_string(&LlmProvider::OpenAi).unwrap(),
            "\"openai\""
        );
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"studentId": "x", "enableSearch": true}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.student_id, "x");
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let config = Config::load_from_file(&PathBuf::from("/nonexistent/eterna.json")).unwrap();
        assert_eq!(config.student_id, "student_001");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let config_path = std::env::temp_dir().join("test_eterna_invalid.json");
        std::fs::write(&config_path, "{ not valid json }").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, TutorError::ConfigParseError { path, message } if *path == config_path && !message.is_empty()),
            "Expected ConfigParseError, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_dir_finds_eterna_json() {
        let temp_dir = std::env::temp_dir().join("test_eterna_config_dir");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let config_path = temp_dir.join("eterna.json");
        std::fs::write(&config_path, r#"{"memoryBankPath": "/tmp/bank.json"}"#).unwrap();

        let config = Config::load_from_dir(&temp_dir).unwrap();
        assert_eq!(config.memory_bank_path, "/tmp/bank.json");

        std::fs::remove_file(&config_path).ok();
        std::fs::remove_dir(&temp_dir).ok();
    }

    #[test]
    fn test_load_from_file_validates_after_parsing() {
        let config_path = std::env::temp_dir().join("test_eterna_validation.json");
        std::fs::write(&config_path, r#"{"sessionTimeoutMinutes": 0}"#).unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, TutorError::ConfigValidationError { message, .. } if message.contains("sessionTimeoutMinutes")),
            "Expected ConfigValidationError, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            Config {
                student_id: "  ".to_string(),
                ..Default::default()
            },
            Config {
                memory_bank_path: String::new(),
                ..Default::default()
            },
            Config {
                quiz: QuizConfig {
                    question_count: 0,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                model: ModelConfig {
                    temperature: 3.5,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                model: ModelConfig {
                    request_timeout_seconds: 0,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                routing: RoutingConfig {
                    quiz_keywords: vec![],
                    ..Default::default()
                },
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(
                matches!(
                    config.validate(),
                    Err(TutorError::ConfigValidationError { .. })
                ),
                "expected validation failure for {config:?}"
            );
        }
    }

    #[test]
    fn test_default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }
}
