//! EternaLearn tutoring engine
//!
//! Routes student messages to explanations, quizzes, answer scoring, and
//! progress reports, keeps per-student sessions, and persists profiles to a
//! JSON memory bank. The HTTP API in [`api`] and the `eterna` CLI are thin
//! surfaces over [`Tutor`].

pub mod api;
pub mod config;
pub mod error;
pub mod explain;
pub mod llm;
pub mod profile;
pub mod quiz;
pub mod router;
pub mod session;
pub mod store;
pub mod tutor;
pub mod visual;

pub use api::{
    create_router, AppState, ChatRequest, ChatResponse, ErrorResponse, HealthResponse,
    ProgressResponse, ProgressStats,
};
pub use config::{Config, LlmProvider, ModelConfig, QuizConfig, RoutingConfig, VisualConfig};
pub use error::{GenerationErrorKind, Result, TutorError};
pub use explain::Explainer;
pub use llm::{build_model, GeminiClient, LanguageModel, OpenAiCompatibleClient, RetryingModel};
pub use profile::{Preferences, ProfileStats, QuizResult, StudentProfile};
pub use quiz::{Evaluation, QuizEngine, ScoreBand};
pub use router::{Intent, Router, Rule};
pub use session::{
    AnswerKeyEntry, ChatMessage, PendingQuiz, QuizPhase, Role, Session, SessionRegistry,
};
pub use store::{InMemoryBackend, JsonFileBackend, MemoryBank, StoreBackend, StoreDocument};
pub use tutor::{is_exit_command, Reply, Tutor};
