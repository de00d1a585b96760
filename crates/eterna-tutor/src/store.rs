//! Persistent store for student profiles.
//!
//! The whole store is a single JSON document that is read once at startup
//! and rewritten in full after every mutation. [`MemoryBank`] owns the
//! in-memory copy and serializes mutations; a [`StoreBackend`] decides where
//! the bytes go.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, TutorError};
use crate::profile::{render_summary, QuizResult, StudentProfile};

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Profiles keyed by student id.
    #[serde(default)]
    pub students: BTreeMap<String, StudentProfile>,
    /// Document metadata.
    pub metadata: StoreMetadata,
}

/// Metadata stored alongside the profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// When the document was first created.
    pub created_at: DateTime<Utc>,
}

impl StoreDocument {
    /// Creates an empty document stamped with the current time.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            students: BTreeMap::new(),
            metadata: StoreMetadata {
                created_at: Utc::now(),
            },
        }
    }
}

/// Where the store document is kept.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Reads the document, or `None` if nothing has been stored yet.
    async fn load(&self) -> Result<Option<StoreDocument>>;

    /// Replaces the stored document.
    async fn save(&self, document: &StoreDocument) -> Result<()>;

    /// Human-readable location used in logs.
    fn location(&self) -> String;
}

// ============================================================================
// JSON file backend
// ============================================================================

/// Stores the document as pretty-printed JSON in a single file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this backend reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StoreBackend for JsonFileBackend {
    async fn load(&self) -> Result<Option<StoreDocument>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TutorError::store_read(&self.path, e.to_string())),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| TutorError::store_corrupted(&self.path, e.to_string()))
    }

    async fn save(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TutorError::store_write(&self.path, e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let temp_path = self.temp_path();

        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| TutorError::store_write(&self.path, e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| TutorError::store_write(&self.path, e.to_string()))?;

        tracing::debug!(path = %self.path.display(), "Memory bank saved");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Keeps the document in memory. Used for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryBackend {
    document: Mutex<Option<StoreDocument>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with a document.
    #[must_use]
    pub fn with_document(document: StoreDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// Makes subsequent saves fail with `StoreWriteError`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last successfully saved document.
    pub async fn stored(&self) -> Option<StoreDocument> {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl StoreBackend for InMemoryBackend {
    async fn load(&self) -> Result<Option<StoreDocument>> {
        Ok(self.document.lock().await.clone())
    }

    async fn save(&self, document: &StoreDocument) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TutorError::store_write("<memory>", "writes disabled"));
        }
        *self.document.lock().await = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

// ============================================================================
// Memory bank
// ============================================================================

/// Owner of all student profiles.
///
/// Every mutation is a read-modify-write of the in-memory document followed
/// by a full save, all under one lock. A failed save is logged and the
/// in-memory document keeps the change.
pub struct MemoryBank {
    document: Mutex<StoreDocument>,
    backend: Arc<dyn StoreBackend>,
}

impl MemoryBank {
    /// Opens the store, creating and writing an empty document if none exists.
    ///
    /// Profiles whose stored statistics disagree with their history are
    /// repaired and a warning is logged.
    pub async fn open(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        let document = if let Some(mut document) = backend.load().await? {
            let repaired = reconcile(&mut document);
            if repaired > 0 {
                tracing::warn!(
                    location = %backend.location(),
                    profiles = repaired,
                    "Recomputed inconsistent profile stats from quiz history"
                );
                persist(backend.as_ref(), &document).await;
            }
            document
        } else {
            let document = StoreDocument::empty();
            backend.save(&document).await?;
            tracing::info!(location = %backend.location(), "Created new memory bank");
            document
        };

        tracing::info!(
            location = %backend.location(),
            students = document.students.len(),
            "Memory bank loaded"
        );

        Ok(Self {
            document: Mutex::new(document),
            backend,
        })
    }

    /// Opens a JSON file store at `path`.
    pub async fn open_file(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Arc::new(JsonFileBackend::new(path))).await
    }

    /// Returns the profile for `student_id`, creating and saving it if needed.
    pub async fn profile(&self, student_id: &str) -> StudentProfile {
        let mut document = self.document.lock().await;
        if let Some(profile) = document.students.get(student_id) {
            return profile.clone();
        }

        let profile = StudentProfile::new(student_id);
        document
            .students
            .insert(student_id.to_string(), profile.clone());
        tracing::info!(student_id, "Created student profile");
        persist(self.backend.as_ref(), &document).await;
        profile
    }

    /// Returns the profile for `student_id` without creating one.
    pub async fn find_profile(&self, student_id: &str) -> Option<StudentProfile> {
        self.document.lock().await.students.get(student_id).cloned()
    }

    /// Appends a quiz result, updates statistics, and saves the document.
    ///
    /// Returns the updated profile.
    pub async fn record_quiz_result(
        &self,
        student_id: &str,
        topic: &str,
        score: f64,
        total_questions: usize,
        correct_answers: usize,
    ) -> StudentProfile {
        let mut document = self.document.lock().await;
        let profile = document
            .students
            .entry(student_id.to_string())
            .or_insert_with(|| StudentProfile::new(student_id));

        profile.record_quiz_result(QuizResult {
            timestamp: Utc::now(),
            topic: topic.to_string(),
            score,
            total_questions,
            correct_answers,
        });
        let updated = profile.clone();

        tracing::info!(
            student_id,
            topic,
            score,
            total_quizzes = updated.stats.total_quizzes,
            "Recorded quiz result"
        );

        persist(self.backend.as_ref(), &document).await;
        updated
    }

    /// Renders the progress summary. Never creates a profile.
    pub async fn progress_summary(&self, student_id: &str) -> String {
        let document = self.document.lock().await;
        render_summary(student_id, document.students.get(student_id))
    }

    /// A copy of the whole document.
    pub async fn snapshot(&self) -> StoreDocument {
        self.document.lock().await.clone()
    }

    /// Writes the current document one final time.
    pub async fn close(&self) -> Result<()> {
        let document = self.document.lock().await;
        self.backend.save(&document).await?;
        tracing::info!(location = %self.backend.location(), "Memory bank closed");
        Ok(())
    }
}

fn reconcile(document: &mut StoreDocument) -> usize {
    let mut repaired = 0;
    for profile in document.students.values_mut() {
        if profile.reconcile_stats() {
            tracing::warn!(student_id = %profile.id, "Profile stats did not match history");
            repaired += 1;
        }
    }
    repaired
}

async fn persist(backend: &dyn StoreBackend, document: &StoreDocument) {
    if let Err(e) = backend.save(document).await {
        tracing::warn!(
            location = %backend.location(),
            error = %e,
            "Failed to persist memory bank; keeping in-memory state"
        );
    }
}
