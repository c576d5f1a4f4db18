//! Transcript persistence.
//!
//! The core depends only on the [`TranscriptStore`] contract; the backing
//! medium is a collaborator detail. [`JsonFileStore`] is the bundled
//! implementation: one JSON file per transcript plus an index file.

use crate::error::{Result, ScribeqError};
use crate::job::ModelSize;
use crate::transcript::{Segment, Transcript, validate_transcript};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A completed transcript together with its run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTranscript {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub duration: f64,
    pub language: String,
    pub model_size: ModelSize,
    pub segments: Vec<Segment>,
}

impl StoredTranscript {
    /// Wraps a completed job's transcript for persistence.
    pub fn from_transcript(transcript: Transcript, file_path: &str, model_size: ModelSize) -> Self {
        let file_name = Path::new(file_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            file_name,
            file_path: file_path.to_string(),
            created_at: Utc::now(),
            duration: transcript.duration,
            language: transcript.language,
            model_size,
            segments: transcript.segments,
        }
    }

    /// Reassembles the plain transcript for search/export.
    pub fn transcript(&self) -> Transcript {
        Transcript {
            segments: self.segments.clone(),
            language: self.language.clone(),
            duration: self.duration,
        }
    }
}

/// History entry describing one stored transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub duration: f64,
    pub language: String,
}

impl From<&StoredTranscript> for TranscriptSummary {
    fn from(stored: &StoredTranscript) -> Self {
        Self {
            id: stored.id.clone(),
            file_name: stored.file_name.clone(),
            file_path: stored.file_path.clone(),
            created_at: stored.created_at,
            duration: stored.duration,
            language: stored.language.clone(),
        }
    }
}

/// Storage collaborator contract: the core depends on these four
/// operations' signatures, not on the backing medium.
#[async_trait::async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn save(&self, transcript: &StoredTranscript) -> Result<()>;
    async fn load(&self, id: &str) -> Result<StoredTranscript>;
    /// All summaries, sorted descending by creation date.
    async fn list(&self) -> Result<Vec<TranscriptSummary>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StoreIndex {
    items: Vec<TranscriptSummary>,
}

/// File-backed store: `<dir>/transcripts/<id>.json` plus `<dir>/index.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default store location under the user data directory.
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|dir| dir.join("scribeq"))
            .ok_or_else(|| ScribeqError::Storage {
                message: "cannot determine data directory".to_string(),
            })
    }

    fn transcripts_dir(&self) -> PathBuf {
        self.dir.join("transcripts")
    }

    fn transcript_path(&self, id: &str) -> PathBuf {
        self.transcripts_dir().join(format!("{id}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    fn load_index(&self) -> Result<StoreIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(StoreIndex::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| ScribeqError::Storage {
            message: format!("failed to read index: {e}"),
        })?;
        serde_json::from_str(&content).map_err(|e| ScribeqError::Storage {
            message: format!("failed to parse index: {e}"),
        })
    }

    fn save_index(&self, index: &StoreIndex) -> Result<()> {
        let content = serde_json::to_string_pretty(index)?;
        fs::write(self.index_path(), content).map_err(|e| ScribeqError::Storage {
            message: format!("failed to write index: {e}"),
        })
    }
}

#[async_trait::async_trait]
impl TranscriptStore for JsonFileStore {
    async fn save(&self, transcript: &StoredTranscript) -> Result<()> {
        fs::create_dir_all(self.transcripts_dir()).map_err(|e| ScribeqError::Storage {
            message: format!("failed to create store directory: {e}"),
        })?;

        let content = serde_json::to_string_pretty(transcript)?;
        fs::write(self.transcript_path(&transcript.id), content).map_err(|e| {
            ScribeqError::Storage {
                message: format!("failed to write transcript: {e}"),
            }
        })?;

        let mut index = self.load_index()?;
        index.items.retain(|item| item.id != transcript.id);
        index.items.push(TranscriptSummary::from(transcript));
        // Newest first.
        index.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.save_index(&index)
    }

    async fn load(&self, id: &str) -> Result<StoredTranscript> {
        let path = self.transcript_path(id);
        if !path.exists() {
            return Err(ScribeqError::TranscriptNotFound { id: id.to_string() });
        }
        let content = fs::read_to_string(&path).map_err(|e| ScribeqError::Storage {
            message: format!("failed to read transcript: {e}"),
        })?;
        let stored: StoredTranscript =
            serde_json::from_str(&content).map_err(|e| ScribeqError::Storage {
                message: format!("failed to parse transcript: {e}"),
            })?;

        // Ingestion boundary: deserialized data re-runs the validator.
        validate_transcript(&stored.transcript())?;
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<TranscriptSummary>> {
        Ok(self.load_index()?.items)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.transcript_path(id);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| ScribeqError::Storage {
                message: format!("failed to delete transcript: {e}"),
            })?;
        }
        let mut index = self.load_index()?;
        index.items.retain(|item| item.id != id);
        self.save_index(&index)
    }
}
