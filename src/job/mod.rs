//! Transcription job orchestration.
//!
//! One job is one transcription run of a single input file, backed by
//! exactly one worker process while running. The controller enforces the
//! system-wide contract of at most one running job at a time.

pub mod controller;
pub mod worker;

pub use controller::{JobController, JobControllerConfig, JobHandle};
pub use worker::WorkerCommand;

use crate::error::{Result, ScribeqError};
use crate::transcript::{Segment, Transcript};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extensions the worker accepts, lowercase with leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".m4a", ".mp4", ".mkv"];

/// Whisper model size, forwarded to the worker as an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    #[default]
    Base,
    Small,
    Medium,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = ScribeqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            other => Err(ScribeqError::Other(format!(
                "unknown model size: {other} (expected base, small or medium)"
            ))),
        }
    }
}

/// Lifecycle of one job. Completed, Failed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Typed event stream delivered to the subscriber of one job.
///
/// At most one terminal event (`Completed`, `Failed` or `Cancelled`) is
/// ever delivered per job id; the channel closes after it.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress { percent: u32, status: String },
    Segment(Segment),
    Completed(Transcript),
    Failed { message: String },
    Cancelled,
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Completed(_) | JobEvent::Failed { .. } | JobEvent::Cancelled
        )
    }
}

/// Returns the lowercase dotted extension of a path, if any.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// True if the path's extension is in the supported set (case-insensitive).
pub fn is_supported_format(path: &Path) -> bool {
    file_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Validates an input file before any worker is spawned.
///
/// Failures here are synchronous start-call errors; they never enter a
/// job's event stream.
pub fn validate_input(path: &Path) -> Result<()> {
    if !is_supported_format(path) {
        return Err(ScribeqError::UnsupportedFormat {
            extension: file_extension(path).unwrap_or_else(|| "(none)".to_string()),
        });
    }
    if !path.exists() {
        return Err(ScribeqError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
