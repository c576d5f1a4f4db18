//! scribeq - queued, cancellable transcription job orchestration.
//!
//! Wraps an external speech-to-text worker process in an observable
//! pipeline: a FIFO queue of input files, one running job at a time, a
//! streaming line-protocol decoder, and pure search/export over the
//! resulting transcripts.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod job;
pub mod protocol;
pub mod queue;
pub mod runner;
pub mod search;
pub mod storage;
pub mod transcript;

// Core data model
pub use transcript::{Segment, Transcript, Word, find_segment_at, find_word_at, validate_transcript};

// Orchestration
pub use job::{JobController, JobControllerConfig, JobEvent, JobHandle, JobState, ModelSize};
pub use queue::{QueueItem, QueueItemStatus, TranscriptionQueue};
pub use runner::{ItemOutcome, QueueRunner, RunnerEvent};

// Protocol
pub use protocol::{LineDecoder, WorkerEvent};

// Search and export
pub use export::{ExportFormat, export_transcript};
pub use search::{SearchMatch, search_transcript};

// Storage collaborators
pub use storage::{JsonFileStore, StoredTranscript, TranscriptStore, TranscriptSummary};

// Error handling
pub use error::{Result, ScribeqError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.2.0+abc1234"` when git hash is available, `"0.2.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
