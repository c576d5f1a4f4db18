//! Streaming JSON line protocol spoken by the transcription worker.
//!
//! The worker writes one JSON object per line to stdout, discriminated by a
//! `type` field. Exactly four record kinds exist; anything else is a decode
//! failure. A malformed line is non-fatal: callers log it and keep reading.

use crate::error::{Result, ScribeqError};
use crate::transcript::Segment;
use serde::{Deserialize, Serialize};

/// One decoded record from the worker's stdout stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerEvent {
    /// Progress update; `percent` is clamped to 0–100 on decode.
    Progress { percent: u32, status: String },
    /// One transcript segment with word-level timestamps.
    Segment { data: Segment },
    /// Final record of a successful run.
    Complete { language: String, duration: f64 },
    /// Fatal worker-side failure; the message is forwarded verbatim.
    Error { message: String },
}

/// Decodes a single protocol line.
///
/// Progress percent values above 100 are clamped; negative values don't
/// parse as `u32` and surface as a protocol error like any other malformed
/// line.
pub fn decode_line(line: &str) -> Result<WorkerEvent> {
    let event: WorkerEvent =
        serde_json::from_str(line.trim()).map_err(|e| ScribeqError::Protocol {
            message: format!("failed to decode line: {} - line: {}", e, line.trim()),
        })?;

    Ok(match event {
        WorkerEvent::Progress { percent, status } => WorkerEvent::Progress {
            percent: percent.min(100),
            status,
        },
        other => other,
    })
}

/// Reassembles complete lines from arbitrary byte chunks of worker output.
///
/// Chunk boundaries carry no meaning: a line may arrive split across many
/// reads — even inside a multi-byte UTF-8 character — or several lines may
/// arrive in one read. Bytes are buffered raw and only converted once a
/// full line is available, so a split character reassembles verbatim. Each
/// complete line produces exactly one decode attempt. Empty lines are
/// skipped.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

/// Decodes one complete raw line. `None` for blank lines; a line that is
/// not valid UTF-8 is a per-line protocol error, like any malformed line.
fn decode_raw_line(bytes: &[u8]) -> Option<Result<WorkerEvent>> {
    match std::str::from_utf8(bytes) {
        Ok(line) => {
            let line = line.trim();
            if line.is_empty() {
                None
            } else {
                Some(decode_line(line))
            }
        }
        Err(e) => Some(Err(ScribeqError::Protocol {
            message: format!("worker line is not valid UTF-8: {e}"),
        })),
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk of raw worker output, returning a decode result per
    /// complete line it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<WorkerEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut results = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(result) = decode_raw_line(&line) {
                results.push(result);
            }
        }
        results
    }

    /// Flushes a trailing line that never received its newline (EOF).
    pub fn finish(&mut self) -> Option<Result<WorkerEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_raw_line(&rest)
    }
}
