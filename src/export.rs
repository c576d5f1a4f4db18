//! Transcript export: plain text, SRT subtitles, and full-fidelity JSON.

use crate::error::Result;
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Srt,
    Json,
}

impl ExportFormat {
    /// File extension for the format, without a dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Srt => "srt",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = crate::error::ScribeqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "txt" => Ok(ExportFormat::Txt),
            "srt" => Ok(ExportFormat::Srt),
            "json" => Ok(ExportFormat::Json),
            other => Err(crate::error::ScribeqError::Other(format!(
                "unknown export format: {other} (expected txt, srt or json)"
            ))),
        }
    }
}

/// Renders seconds as an SRT clock timestamp, `HH:MM:SS,mmm`.
///
/// Rounds to whole milliseconds first, so a rounded-up value carries
/// through seconds, minutes and hours (59.9999s is `00:01:00,000`, never a
/// `,1000` or `:60` field).
fn format_srt_time(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Plain text: segment texts joined with single spaces, no timestamps.
pub fn export_txt(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// SRT subtitles: one block per segment, numbered 1..N in segment order,
/// each header rendering `[start, end)` as two clock timestamps.
pub fn export_srt(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            format!(
                "{}\n{} --> {}\n{}",
                index + 1,
                format_srt_time(segment.start),
                format_srt_time(segment.end),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full-fidelity JSON; `decode(encode(T)) == T` exactly.
pub fn export_json(transcript: &Transcript) -> Result<String> {
    Ok(serde_json::to_string_pretty(transcript)?)
}

pub fn export_transcript(transcript: &Transcript, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Txt => Ok(export_txt(transcript)),
        ExportFormat::Srt => Ok(export_srt(transcript)),
        ExportFormat::Json => export_json(transcript),
    }
}

/// Renders and writes one export to `path`.
pub fn export_to_file(transcript: &Transcript, format: ExportFormat, path: &Path) -> Result<()> {
    let content = export_transcript(transcript, format)?;
    std::fs::write(path, content)?;
    Ok(())
}
