//! Command-line interface for scribeq
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Queued transcription over an external whisper worker
#[derive(Parser, Debug)]
#[command(name = "scribeq", version, about = "Queued transcription over an external whisper worker")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe one or more media files, in queue order
    Transcribe {
        /// Input files (.mp3, .wav, .m4a, .mp4, .mkv)
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Whisper model size (base, small, medium)
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,

        /// Device hint forwarded to the worker (e.g. cpu, cuda)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Worker executable override
        #[arg(long, value_name = "PATH")]
        worker: Option<PathBuf>,

        /// Grace period before a cancelled worker is force-killed (e.g. "3s")
        #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
        grace: Option<Duration>,

        /// Export format for results (txt, srt, json)
        #[arg(long, default_value = "txt", value_name = "FORMAT")]
        format: String,

        /// Directory for exported files (defaults to each input's directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Also save transcripts to the local store
        #[arg(long)]
        save: bool,
    },

    /// List stored transcripts, newest first
    History,

    /// Export one stored transcript
    Export {
        /// Stored transcript id (see `scribeq history`)
        id: String,

        /// Export format (txt, srt, json)
        #[arg(long, default_value = "txt", value_name = "FORMAT")]
        format: String,

        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Delete one stored transcript
    Delete {
        /// Stored transcript id
        id: String,
    },
}
