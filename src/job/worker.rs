//! Worker process invocation and termination.
//!
//! The worker is an opaque executable speaking the line protocol of
//! [`crate::protocol`]. Invocation parameters (input path, model size,
//! device hint) are passed through without interpretation.

use crate::error::{Result, ScribeqError};
use crate::job::ModelSize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Builds the command line for one worker run:
/// `<program> <input> --model <size> [--device <hint>]`.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    input: PathBuf,
    model: ModelSize,
    device: Option<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, input: impl Into<PathBuf>, model: ModelSize) -> Self {
        Self {
            program: program.into(),
            input: input.into(),
            model,
            device: None,
        }
    }

    /// Sets the device hint (e.g. "cpu", "cuda"); forwarded opaquely.
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Spawns the worker with piped stdout/stderr.
    ///
    /// A spawn failure is synchronous; it never enters the event stream.
    pub fn spawn(&self) -> Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .arg(&self.input)
            .arg("--model")
            .arg(self.model.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref device) = self.device {
            command.arg("--device").arg(device);
        }

        debug!(program = %self.program.display(), input = %self.input.display(),
               model = self.model.as_str(), "spawning worker");

        command.spawn().map_err(|e| ScribeqError::Spawn {
            message: format!("{}: {}", self.program.display(), e),
        })
    }
}

/// Stops a worker cooperatively: SIGTERM, bounded grace wait, then SIGKILL.
///
/// A worker that already exited counts as success.
pub async fn stop_gracefully(child: &mut Child, grace: Duration) -> Result<()> {
    // Already exited before cancellation was requested.
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    if let Some(pid) = child.id() {
        // SAFETY: pid comes from a live child we own.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            status?;
            Ok(())
        }
        Err(_) => {
            warn!("worker ignored SIGTERM for {:?}, force-killing", grace);
            child.kill().await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn spawn_missing_program_is_spawn_error() {
        let cmd = WorkerCommand::new(
            "/nonexistent/whisper-engine",
            "/tmp/talk.mp3",
            ModelSize::Base,
        );
        let err = cmd.spawn().unwrap_err();
        assert!(matches!(err, ScribeqError::Spawn { .. }));
        assert!(err.to_string().contains("whisper-engine"));
    }

    #[tokio::test]
    async fn stop_gracefully_terminates_sleeping_process() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("sleep should spawn");

        let started = Instant::now();
        stop_gracefully(&mut child, Duration::from_secs(5))
            .await
            .expect("should stop");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stop_gracefully_on_exited_process_is_success() {
        let mut child = Command::new("true")
            .stdout(Stdio::null())
            .spawn()
            .expect("true should spawn");
        child.wait().await.expect("should exit");

        stop_gracefully(&mut child, Duration::from_millis(100))
            .await
            .expect("already-exited worker counts as success");
    }

    #[tokio::test]
    async fn stop_gracefully_force_kills_sigterm_ignorer() {
        // A shell that traps SIGTERM and keeps sleeping.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("sh should spawn");

        // Give the shell a moment to install the trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        stop_gracefully(&mut child, Duration::from_millis(200))
            .await
            .expect("should fall back to SIGKILL");
        assert!(child.try_wait().expect("wait").is_some());
    }
}
