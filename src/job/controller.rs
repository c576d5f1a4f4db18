//! Job controller: owns the worker process of the active job, drives the
//! protocol decoder, and exposes cancellation.
//!
//! Job state is mutated along exactly two paths — the stdout reader task
//! and an external `cancel` call — serialized behind one mutex, so at most
//! one terminal event is ever observed per job id.

use crate::error::{Result, ScribeqError};
use crate::job::worker::{WorkerCommand, stop_gracefully};
use crate::job::{JobEvent, JobState, ModelSize, validate_input};
use crate::protocol::{LineDecoder, WorkerEvent};
use crate::transcript::{Segment, Transcript, validate_transcript};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct JobControllerConfig {
    /// Path to the worker executable.
    pub worker_program: PathBuf,
    /// Optional device hint forwarded to the worker.
    pub device: Option<String>,
    /// How long a cancelled worker gets to exit before SIGKILL.
    pub grace_period: Duration,
}

impl Default for JobControllerConfig {
    fn default() -> Self {
        Self {
            worker_program: PathBuf::from("whisper-engine"),
            device: None,
            grace_period: Duration::from_secs(3),
        }
    }
}

/// Handle returned by [`JobController::start_job`].
///
/// `events` delivers the job's typed event stream; the channel closes
/// right after the terminal event.
#[derive(Debug)]
pub struct JobHandle {
    pub id: String,
    pub events: Receiver<JobEvent>,
}

/// Per-job state shared between the reader task and `cancel`.
struct JobShared {
    state: JobState,
    /// Dropped once a terminal event is sent, closing the subscriber side.
    events: Option<Sender<JobEvent>>,
}

impl JobShared {
    /// Sends a non-terminal event unless the job already reached a
    /// terminal state (post-cancellation output is accepted but dropped).
    fn emit(&mut self, event: JobEvent) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(ref tx) = self.events {
            tx.send(event).ok();
        }
    }

    /// Transitions into a terminal state and closes the event channel.
    /// A no-op if another path already concluded the job.
    fn conclude(&mut self, state: JobState, event: JobEvent) {
        if self.state.is_terminal() {
            return;
        }
        debug_assert!(state.is_terminal() && event.is_terminal());
        self.state = state;
        if let Some(tx) = self.events.take() {
            tx.send(event).ok();
        }
    }
}

struct ActiveJob {
    id: String,
    shared: Arc<Mutex<JobShared>>,
    child: Arc<tokio::sync::Mutex<Child>>,
}

/// Manages the single active transcription job.
pub struct JobController {
    config: JobControllerConfig,
    active: Arc<Mutex<Option<ActiveJob>>>,
}

impl JobController {
    pub fn new(config: JobControllerConfig) -> Self {
        Self {
            config,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Id of the currently active job, if any.
    pub fn active_job_id(&self) -> Option<String> {
        self.active
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|job| job.id.clone()))
    }

    /// Current state of a job, or `None` once the job has been discarded.
    pub fn job_state(&self, job_id: &str) -> Option<JobState> {
        self.active.lock().ok().and_then(|guard| {
            guard
                .as_ref()
                .filter(|job| job.id == job_id)
                .and_then(|job| job.shared.lock().ok().map(|s| s.state))
        })
    }

    /// Starts a transcription job for `file_path`.
    ///
    /// Fails fast — without spawning — on an unsupported extension or a
    /// missing file, and synchronously on spawn failure; none of these
    /// enter the event stream. While a job is active, further starts are
    /// refused.
    pub fn start_job(&self, file_path: &Path, model: ModelSize) -> Result<JobHandle> {
        {
            let guard = self
                .active
                .lock()
                .map_err(|_| ScribeqError::Other("controller lock poisoned".to_string()))?;
            if let Some(ref job) = *guard {
                let running = job
                    .shared
                    .lock()
                    .map(|s| !s.state.is_terminal())
                    .unwrap_or(false);
                if running {
                    return Err(ScribeqError::JobAlreadyRunning {
                        id: job.id.clone(),
                    });
                }
            }
        }

        validate_input(file_path)?;

        let command = WorkerCommand::new(&self.config.worker_program, file_path, model)
            .with_device(self.config.device.clone());
        let mut child = command.spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| ScribeqError::Spawn {
            message: "worker stdout not captured".to_string(),
        })?;
        let stderr = child.stderr.take();

        let job_id = Uuid::new_v4().to_string();
        let (tx, rx) = unbounded();
        let shared = Arc::new(Mutex::new(JobShared {
            state: JobState::Running,
            events: Some(tx),
        }));

        // Authoritative slot claim: the early check ran with the lock
        // released across validation and spawn, so a racing start may have
        // taken the slot since. Re-check under the same acquisition that
        // inserts; the loser's worker never ran a job and is killed here.
        let child = {
            let mut guard = self
                .active
                .lock()
                .map_err(|_| ScribeqError::Other("controller lock poisoned".to_string()))?;
            if let Some(ref job) = *guard {
                let running = job
                    .shared
                    .lock()
                    .map(|s| !s.state.is_terminal())
                    .unwrap_or(false);
                if running {
                    let winner = job.id.clone();
                    drop(guard);
                    child.start_kill().ok();
                    return Err(ScribeqError::JobAlreadyRunning { id: winner });
                }
            }
            let child = Arc::new(tokio::sync::Mutex::new(child));
            *guard = Some(ActiveJob {
                id: job_id.clone(),
                shared: Arc::clone(&shared),
                child: Arc::clone(&child),
            });
            child
        };

        info!(job_id = %job_id, file = %file_path.display(), model = model.as_str(), "job started");

        // Worker stderr is diagnostic only; mirror it into the log.
        if let Some(stderr) = stderr {
            let id = job_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(job_id = %id, "worker stderr: {line}");
                }
            });
        }

        let active = Arc::clone(&self.active);
        let id = job_id.clone();
        tokio::spawn(async move {
            run_reader(id.clone(), stdout, child, Arc::clone(&shared)).await;
            // Release the slot so the scheduler can offer the next job.
            if let Ok(mut guard) = active.lock()
                && guard.as_ref().is_some_and(|job| job.id == id)
            {
                *guard = None;
            }
        });

        Ok(JobHandle { id: job_id, events: rx })
    }

    /// Requests graceful termination of a job, force-killing after the
    /// configured grace period.
    ///
    /// Cancelling a job whose worker already exited is a success. Output
    /// arriving after cancellation is discarded, so the subscriber sees
    /// `Cancelled` as the one and only terminal event.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let (shared, child) = {
            let guard = self
                .active
                .lock()
                .map_err(|_| ScribeqError::Other("controller lock poisoned".to_string()))?;
            match guard.as_ref() {
                Some(job) if job.id == job_id => {
                    (Arc::clone(&job.shared), Arc::clone(&job.child))
                }
                _ => {
                    return Err(ScribeqError::JobNotFound {
                        id: job_id.to_string(),
                    });
                }
            }
        };

        if let Ok(mut state) = shared.lock() {
            if state.state.is_terminal() {
                // Already concluded; nothing left to cancel.
                return Ok(());
            }
            state.conclude(JobState::Cancelled, JobEvent::Cancelled);
        }
        info!(job_id = %job_id, "job cancelled");

        let mut child = child.lock().await;
        stop_gracefully(&mut child, self.config.grace_period).await
    }
}

/// Reads worker stdout to EOF, decoding and dispatching synchronously.
/// Waiting for the next chunk is the only suspension point.
async fn run_reader(
    job_id: String,
    stdout: tokio::process::ChildStdout,
    child: Arc<tokio::sync::Mutex<Child>>,
    shared: Arc<Mutex<JobShared>>,
) {
    let mut reader = stdout;
    let mut decoder = LineDecoder::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for decoded in decoder.feed(&buf[..n]) {
                    dispatch(&job_id, decoded, &shared, &mut segments, &mut seen_ids);
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, "worker stdout read failed: {e}");
                break;
            }
        }
    }

    if let Some(decoded) = decoder.finish() {
        dispatch(&job_id, decoded, &shared, &mut segments, &mut seen_ids);
    }

    // EOF without a terminal record: judge by the exit status. A nonzero
    // exit with no prior Complete/Error is an implicit worker error.
    let status = child.lock().await.wait().await;
    if let Ok(mut state) = shared.lock() {
        if !state.state.is_terminal() {
            let message = match status {
                Ok(status) if status.success() => {
                    "worker exited without a completion record".to_string()
                }
                Ok(status) => format!(
                    "worker exited with code {}",
                    status.code().unwrap_or(-1)
                ),
                Err(e) => format!("failed to reap worker: {e}"),
            };
            state.conclude(JobState::Failed, JobEvent::Failed { message });
        }
    }
}

/// Handles one decode attempt. Malformed lines are logged and skipped;
/// they never abort the job.
fn dispatch(
    job_id: &str,
    decoded: Result<WorkerEvent>,
    shared: &Mutex<JobShared>,
    segments: &mut Vec<Segment>,
    seen_ids: &mut HashSet<String>,
) {
    let event = match decoded {
        Ok(event) => event,
        Err(e) => {
            warn!(job_id = %job_id, "skipping malformed worker line: {e}");
            return;
        }
    };

    let Ok(mut state) = shared.lock() else { return };

    match event {
        WorkerEvent::Progress { percent, status } => {
            state.emit(JobEvent::Progress { percent, status });
        }
        WorkerEvent::Segment { data } => {
            // De-duplicate against protocol misbehavior: first-seen id wins.
            if seen_ids.insert(data.id.clone()) {
                segments.push(data.clone());
                state.emit(JobEvent::Segment(data));
            } else {
                debug!(job_id = %job_id, segment = %data.id, "ignoring repeated segment id");
            }
        }
        WorkerEvent::Complete { language, duration } => {
            let transcript = Transcript {
                segments: std::mem::take(segments),
                language,
                duration,
            };
            match validate_transcript(&transcript) {
                Ok(()) => {
                    state.conclude(JobState::Completed, JobEvent::Completed(transcript));
                }
                Err(e) => {
                    state.conclude(
                        JobState::Failed,
                        JobEvent::Failed {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
        WorkerEvent::Error { message } => {
            state.conclude(JobState::Failed, JobEvent::Failed { message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_bounded_grace_period() {
        let config = JobControllerConfig::default();
        assert_eq!(config.grace_period, Duration::from_secs(3));
        assert!(config.device.is_none());
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_job_not_found() {
        let controller = JobController::new(JobControllerConfig::default());
        let err = controller.cancel("no-such-job").await.unwrap_err();
        assert!(matches!(err, ScribeqError::JobNotFound { .. }));
    }

    #[test]
    fn start_job_rejects_unsupported_extension_without_spawning() {
        let controller = JobController::new(JobControllerConfig {
            // Would fail to spawn if reached; validation must win.
            worker_program: PathBuf::from("/nonexistent/worker"),
            ..Default::default()
        });
        let err = controller
            .start_job(Path::new("/tmp/notes.txt"), ModelSize::Base)
            .unwrap_err();
        assert!(matches!(err, ScribeqError::UnsupportedFormat { .. }));
        assert!(controller.active_job_id().is_none());
    }

    #[test]
    fn dispatch_drops_events_after_terminal() {
        let shared = Mutex::new(JobShared {
            state: JobState::Running,
            events: None,
        });
        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        dispatch(
            "job",
            Ok(WorkerEvent::Error {
                message: "boom".to_string(),
            }),
            &shared,
            &mut segments,
            &mut seen,
        );
        assert_eq!(shared.lock().unwrap().state, JobState::Failed);

        // A late Complete must not overwrite the terminal outcome.
        dispatch(
            "job",
            Ok(WorkerEvent::Complete {
                language: "en".to_string(),
                duration: 1.0,
            }),
            &shared,
            &mut segments,
            &mut seen,
        );
        assert_eq!(shared.lock().unwrap().state, JobState::Failed);
    }

    #[test]
    fn dispatch_deduplicates_segment_ids() {
        let (tx, rx) = unbounded();
        let shared = Mutex::new(JobShared {
            state: JobState::Running,
            events: Some(tx),
        });
        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        let seg = Segment {
            id: "seg1".to_string(),
            start: 0.0,
            end: 1.0,
            text: "hi".to_string(),
            words: vec![],
        };
        for _ in 0..3 {
            dispatch(
                "job",
                Ok(WorkerEvent::Segment { data: seg.clone() }),
                &shared,
                &mut segments,
                &mut seen,
            );
        }

        assert_eq!(segments.len(), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn dispatch_fails_job_on_invalid_transcript() {
        let (tx, rx) = unbounded();
        let shared = Mutex::new(JobShared {
            state: JobState::Running,
            events: Some(tx),
        });
        let mut segments = vec![Segment {
            id: "seg1".to_string(),
            start: 1.0,
            end: 2.0,
            text: "hi".to_string(),
            words: vec![crate::transcript::Word {
                word: "hi".to_string(),
                start: 0.5,
                end: 1.5,
            }],
        }];
        let mut seen = HashSet::new();

        dispatch(
            "job",
            Ok(WorkerEvent::Complete {
                language: "en".to_string(),
                duration: 2.0,
            }),
            &shared,
            &mut segments,
            &mut seen,
        );

        assert_eq!(shared.lock().unwrap().state, JobState::Failed);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], JobEvent::Failed { .. }));
    }
}
