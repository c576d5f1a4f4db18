//! Queue runner: ties the scheduler and the job controller together.
//!
//! Processes the queue strictly one job at a time — the next pending item
//! is only offered once the current job reaches a terminal state. The two
//! collaborators stay explicit: the runner owns a queue value and borrows
//! the controller's start/cancel surface; consumers observe through a
//! typed channel instead of shared globals.

use crate::job::{JobController, JobEvent, ModelSize};
use crate::queue::{QueueItemStatus, TranscriptionQueue};
use crate::storage::{StoredTranscript, TranscriptStore};
use crate::transcript::Transcript;
use crossbeam_channel::TryRecvError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Events mirrored to observers while the runner works the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    ItemStarted {
        item_id: String,
        job_id: String,
    },
    ItemProgress {
        item_id: String,
        percent: u32,
        status: String,
    },
    ItemCompleted {
        item_id: String,
        /// Id under which the transcript was persisted, when a store is attached.
        stored_id: Option<String>,
    },
    ItemFailed {
        item_id: String,
        message: String,
    },
}

/// Outcome of processing one queue item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Completed {
        item_id: String,
        transcript: Transcript,
    },
    Failed {
        item_id: String,
        message: String,
    },
    Cancelled {
        item_id: String,
    },
}

/// Drives a [`TranscriptionQueue`] through a [`JobController`], one job at
/// a time.
pub struct QueueRunner {
    queue: TranscriptionQueue,
    controller: JobController,
    model: ModelSize,
    store: Option<Arc<dyn TranscriptStore>>,
    event_tx: Option<crossbeam_channel::Sender<RunnerEvent>>,
}

impl QueueRunner {
    pub fn new(controller: JobController, model: ModelSize) -> Self {
        Self {
            queue: TranscriptionQueue::new(),
            controller,
            model,
            store: None,
            event_tx: None,
        }
    }

    /// Persists every completed transcript through the given store.
    pub fn with_store(mut self, store: Arc<dyn TranscriptStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Mirrors runner events onto a channel (crossbeam, non-blocking).
    pub fn with_event_sender(mut self, tx: crossbeam_channel::Sender<RunnerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn queue(&self) -> &TranscriptionQueue {
        &self.queue
    }

    /// Mutable queue access for enqueue/reorder/remove between runs.
    pub fn queue_mut(&mut self) -> &mut TranscriptionQueue {
        &mut self.queue
    }

    pub fn controller(&self) -> &JobController {
        &self.controller
    }

    fn emit(&self, event: RunnerEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).ok();
        }
    }

    /// Starts the earliest pending item and follows it to its terminal
    /// event. Returns `None` when nothing is pending.
    ///
    /// Start-call failures (validation, spawn) mark the item as errored
    /// and count as a processed item; they never abort the runner.
    pub async fn process_next(&mut self) -> Option<ItemOutcome> {
        let item = self.queue.next_pending()?.clone();

        self.queue
            .update_status(&item.id, QueueItemStatus::Processing, Some(0.0));

        let handle = match self
            .controller
            .start_job(Path::new(&item.file_path), self.model)
        {
            Ok(handle) => handle,
            Err(e) => {
                let message = e.to_string();
                warn!(item_id = %item.id, "failed to start job: {message}");
                self.queue
                    .update_status(&item.id, QueueItemStatus::Error, None);
                self.emit(RunnerEvent::ItemFailed {
                    item_id: item.id.clone(),
                    message: message.clone(),
                });
                return Some(ItemOutcome::Failed {
                    item_id: item.id,
                    message,
                });
            }
        };

        self.emit(RunnerEvent::ItemStarted {
            item_id: item.id.clone(),
            job_id: handle.id.clone(),
        });

        loop {
            match handle.events.try_recv() {
                Ok(JobEvent::Progress { percent, status }) => {
                    self.queue.update_status(
                        &item.id,
                        QueueItemStatus::Processing,
                        Some(percent as f64),
                    );
                    self.emit(RunnerEvent::ItemProgress {
                        item_id: item.id.clone(),
                        percent,
                        status,
                    });
                }
                Ok(JobEvent::Segment(_)) => {
                    // Segments stream to per-job subscribers; the runner
                    // only cares about the assembled transcript.
                }
                Ok(JobEvent::Completed(transcript)) => {
                    self.queue
                        .update_status(&item.id, QueueItemStatus::Completed, Some(100.0));

                    let stored_id = self.persist(&transcript, &item.file_path).await;
                    info!(item_id = %item.id, segments = transcript.segments.len(), "item completed");
                    self.emit(RunnerEvent::ItemCompleted {
                        item_id: item.id.clone(),
                        stored_id,
                    });
                    return Some(ItemOutcome::Completed {
                        item_id: item.id,
                        transcript,
                    });
                }
                Ok(JobEvent::Failed { message }) => {
                    self.queue
                        .update_status(&item.id, QueueItemStatus::Error, None);
                    self.emit(RunnerEvent::ItemFailed {
                        item_id: item.id.clone(),
                        message: message.clone(),
                    });
                    return Some(ItemOutcome::Failed {
                        item_id: item.id,
                        message,
                    });
                }
                Ok(JobEvent::Cancelled) => {
                    self.queue
                        .update_status(&item.id, QueueItemStatus::Error, None);
                    self.emit(RunnerEvent::ItemFailed {
                        item_id: item.id.clone(),
                        message: "cancelled".to_string(),
                    });
                    return Some(ItemOutcome::Cancelled { item_id: item.id });
                }
                Err(TryRecvError::Empty) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(TryRecvError::Disconnected) => {
                    // Channel closed without a terminal event; treat as failure.
                    self.queue
                        .update_status(&item.id, QueueItemStatus::Error, None);
                    let message = "job event stream closed unexpectedly".to_string();
                    self.emit(RunnerEvent::ItemFailed {
                        item_id: item.id.clone(),
                        message: message.clone(),
                    });
                    return Some(ItemOutcome::Failed {
                        item_id: item.id,
                        message,
                    });
                }
            }
        }
    }

    /// Processes pending items until the queue has none left.
    pub async fn drain(&mut self) -> Vec<ItemOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.process_next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn persist(&self, transcript: &Transcript, file_path: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        let stored = StoredTranscript::from_transcript(transcript.clone(), file_path, self.model);
        match store.save(&stored).await {
            Ok(()) => Some(stored.id),
            Err(e) => {
                warn!("failed to persist transcript for {file_path}: {e}");
                None
            }
        }
    }
}
