//! Background worker pool for parse jobs.
//!
//! Triggers push jobs onto a bounded channel; a single worker loop pulls
//! them off and runs each in its own task, at most `concurrency` at a time.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use super::job::{ParseEvent, ParseJob, ParseJobRunner};
use crate::config::WorkerSettings;
use crate::models::FailureKind;

/// Why a job could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
    Closed,
}

impl std::fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => f.write_str("parse queue is full"),
            Self::Closed => f.write_str("parse queue is closed"),
        }
    }
}

/// Sending half of the job queue.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<ParseJob>,
}

impl JobQueue {
    /// Queue a job without waiting for room.
    pub fn enqueue(&self, job: ParseJob) -> Result<(), EnqueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

pub struct JobDispatcher {
    queue: JobQueue,
    worker: JoinHandle<()>,
}

impl JobDispatcher {
    /// Start the worker loop on the current runtime.
    pub fn spawn(
        runner: ParseJobRunner,
        settings: WorkerSettings,
        events: Option<mpsc::Sender<ParseEvent>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let worker = tokio::spawn(worker_loop(
            rx,
            Arc::new(runner),
            settings.concurrency.max(1),
            events,
        ));

        Self {
            queue: JobQueue { tx },
            worker,
        }
    }

    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    /// Stop accepting jobs and wait for queued and running ones to finish.
    ///
    /// Jobs are only drained once every `JobQueue` clone has been dropped.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            error!("Parse worker loop ended abnormally: {}", e);
        }
    }
}

async fn worker_loop(
    mut rx: mpsc::Receiver<ParseJob>,
    runner: Arc<ParseJobRunner>,
    concurrency: usize,
    events: Option<mpsc::Sender<ParseEvent>>,
) {
    info!("Parse worker started ({} concurrent jobs)", concurrency);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut running = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        // Reap finished tasks so the set doesn't grow without bound
        while running.try_join_next().is_some() {}

        let runner = runner.clone();
        let events = events.clone();
        running.spawn(async move {
            let _permit = permit;
            run_guarded(&runner, job, events.as_ref()).await;
        });
    }

    while running.join_next().await.is_some() {}
    info!("Parse worker stopped");
}

/// Run one job, turning a panic into a recorded failure.
async fn run_guarded(
    runner: &ParseJobRunner,
    job: ParseJob,
    events: Option<&mpsc::Sender<ParseEvent>>,
) {
    emit(
        events,
        ParseEvent::Started {
            file_id: job.file_id,
            attempt: job.attempt,
        },
    );

    let event = match AssertUnwindSafe(runner.run(&job)).catch_unwind().await {
        Ok(outcome) => outcome.into_event(&job),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "parse job panicked".to_string());
            runner.fail(&job, FailureKind::Internal, &message).await;
            ParseEvent::Failed {
                file_id: job.file_id,
                attempt: job.attempt,
                kind: FailureKind::Internal,
                error: message,
            }
        }
    };

    emit(events, event);
}

/// Never blocks. Events are dropped when the listener falls behind.
fn emit(events: Option<&mpsc::Sender<ParseEvent>>, event: ParseEvent) {
    if let Some(tx) = events {
        if let Err(e) = tx.try_send(event) {
            debug!("Dropping parse event: {}", e);
        }
    }
}
