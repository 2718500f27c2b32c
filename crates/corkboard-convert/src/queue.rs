//! The named conversion queue and its worker pools.
//!
//! Tasks flow through an unbounded mpsc channel shared by the pool; each
//! enqueued job carries a oneshot sender so the caller can await its own
//! outcome. Jobs enqueued before a processor registers sit in the channel
//! until one does. The backend is in-memory, so delivery is at-most-once: a
//! host crash loses queued jobs, and idempotent output naming makes
//! re-enqueueing them safe.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::job::{ConversionJob, ConversionResult};
use crate::sandbox;

type JobOutcome = Result<ConversionResult, ConvertError>;

struct TaskEnvelope {
    task_id: Uuid,
    job: ConversionJob,
    done: oneshot::Sender<JobOutcome>,
}

/// Cloneable receiver so a pool of workers can pull from one channel.
struct SharedReceiver<T> {
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> SharedReceiver<T> {
    fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

/// Handle to one enqueued job.
pub struct JobHandle {
    job_id: String,
    task_id: Uuid,
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Queue-internal id, used for log correlation.
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<ConversionResult, ConvertError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ConvertError::QueueClosed),
        }
    }
}

pub struct ConversionQueue {
    name: String,
    worker_count: usize,
    tx: mpsc::UnboundedSender<TaskEnvelope>,
    pending: Mutex<Option<SharedReceiver<TaskEnvelope>>>,
}

impl ConversionQueue {
    /// Create a named queue. `worker_count` is clamped to at least one so a
    /// zero-worker queue cannot strand its jobs.
    pub fn new(name: impl Into<String>, worker_count: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            worker_count: worker_count.max(1),
            tx,
            pending: Mutex::new(Some(SharedReceiver::new(rx))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a job without blocking and return an awaitable handle.
    pub fn add_task(&self, job: ConversionJob) -> Result<JobHandle, ConvertError> {
        let task_id = Uuid::new_v4();
        let (done, rx) = oneshot::channel();
        let job_id = job.id.clone();
        tracing::debug!(
            queue = %self.name,
            %task_id,
            job_id = %job_id,
            file = %job.filename,
            "Job enqueued"
        );
        self.tx
            .send(TaskEnvelope { task_id, job, done })
            .map_err(|_| ConvertError::QueueClosed)?;
        Ok(JobHandle {
            job_id,
            task_id,
            rx,
        })
    }

    fn take_receiver(&self) -> Result<SharedReceiver<TaskEnvelope>, ConvertError> {
        self.pending
            .lock()
            .map_err(|_| ConvertError::QueueClosed)?
            .take()
            .ok_or(ConvertError::ProcessorRegistered)
    }

    /// Register an in-process handler and start the worker pool.
    ///
    /// Each job runs on the blocking thread pool; a panicking handler is
    /// contained and reported as [`ConvertError::ProcessCrash`], matching the
    /// sandboxed contract.
    pub fn add_processor<F>(&self, process: F) -> Result<(), ConvertError>
    where
        F: Fn(&ConversionJob) -> JobOutcome + Send + Sync + 'static,
    {
        let shared = self.take_receiver()?;
        let process = Arc::new(process);
        for worker in 0..self.worker_count {
            let shared = shared.clone();
            let process = Arc::clone(&process);
            let queue = self.name.clone();
            tokio::spawn(async move {
                tracing::debug!(queue = %queue, worker, "Conversion worker started");
                while let Some(task) = shared.recv().await {
                    let TaskEnvelope { task_id, job, done } = task;
                    let job_id = job.id.clone();
                    let file = job.filename.clone();
                    let process = Arc::clone(&process);
                    let outcome = tokio::task::spawn_blocking(move || process(&job))
                        .await
                        .unwrap_or_else(|e| {
                            Err(ConvertError::ProcessCrash(format!(
                                "conversion task panicked: {e}"
                            )))
                        });
                    log_outcome(&queue, task_id, &job_id, &file, &outcome);
                    let _ = done.send(outcome);
                }
                tracing::debug!(queue = %queue, worker, "Conversion worker stopped");
            });
        }
        Ok(())
    }

    /// Register the sandboxed execution mode: every job runs in a fresh OS
    /// process started from `worker_bin`. A crashing child fails only its
    /// own job; the pool task survives and keeps serving the queue.
    pub fn add_processor_sandboxed(
        &self,
        worker_bin: impl Into<PathBuf>,
        config: ConvertConfig,
    ) -> Result<(), ConvertError> {
        let shared = self.take_receiver()?;
        let worker_bin = Arc::new(worker_bin.into());
        let config = Arc::new(config);
        for worker in 0..self.worker_count {
            let shared = shared.clone();
            let worker_bin = Arc::clone(&worker_bin);
            let config = Arc::clone(&config);
            let queue = self.name.clone();
            tokio::spawn(async move {
                tracing::debug!(queue = %queue, worker, "Sandboxed conversion worker started");
                while let Some(task) = shared.recv().await {
                    let TaskEnvelope { task_id, job, done } = task;
                    let job_id = job.id.clone();
                    let file = job.filename.clone();
                    let outcome = sandbox::run_sandboxed(&worker_bin, &config, job).await;
                    log_outcome(&queue, task_id, &job_id, &file, &outcome);
                    let _ = done.send(outcome);
                }
                tracing::debug!(queue = %queue, worker, "Sandboxed conversion worker stopped");
            });
        }
        Ok(())
    }
}

fn log_outcome(queue: &str, task_id: Uuid, job_id: &str, file: &str, outcome: &JobOutcome) {
    match outcome {
        Ok(result) => tracing::info!(
            queue,
            %task_id,
            job_id,
            file,
            pages = result.pages.len(),
            "Job completed"
        ),
        Err(error) => tracing::error!(
            queue,
            %task_id,
            job_id,
            file,
            error = %error,
            "Job failed"
        ),
    }
}
