//! Background job queue
//!
//! Accepts named units of work, assigns each an opaque job id, records a
//! `queued` status for it and runs it on a pool of tokio worker tasks. Workers
//! publish progress through a [`JobHandle`]; anybody can read the latest status
//! back from the shared [`JobStatusStore`].

use crate::error::{ApiError, StorageError};
use crate::jobs::status::{now_millis, JobState, JobStatusRecord, JobStatusStore};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

static JOB_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A unit of work: receives its handle and runs to completion.
pub type JobWork = Box<dyn FnOnce(JobHandle) -> BoxFuture<'static, ()> + Send>;

/// Configuration for the job queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Jobs waiting beyond this are refused
    pub max_queue_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_queue_size: 64,
        }
    }
}

impl From<&crate::config::JobsConfig> for QueueConfig {
    fn from(config: &crate::config::JobsConfig) -> Self {
        Self {
            workers: config.workers,
            max_queue_size: config.max_queue_size,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

struct QueuedJob {
    job_id: String,
    name: String,
    work: JobWork,
}

/// Status writer given to a running job. Writes are keyed by the job's id.
#[derive(Clone)]
pub struct JobHandle {
    job_id: String,
    store: Arc<JobStatusStore>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Set the job state, optionally with a human readable message.
    pub fn set_state(&self, state: JobState, message: Option<String>) -> Result<(), StorageError> {
        self.store.update(&self.job_id, |record| {
            record.status = state;
            if message.is_some() {
                record.message = message;
            }
        })?;
        Ok(())
    }

    /// Merge fields into the job's payload, overwriting keys already present.
    pub fn merge_payload(&self, fields: Map<String, Value>) -> Result<(), StorageError> {
        self.store.update(&self.job_id, |record| {
            for (key, value) in fields {
                record.payload.insert(key, value);
            }
        })?;
        Ok(())
    }

    pub fn state(&self) -> Result<Option<JobState>, StorageError> {
        Ok(self.store.get(&self.job_id)?.map(|r| r.status))
    }
}

pub struct JobQueue {
    pending: Arc<Mutex<VecDeque<QueuedJob>>>,
    notify: Arc<Notify>,
    workers: RwLock<Vec<tokio::task::JoinHandle<()>>>,
    config: QueueConfig,
    store: Arc<JobStatusStore>,
    running: Arc<RwLock<bool>>,
    closed: RwLock<bool>,
    stats: Arc<RwLock<QueueStats>>,
}

impl JobQueue {
    pub fn new(store: Arc<JobStatusStore>, config: QueueConfig) -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            workers: RwLock::new(Vec::new()),
            config,
            store,
            running: Arc::new(RwLock::new(false)),
            closed: RwLock::new(false),
            stats: Arc::new(RwLock::new(QueueStats::default())),
        }
    }

    pub fn store(&self) -> &Arc<JobStatusStore> {
        &self.store
    }

    /// Submit a named unit of work. Returns the assigned job id immediately.
    ///
    /// Fails with [`ApiError::Scheduling`] when the queue is full, shut down, or
    /// the initial status cannot be recorded; no job exists afterwards.
    pub fn submit(
        &self,
        name: &str,
        options: Map<String, Value>,
        work: JobWork,
    ) -> Result<String, ApiError> {
        if *self.closed.read() {
            return Err(ApiError::Scheduling("job queue is shut down".to_string()));
        }

        let mut pending = self.pending.lock();
        if pending.len() >= self.config.max_queue_size {
            warn!(
                queue_size = pending.len(),
                max_size = self.config.max_queue_size,
                "Job queue is full, refusing job"
            );
            return Err(ApiError::Scheduling("job queue is full".to_string()));
        }

        let job_id = new_job_id();
        self.store
            .put(&JobStatusRecord::queued(&job_id, name, options))
            .map_err(|e| ApiError::Scheduling(format!("failed to record job status: {}", e)))?;

        pending.push_back(QueuedJob {
            job_id: job_id.clone(),
            name: name.to_string(),
            work,
        });
        let queue_size = pending.len();
        // Counted under the queue lock so a worker cannot pop it first
        self.stats.write().pending += 1;
        drop(pending);

        self.notify.notify_one();

        debug!(job_id = %job_id, name = %name, queue_size, "Enqueued job");
        Ok(job_id)
    }

    /// Start background workers. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<(), ApiError> {
        let mut running = self.running.write();
        if *running {
            return Ok(());
        }
        *running = true;
        drop(running);

        let mut workers = self.workers.write();
        for i in 0..self.config.workers.max(1) {
            let pending = Arc::clone(&self.pending);
            let notify = Arc::clone(&self.notify);
            let store = Arc::clone(&self.store);
            let running = Arc::clone(&self.running);
            let stats = Arc::clone(&self.stats);

            workers.push(tokio::spawn(async move {
                Self::worker_loop(i, pending, notify, store, running, stats).await;
            }));
        }

        info!(worker_count = workers.len(), "Started validation job workers");
        Ok(())
    }

    /// Stop accepting work, let workers finish their current job and exit.
    /// Jobs still waiting stay `queued` in the status store.
    pub async fn stop(&self) -> Result<(), ApiError> {
        *self.closed.write() = true;
        {
            let mut running = self.running.write();
            if !*running {
                return Ok(());
            }
            *running = false;
        }
        self.notify.notify_waiters();

        let workers = std::mem::take(&mut *self.workers.write());
        for handle in workers {
            let _ = handle.await;
        }

        info!("Stopped validation job workers");
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Wait until nothing is pending or processing.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> Result<(), ApiError> {
        let started = std::time::Instant::now();
        loop {
            {
                let stats = self.stats.read();
                if stats.pending == 0 && stats.processing == 0 {
                    return Ok(());
                }
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(ApiError::Scheduling(
                        "timed out waiting for validation jobs".to_string(),
                    ));
                }
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    async fn worker_loop(
        worker_id: usize,
        pending: Arc<Mutex<VecDeque<QueuedJob>>>,
        notify: Arc<Notify>,
        store: Arc<JobStatusStore>,
        running: Arc<RwLock<bool>>,
        stats: Arc<RwLock<QueueStats>>,
    ) {
        debug!(worker_id, "Worker started");

        while *running.read() {
            let next = pending.lock().pop_front();

            let Some(job) = next else {
                // Timeout so a missed wake-up still re-checks `running`
                tokio::select! {
                    _ = notify.notified() => continue,
                    _ = sleep(Duration::from_millis(100)) => continue,
                }
            };

            {
                let mut stats = stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.processing += 1;
            }

            let handle = JobHandle {
                job_id: job.job_id.clone(),
                store: Arc::clone(&store),
            };
            let started = now_millis();
            let outcome = AssertUnwindSafe((job.work)(handle.clone()))
                .catch_unwind()
                .await;

            if outcome.is_err() {
                error!(job_id = %job.job_id, name = %job.name, "Job panicked");
                if let Err(e) = handle.set_state(JobState::Failed, Some("job panicked".to_string())) {
                    error!(job_id = %job.job_id, error = %e, "Failed to record job failure");
                }
            }

            let final_state = handle.state().ok().flatten();
            {
                let mut stats = stats.write();
                stats.processing = stats.processing.saturating_sub(1);
                if final_state == Some(JobState::Completed) {
                    stats.completed += 1;
                } else {
                    stats.failed += 1;
                }
            }
            debug!(
                worker_id,
                job_id = %job.job_id,
                state = ?final_state,
                duration_ms = now_millis().saturating_sub(started),
                "Job finished"
            );
        }

        debug!(worker_id, "Worker stopped");
    }
}

/// Opaque job id: 32 hex chars derived from time, process and a counter.
pub fn new_job_id() -> String {
    let seq = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = format!("{}-{}-{}", now_millis(), std::process::id(), seq);
    hex::encode(&blake3::hash(seed.as_bytes()).as_bytes()[..16])
}
