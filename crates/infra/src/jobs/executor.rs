//! Background job executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use bulksend_core::JobId;

use super::orchestrator::{JobError, JobOrchestrator};

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Maximum jobs processed at the same time
    pub max_concurrent: usize,
    /// Name for logging
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_submitted: u64,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

#[derive(Debug)]
struct Counters {
    started: Instant,
    submitted: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    running: AtomicUsize,
}

impl Counters {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            submitted: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            running: AtomicUsize::new(0),
        }
    }

    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            jobs_submitted: self.submitted.load(Ordering::Relaxed),
            jobs_processed: self.processed.load(Ordering::Relaxed),
            jobs_failed: self.failed.load(Ordering::Relaxed),
            current_running: self.running.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

/// Submission side of the executor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    queue: mpsc::UnboundedSender<JobId>,
    counters: Arc<Counters>,
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl JobExecutor {
    /// Spawn the worker loop on the current tokio runtime.
    pub fn spawn(
        orchestrator: Arc<JobOrchestrator>,
        config: JobExecutorConfig,
    ) -> (JobExecutor, JobExecutorHandle) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let counters = Arc::new(Counters::new());

        let join = tokio::spawn(executor_loop(
            orchestrator,
            config,
            queue_rx,
            shutdown_rx,
            counters.clone(),
        ));

        (
            JobExecutor {
                queue: queue_tx,
                counters: counters.clone(),
            },
            JobExecutorHandle {
                shutdown: Some(shutdown_tx),
                join: Some(join),
                counters,
            },
        )
    }

    /// Queue `job_id` for processing. Returns as soon as it is queued.
    pub fn submit(&self, job_id: JobId) -> Result<(), JobError> {
        self.queue
            .send(job_id)
            .map_err(|_| JobError::Unavailable("job executor is not running".to_string()))?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = %job_id, "job submitted");
        Ok(())
    }

    pub fn stats(&self) -> ExecutorStats {
        self.counters.snapshot()
    }
}

impl JobExecutorHandle {
    /// Stop accepting work and wait for in-flight jobs to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!(error = %e, "job executor task failed");
            }
        }
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.counters.snapshot()
    }
}

async fn executor_loop(
    orchestrator: Arc<JobOrchestrator>,
    config: JobExecutorConfig,
    mut queue: mpsc::UnboundedReceiver<JobId>,
    mut shutdown: oneshot::Receiver<()>,
    counters: Arc<Counters>,
) {
    info!(
        executor = %config.name,
        max_concurrent = config.max_concurrent,
        "job executor started"
    );

    let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let mut running: JoinSet<()> = JoinSet::new();
    // A dropped handle detaches the executor; it then runs until every
    // `JobExecutor` clone is gone.
    let mut detached = false;

    loop {
        tokio::select! {
            signal = &mut shutdown, if !detached => match signal {
                Ok(()) => break,
                Err(_) => {
                    detached = true;
                    debug!(
                        executor = %config.name,
                        "executor handle dropped; running until the queue closes"
                    );
                }
            },
            next = queue.recv() => match next {
                Some(job_id) => {
                    running.spawn(run_job(
                        orchestrator.clone(),
                        permits.clone(),
                        counters.clone(),
                        config.name.clone(),
                        job_id,
                    ));
                }
                None => break,
            },
            Some(joined) = running.join_next(), if !running.is_empty() => {
                if let Err(e) = joined {
                    error!(executor = %config.name, error = %e, "job task panicked");
                }
            }
        }
    }

    // Queued jobs that never got a permit stay pending.
    queue.close();
    permits.close();
    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            error!(executor = %config.name, error = %e, "job task panicked");
        }
    }

    info!(executor = %config.name, "job executor stopped");
}

async fn run_job(
    orchestrator: Arc<JobOrchestrator>,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    executor: String,
    job_id: JobId,
) {
    let Ok(_permit) = permits.acquire_owned().await else {
        debug!(executor = %executor, job_id = %job_id, "executor stopping; job left pending");
        return;
    };

    counters.running.fetch_add(1, Ordering::Relaxed);
    let result = orchestrator.process_job(job_id).await;
    counters.running.fetch_sub(1, Ordering::Relaxed);
    counters.processed.fetch_add(1, Ordering::Relaxed);

    if let Err(e) = result {
        counters.failed.fetch_add(1, Ordering::Relaxed);
        warn!(executor = %executor, job_id = %job_id, error = %e, "job processing failed");
    }
}
