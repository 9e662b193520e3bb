//! Production queue
//!
//! Jobs are accepted without back-pressure and run on their own tokio tasks,
//! at most `concurrency` at a time. Each job ends with a [`JobReport`] that is
//! logged, counted in [`QueueStats`] and broadcast to subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Semaphore};

use super::pipeline::{Pipeline, ProductionOutcome};

pub type JobId = u64;

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Work needed to fill one placeholder
#[derive(Debug, Clone)]
pub struct ProductionJob {
    /// The user's message in canonical (English) form
    pub prompt: String,
    pub conversation_id: String,
    pub placeholder_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Filled { fallback: bool },
    PlaceholderMissing,
    Failed { error: String },
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub placeholder_id: String,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub in_flight: u64,
    pub filled: u64,
    pub fallbacks: u64,
    pub placeholder_missing: u64,
    pub failed: u64,
    pub timed_out: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    in_flight: AtomicU64,
    filled: AtomicU64,
    fallbacks: AtomicU64,
    placeholder_missing: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &JobOutcome) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        let counter = match outcome {
            JobOutcome::Filled { fallback } => {
                if *fallback {
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                }
                &self.filled
            }
            JobOutcome::PlaceholderMissing => &self.placeholder_missing,
            JobOutcome::Failed { .. } => &self.failed,
            JobOutcome::TimedOut => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            filled: self.filled.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            placeholder_missing: self.placeholder_missing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Production queue is shut down")]
    Closed,
}

/// Handle to the production queue. Cheap to clone.
#[derive(Clone)]
pub struct ProductionQueue {
    tx: mpsc::UnboundedSender<(JobId, ProductionJob)>,
    next_id: Arc<AtomicU64>,
    counters: Arc<Counters>,
    reports: broadcast::Sender<JobReport>,
}

impl ProductionQueue {
    /// Spawn the dispatch loop. Must be called inside a tokio runtime.
    pub fn start(pipeline: Arc<Pipeline>, concurrency: usize, job_timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let counters = Arc::new(Counters::default());

        let dispatcher = Dispatcher {
            pipeline,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            job_timeout,
            counters: counters.clone(),
            reports: reports.clone(),
        };
        tokio::spawn(dispatcher.run(rx));

        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
            counters,
            reports,
        }
    }

    /// Enqueue a job and return immediately
    pub fn submit(&self, job: ProductionJob) -> Result<JobId, QueueError> {
        let job_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tx.send((job_id, job)).map_err(|_| QueueError::Closed)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(job_id)
    }

    /// Receive reports of jobs finishing from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JobReport> {
        self.reports.subscribe()
    }

    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }
}

struct Dispatcher {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    job_timeout: Option<Duration>,
    counters: Arc<Counters>,
    reports: broadcast::Sender<JobReport>,
}

impl Dispatcher {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<(JobId, ProductionJob)>) {
        let this = Arc::new(self);

        while let Some((job_id, job)) = rx.recv().await {
            let permit = match this.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let worker = this.clone();
            tokio::spawn(async move {
                let _permit = permit;
                worker.execute(job_id, job).await;
            });
        }

        tracing::debug!("production queue dispatcher stopped");
    }

    async fn execute(&self, job_id: JobId, job: ProductionJob) {
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let placeholder_id = job.placeholder_id.clone();

        // A separate task so a panic inside the pipeline is reported, not lost
        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(async move {
            pipeline
                .produce(&job.prompt, &job.conversation_id, &job.placeholder_id)
                .await
        });
        let abort = handle.abort_handle();

        let joined = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    abort.abort();
                    None
                }
            },
            None => Some(handle.await),
        };

        let outcome = match joined {
            None => JobOutcome::TimedOut,
            Some(Ok(Ok(ProductionOutcome::Filled { fallback }))) => JobOutcome::Filled { fallback },
            Some(Ok(Ok(ProductionOutcome::PlaceholderMissing))) => JobOutcome::PlaceholderMissing,
            Some(Ok(Err(e))) => JobOutcome::Failed {
                error: e.to_string(),
            },
            Some(Err(e)) => JobOutcome::Failed {
                error: format!("production task aborted: {}", e),
            },
        };

        let report = JobReport {
            job_id,
            placeholder_id,
            outcome,
            elapsed: started.elapsed(),
        };
        log_report(&report);
        self.counters.record(&report.outcome);

        // No subscribers is fine
        let _ = self.reports.send(report);
    }
}

fn log_report(report: &JobReport) {
    let elapsed_ms = report.elapsed.as_millis() as u64;
    match &report.outcome {
        JobOutcome::Filled { fallback: false } => tracing::info!(
            job_id = report.job_id,
            placeholder_id = %report.placeholder_id,
            elapsed_ms,
            "message produced"
        ),
        JobOutcome::Filled { fallback: true } => tracing::warn!(
            job_id = report.job_id,
            placeholder_id = %report.placeholder_id,
            elapsed_ms,
            "message filled with fallback answer"
        ),
        JobOutcome::PlaceholderMissing => tracing::debug!(
            job_id = report.job_id,
            placeholder_id = %report.placeholder_id,
            "placeholder gone, answer discarded"
        ),
        JobOutcome::Failed { error } => tracing::error!(
            job_id = report.job_id,
            placeholder_id = %report.placeholder_id,
            error = %error,
            "message production failed, placeholder left empty"
        ),
        JobOutcome::TimedOut => tracing::warn!(
            job_id = report.job_id,
            placeholder_id = %report.placeholder_id,
            elapsed_ms,
            "message production timed out, placeholder left empty"
        ),
    }
}
