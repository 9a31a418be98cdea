//! Single-flight job coordinator
//!
//! At most one job is processed at a time per coordinator. The busy flag only guards
//! this process; the store's transactional claim is what keeps other coordinators
//! sharing the same database from taking the same row.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{Instant, Interval};

use super::processor::{JobProcessor, ProcessingFailure};
use crate::config::QueueConfig;
use crate::error::Result;
use crate::storage::QueueDb;
use crate::types::{JobRecord, JobStatus, NewJob};

/// Result of one [`JobCoordinator::drain_one`] step
#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    /// A job was claimed and finalized (completed or failed)
    Processed(JobRecord),
    /// No pending job was available
    QueueEmpty,
    /// Another drain step is in flight; nothing was touched
    AlreadyProcessing,
}

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Fallback poll interval for the background loop
    pub poll_interval: Duration,
    /// Failed jobs below this attempt count are retried by the sweep
    pub max_attempts: u32,
    /// Interval of the automatic retry sweep; disabled when `None` or zero
    pub sweep_interval: Option<Duration>,
}

impl CoordinatorOptions {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            poll_interval: config.processing.poll_interval(),
            max_attempts: config.retry.max_attempts,
            sweep_interval: config.retry.sweep_interval(),
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Drives jobs from `pending` through processing to a terminal state
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    store: Arc<QueueDb>,
    processor: Arc<dyn JobProcessor>,
    options: CoordinatorOptions,
    busy: AtomicBool,
    wakeup: Notify,
}

impl JobCoordinator {
    /// Create a coordinator over `store`, processing jobs with `processor`
    pub fn new(
        store: Arc<QueueDb>,
        processor: Arc<dyn JobProcessor>,
        options: CoordinatorOptions,
    ) -> Self {
        tracing::info!(
            "Coordinator configured: processor={}, poll={:?}, max_attempts={}",
            processor.name(),
            options.poll_interval,
            options.max_attempts
        );

        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                processor,
                options,
                busy: AtomicBool::new(false),
                wakeup: Notify::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<QueueDb> {
        &self.inner.store
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.inner.options
    }

    /// Whether a drain step is currently in flight
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Initialize the store and clear the busy flag
    pub fn start(&self) -> Result<()> {
        self.inner.store.initialize()?;
        self.inner.busy.store(false, Ordering::Release);
        Ok(())
    }

    /// Enqueue a job and wake the background loop. Returns the new job's id.
    pub fn submit(&self, job: &NewJob) -> Result<i64> {
        self.submit_record(job).map(|record| record.id)
    }

    /// Enqueue a job and wake the background loop. Returns the job as stored.
    pub fn submit_record(&self, job: &NewJob) -> Result<JobRecord> {
        let record = self.inner.store.insert(job)?;
        tracing::info!(job.id = record.id, file = %record.file, "Job queued");
        self.inner.wakeup.notify_one();
        Ok(record)
    }

    /// Claim the oldest pending job, process it and record the outcome.
    ///
    /// Store errors propagate; a processing failure (or panic) is recorded on the job
    /// as `failed` and returned as a normal [`DrainOutcome::Processed`].
    pub async fn drain_one(&self) -> Result<DrainOutcome> {
        let Some(_busy) = BusyGuard::acquire(&self.inner.busy) else {
            tracing::trace!("Drain skipped, already processing");
            return Ok(DrainOutcome::AlreadyProcessing);
        };

        let Some(job) = self.inner.store.claim_next()? else {
            return Ok(DrainOutcome::QueueEmpty);
        };

        tracing::info!(job.id = job.id, attempt = job.attempts, "Processing job");

        let result = AssertUnwindSafe(self.inner.processor.process(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ProcessingFailure::new(panic_message(&*panic))));

        let record = match result {
            Ok(()) => {
                let record = self.inner.store.finalize(job.id, JobStatus::Completed, None)?;
                tracing::info!(job.id = job.id, "Job completed");
                record
            }
            Err(failure) => {
                tracing::warn!(job.id = job.id, "Job failed: {}", failure);
                self.inner
                    .store
                    .finalize(job.id, JobStatus::Failed, Some(failure.message()))?
            }
        };

        Ok(DrainOutcome::Processed(record))
    }

    /// Run [`drain_one`] until the queue is empty. Returns the number of jobs processed.
    ///
    /// [`drain_one`]: JobCoordinator::drain_one
    pub async fn drain(&self) -> Result<usize> {
        let mut processed = 0;
        while let DrainOutcome::Processed(_) = self.drain_one().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Return eligible failed jobs to `pending` using the configured attempt limit
    pub fn retry_failed(&self) -> Result<usize> {
        self.retry_failed_below(self.inner.options.max_attempts)
    }

    /// Return failed jobs with `attempts < max_attempts` to `pending` and wake the loop
    pub fn retry_failed_below(&self, max_attempts: u32) -> Result<usize> {
        let count = self.inner.store.retry_failed(max_attempts)?;
        if count > 0 {
            tracing::info!("Requeued {} failed jobs", count);
            self.inner.wakeup.notify_one();
        }
        Ok(count)
    }

    /// Process jobs until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Wakes on every submit, on the poll interval, and on the retry sweep interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Coordinator loop started");
        // First sweep one period after start; a zero period disables the sweep
        let mut sweep = self
            .inner
            .options
            .sweep_interval
            .filter(|period| !period.is_zero())
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.drain().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Drained {} jobs", n),
                Err(e) => tracing::error!("Failed to drain queue: {}", e),
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.inner.wakeup.notified() => {}
                _ = tokio::time::sleep(self.inner.options.poll_interval) => {}
                _ = next_sweep(&mut sweep) => {
                    if let Err(e) = self.retry_failed() {
                        tracing::error!("Retry sweep failed: {}", e);
                    }
                }
            }
        }

        tracing::info!("Coordinator loop stopped");
    }
}

async fn next_sweep(sweep: &mut Option<Interval>) {
    match sweep {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Holds the busy flag; clears it on drop, including during unwinding
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("processor panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("processor panicked: {}", msg)
    } else {
        "processor panicked".to_string()
    }
}
