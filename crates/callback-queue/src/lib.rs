//! callback-queue: durable single-node work queue
//!
//! Clients submit jobs that reference a file and a callback address. Each job is
//! persisted to SQLite, processed one at a time by a [`JobCoordinator`], and left in a
//! terminal `completed` or `failed` state.
//!
//! # Architecture
//!
//! ```text
//! POST /queue ──► JobCoordinator::submit ──► QueueDb::enqueue
//!                        │
//!                 drain_one (single-flight)
//!                        │
//!        QueueDb::claim_next ──► JobProcessor::process ──► QueueDb::finalize
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callback_queue::{CoordinatorOptions, JobCoordinator, NewJob, NoopProcessor, QueueDb};
//!
//! # async fn example() -> callback_queue::Result<()> {
//! let store = Arc::new(QueueDb::open("queue.db")?);
//! let coordinator = JobCoordinator::new(store, Arc::new(NoopProcessor), CoordinatorOptions::default());
//!
//! coordinator.submit(&NewJob::new("http://example.com/cb", "a.pdf"))?;
//! coordinator.drain_one().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod processing;
pub mod server;
pub mod storage;
pub mod types;

pub use config::QueueConfig;
pub use error::{Error, Result};
pub use processing::{
    CallbackProcessor, CoordinatorOptions, DrainOutcome, JobCoordinator, JobProcessor,
    NoopProcessor, ProcessingFailure,
};
pub use storage::QueueDb;
pub use types::{JobRecord, JobStatus, NewJob, QueueStats};
