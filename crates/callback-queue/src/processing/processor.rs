//! Processing extension point and built-in processors

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;
use crate::types::{JobRecord, JobStatus};

/// Failure reported by a [`JobProcessor`]. Recorded on the job as its `error_message`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProcessingFailure {
    message: String,
}

impl ProcessingFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Work performed for each claimed job
///
/// Implementations:
/// - `CallbackProcessor`: POSTs a completion notice to the job's callback_url
/// - `NoopProcessor`: accepts every job without side effects
///
/// Processing is never invoked concurrently by a single coordinator.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Process one claimed job
    async fn process(&self, job: &JobRecord) -> std::result::Result<(), ProcessingFailure>;

    /// Get processor name for logging
    fn name(&self) -> &str;
}

/// Processor that completes every job immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProcessor;

#[async_trait]
impl JobProcessor for NoopProcessor {
    async fn process(&self, job: &JobRecord) -> std::result::Result<(), ProcessingFailure> {
        tracing::debug!(job.id = job.id, file = %job.file, "No-op processing");
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Body POSTed to a job's callback_url
#[derive(Debug, Serialize)]
pub struct CallbackNotification<'a> {
    pub id: i64,
    pub file: &'a str,
    pub status: JobStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Value>,
}

impl<'a> CallbackNotification<'a> {
    fn completed(job: &'a JobRecord) -> Self {
        Self {
            id: job.id,
            file: &job.file,
            status: JobStatus::Completed,
            attempts: job.attempts,
            metadata: job.metadata.as_ref(),
        }
    }
}

/// Processor that delivers a completion notice to the job's callback_url
pub struct CallbackProcessor {
    client: reqwest::Client,
}

impl CallbackProcessor {
    /// Create a processor whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JobProcessor for CallbackProcessor {
    async fn process(&self, job: &JobRecord) -> std::result::Result<(), ProcessingFailure> {
        let notification = CallbackNotification::completed(job);

        let response = self
            .client
            .post(&job.callback_url)
            .json(&notification)
            .send()
            .await
            .map_err(|e| {
                ProcessingFailure::new(format!("Callback to {} failed: {}", job.callback_url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessingFailure::new(format!(
                "Callback to {} returned {}",
                job.callback_url, status
            )));
        }

        tracing::debug!(job.id = job.id, "Callback delivered to {}", job.callback_url);
        Ok(())
    }

    fn name(&self) -> &str {
        "callback"
    }
}
