//! Job record types and lifecycle states

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum size of the `file` reference in bytes
pub const MAX_FILE_REF_BYTES: usize = 4 * 1024;
/// Maximum size of the `callback_url` in bytes
pub const MAX_CALLBACK_URL_BYTES: usize = 2 * 1024;
/// Maximum size of the serialized `metadata` payload in bytes
pub const MAX_METADATA_BYTES: usize = 64 * 1024;

/// Lifecycle state of a queued job
///
/// Legal transitions:
///
/// ```text
/// pending ──claim──► processing ──finalize──► completed
///    ▲                         └──finalize──► failed
///    └────────────retry────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed
    Pending,
    /// Claimed by a coordinator, processing in flight
    Processing,
    /// Processed successfully
    Completed,
    /// Processing reported a failure
    Failed,
}

impl JobStatus {
    /// All states, in lifecycle order
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Name as persisted in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether this is a terminal state (`completed` or `failed`)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Pending)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown job status: {}", other))),
        }
    }
}

/// A job as submitted, before the store assigns an id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewJob {
    /// Destination for the result notification
    pub callback_url: String,
    /// Opaque reference to the artifact to process
    pub file: String,
    /// Opaque auxiliary payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl NewJob {
    pub fn new(callback_url: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            file: file.into(),
            metadata: None,
        }
    }

    /// Attach a metadata payload
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check field presence and size limits.
    ///
    /// Returns the serialized metadata so callers persist exactly what was measured.
    pub fn validate(&self) -> Result<Option<String>> {
        if self.callback_url.trim().is_empty() {
            return Err(Error::InvalidInput("callback_url must not be empty".to_string()));
        }
        if self.callback_url.len() > MAX_CALLBACK_URL_BYTES {
            return Err(Error::InvalidInput(format!(
                "callback_url exceeds {} bytes",
                MAX_CALLBACK_URL_BYTES
            )));
        }
        if self.file.trim().is_empty() {
            return Err(Error::InvalidInput("file must not be empty".to_string()));
        }
        if self.file.len() > MAX_FILE_REF_BYTES {
            return Err(Error::InvalidInput(format!(
                "file reference exceeds {} bytes",
                MAX_FILE_REF_BYTES
            )));
        }

        let metadata = match &self.metadata {
            Some(value) => {
                let encoded = serde_json::to_string(value)?;
                if encoded.len() > MAX_METADATA_BYTES {
                    return Err(Error::InvalidInput(format!(
                        "metadata exceeds {} bytes",
                        MAX_METADATA_BYTES
                    )));
                }
                Some(encoded)
            }
            None => None,
        };

        Ok(metadata)
    }
}

/// A persisted job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    /// Store-assigned identifier, monotonically increasing
    pub id: i64,
    /// Creation time in milliseconds since the Unix epoch (FIFO key)
    pub timestamp: i64,
    /// Destination for the result notification
    pub callback_url: String,
    /// Opaque reference to the artifact to process
    pub file: String,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Number of times this job has been claimed
    pub attempts: u32,
    /// Failure detail (only when `failed`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Opaque auxiliary payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Time the job reached a terminal state, in milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
}

/// Per-status job counts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trips_through_column_name() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_legal_transitions() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(JobStatus::Processing).unwrap(), json!("processing"));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(matches!(
            NewJob::new("", "a.pdf").validate(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            NewJob::new("http://x/cb", "  ").validate(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_enforces_size_limits() {
        let long_file = "f".repeat(MAX_FILE_REF_BYTES + 1);
        assert!(NewJob::new("http://x/cb", long_file).validate().is_err());

        let big = json!({ "blob": "x".repeat(MAX_METADATA_BYTES) });
        let job = NewJob::new("http://x/cb", "a.pdf").with_metadata(big);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validate_returns_encoded_metadata() {
        let job = NewJob::new("http://x/cb", "a.pdf").with_metadata(json!({ "project": 7 }));
        assert_eq!(job.validate().unwrap().as_deref(), Some(r#"{"project":7}"#));
        assert_eq!(NewJob::new("http://x/cb", "a.pdf").validate().unwrap(), None);
    }
}
