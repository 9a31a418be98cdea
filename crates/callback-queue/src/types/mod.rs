//! Core data types shared by the store, coordinator and HTTP layer

pub mod job;

pub use job::{
    JobRecord, JobStatus, NewJob, QueueStats, MAX_CALLBACK_URL_BYTES, MAX_FILE_REF_BYTES,
    MAX_METADATA_BYTES,
};
