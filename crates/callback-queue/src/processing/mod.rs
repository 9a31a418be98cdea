//! Job processing: the single-flight coordinator and the processing extension point

mod coordinator;
mod processor;

pub use coordinator::{CoordinatorOptions, DrainOutcome, JobCoordinator};
pub use processor::{
    CallbackNotification, CallbackProcessor, JobProcessor, NoopProcessor, ProcessingFailure,
};
