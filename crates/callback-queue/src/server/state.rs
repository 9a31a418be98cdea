//! Application state for the queue server

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::error::Result;
use crate::processing::{
    CallbackProcessor, CoordinatorOptions, JobCoordinator, JobProcessor, NoopProcessor,
};
use crate::storage::QueueDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Job coordinator (owns the store)
    coordinator: JobCoordinator,
}

impl AppState {
    /// Open the store and build the coordinator described by `config`
    pub fn new(config: QueueConfig) -> Result<Self> {
        tracing::info!("Initializing queue state (db: {})...", config.storage.path.display());

        let store = Arc::new(
            QueueDb::new(&config.storage.path).with_busy_timeout(config.storage.busy_timeout()),
        );

        let processor: Arc<dyn JobProcessor> = if config.processing.deliver_callbacks {
            Arc::new(CallbackProcessor::new(config.processing.callback_timeout())?)
        } else {
            tracing::info!("Callback delivery disabled, jobs complete without notification");
            Arc::new(NoopProcessor)
        };

        let coordinator = JobCoordinator::new(store, processor, CoordinatorOptions::from_config(&config));
        coordinator.start()?;

        Ok(Self::with_coordinator(coordinator))
    }

    /// Wrap an already configured coordinator
    pub fn with_coordinator(coordinator: JobCoordinator) -> Self {
        Self {
            inner: Arc::new(AppStateInner { coordinator }),
        }
    }

    pub fn coordinator(&self) -> &JobCoordinator {
        &self.inner.coordinator
    }

    pub fn store(&self) -> &Arc<QueueDb> {
        self.inner.coordinator.store()
    }

    /// Whether the store is open and accepting jobs
    pub fn is_ready(&self) -> bool {
        self.store().is_initialized()
    }
}
