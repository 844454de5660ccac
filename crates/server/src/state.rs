use std::sync::Arc;

use odin_jobs_core::{BatchRouter, Config, DispatchRunner, SanitizedConfig, WatermarkStore};
use tokio::sync::{Mutex, MutexGuard};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn WatermarkStore>,
    batch: BatchRouter,
    /// Absent when no project is configured
    runner: Option<DispatchRunner>,
    /// Held for the duration of a dispatch run
    dispatch_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn WatermarkStore>,
        batch: BatchRouter,
        runner: Option<DispatchRunner>,
    ) -> Self {
        Self {
            config,
            store,
            batch,
            runner,
            dispatch_lock: Mutex::new(()),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn WatermarkStore {
        self.store.as_ref()
    }

    pub fn batch(&self) -> &BatchRouter {
        &self.batch
    }

    pub fn runner(&self) -> Option<&DispatchRunner> {
        self.runner.as_ref()
    }

    /// Claim the single dispatch slot, or `None` if a run is in progress.
    pub fn try_begin_dispatch(&self) -> Option<MutexGuard<'_, ()>> {
        self.dispatch_lock.try_lock().ok()
    }
}
