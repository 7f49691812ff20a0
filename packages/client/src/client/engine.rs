//! The tokio runtime that drives a client's network I/O

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error};

use crate::builder::ExecutionModel;
use crate::error::ConfigError;

/// Runtime owned by one client.
///
/// The blocking model gets a single worker that keeps connection drivers
/// running between calls; the async model gets `io_threads` workers that run
/// whole requests.
pub struct Engine {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    model: ExecutionModel,
}

impl Engine {
    /// Start the runtime for `model`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::IoSubsystem` when the runtime or its worker
    /// threads cannot be created.
    pub fn start(model: ExecutionModel, io_threads: usize) -> Result<Self, ConfigError> {
        let (workers, thread_name) = match model {
            ExecutionModel::Sync => (1, "transit-sync-io"),
            ExecutionModel::Async => (io_threads.max(1), "transit-async-io"),
        };
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name(thread_name)
            .enable_all()
            .build()
            .map_err(|err| {
                error!(error = %err, ?model, "failed to start I/O runtime");
                ConfigError::IoSubsystem(err)
            })?;
        debug!(?model, workers, "I/O runtime started");
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            model,
        })
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    #[must_use]
    pub fn model(&self) -> ExecutionModel {
        self.model
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runtime().is_some()
    }

    /// Stop the runtime without waiting for its tasks; connection drivers
    /// still running are cancelled. Safe to call from any context.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime().take() {
            runtime.shutdown_background();
            debug!(model = ?self.model, "I/O runtime shut down");
        }
    }

    fn runtime(&self) -> MutexGuard<'_, Option<Runtime>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("model", &self.model)
            .field("running", &self.is_running())
            .finish()
    }
}
