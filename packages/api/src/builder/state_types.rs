//! State types for the `TransportBuilder` typestate pattern
//!
//! The marker fixes the execution model at compile time, so a builder
//! started with `Transit::blocking()` can only produce a blocking bundle.

use transit_client::ExecutionModel;

/// Builder produces a bundle whose client blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

/// Builder produces a bundle whose client runs requests on its own I/O runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct NonBlocking;

/// Execution model selected by a state marker
pub trait Model {
    const MODEL: ExecutionModel;
}

impl Model for Blocking {
    const MODEL: ExecutionModel = ExecutionModel::Sync;
}

impl Model for NonBlocking {
    const MODEL: ExecutionModel = ExecutionModel::Async;
}
