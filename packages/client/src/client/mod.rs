//! Client handles
//!
//! Both execution models share one [`ClientCore`](core::ClientCore): the
//! pool, the connector, the request pipeline and the I/O engine. They differ
//! only in who drives the I/O. [`BlockingClient`] runs each exchange on the
//! calling thread; [`AsyncClient`] hands the whole request to the engine's
//! worker threads so the caller's executor never touches a socket.

mod blocking;
pub(crate) mod core;
pub mod engine;
mod non_blocking;
pub(crate) mod pipeline;

pub use blocking::BlockingClient;
pub use engine::Engine;
pub use non_blocking::AsyncClient;

use crate::telemetry::ClientStatsSnapshot;

/// Lifecycle surface a [`ClientBundle`](crate::ClientBundle) needs from its client.
pub trait ClientHandle: Send + Sync + 'static {
    /// Refuse new requests and stop the I/O engine. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn stats(&self) -> ClientStatsSnapshot;
}
