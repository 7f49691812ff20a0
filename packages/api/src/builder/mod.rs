//! Fluent transport builder
//!
//! Every [`Config`](transit_client::Config) field has a setter here; the
//! execution model is carried in the type so `build()` returns the matching
//! bundle.

pub mod core;
pub mod pool;
pub mod requests;
pub mod state_types;

pub use self::core::TransportBuilder;
pub use state_types::{Blocking, NonBlocking};
