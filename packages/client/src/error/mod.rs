pub mod classification;
pub mod constructors;
pub mod types;

// Re-export main types and constructors
pub use constructors::*;
pub use types::{ConfigError, Error, Inner, Kind, PoolError, Result};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
