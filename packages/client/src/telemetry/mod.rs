//! Request and connection counters kept by each client

pub mod client_stats;

pub use client_stats::{ClientStats, ClientStatsSnapshot};
