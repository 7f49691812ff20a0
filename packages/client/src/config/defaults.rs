//! Default values for [`Config`](super::Config)

use std::time::Duration;

/// Common configuration defaults
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const MAX_CONNECTIONS_TOTAL: usize = 200;
    pub const MAX_CONNECTIONS_PER_ROUTE: usize = 20;
    pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
    pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(60);
    pub const MAX_REDIRECTS: usize = 10;
    pub const IO_THREADS: usize = 2;
    pub const POOL_WAIT_CAP: Duration = Duration::from_secs(60);
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
    pub const IDLE_TTL: Duration = Duration::from_secs(30);
    pub const MAX_CONNECTION_AGE: Duration = Duration::from_secs(300);
    pub const USER_AGENT: &'static str = concat!("transit/", env!("CARGO_PKG_VERSION"));
}
