use std::time::Duration;

/// Tunables for the engine, threaded explicitly rather than read from a
/// global singleton (see SPEC_FULL §9).
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How long an output writer may stay idle before a heartbeat is due.
    pub heartbeat_interval: Duration,
    /// Writer flush-by-size threshold in bytes.
    pub flush_size_bytes: usize,
    /// Writer flush-by-time threshold.
    pub flush_interval: Duration,
    /// Kernel SO_SNDBUF/SO_RCVBUF applied to accepted and dialed sockets, if set.
    pub sndbuf_size: Option<usize>,
    /// Backoff between reconnect attempts for a single dial target.
    pub reconnect_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(60_000),
            flush_size_bytes: 1024,
            flush_interval: Duration::from_millis(50),
            sndbuf_size: None,
            reconnect_interval: Duration::from_millis(10_000),
        }
    }
}
