use std::sync::atomic::{AtomicU64, Ordering};

const ORDER_TYPE: Ordering = Ordering::Relaxed;

/// Counters maintained by connection pools. One instance is usually shared
/// by every pool of a cluster.
#[derive(Default, Debug)]
pub struct Metrics {
    total_connections: AtomicU64,
    connection_timeouts: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    /// Increments the number of currently open pooled connections.
    pub(crate) fn inc_total_connections(&self) {
        self.total_connections.fetch_add(1, ORDER_TYPE);
    }

    /// Decrements the number of currently open pooled connections.
    pub(crate) fn dec_total_connections(&self) {
        self.total_connections.fetch_sub(1, ORDER_TYPE);
    }

    /// Increments counter for connection attempts that timed out.
    pub(crate) fn inc_connection_timeouts(&self) {
        self.connection_timeouts.fetch_add(1, ORDER_TYPE);
    }

    /// Returns the number of currently open pooled connections.
    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(ORDER_TYPE)
    }

    /// Returns the number of connection attempts that timed out.
    pub fn get_connection_timeouts(&self) -> u64 {
        self.connection_timeouts.load(ORDER_TYPE)
    }
}
