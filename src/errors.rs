//! Errors produced while establishing and keeping connections.

use thiserror::Error;

/// An error that appeared on a connection level. It either failed an attempt
/// to establish a connection, or broke an established one.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("Connect timeout elapsed")]
    ConnectTimeout,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Connection broken: {0}")]
    Broken(String),

    /// The host speaks an incompatible protocol version or sent a malformed
    /// handshake response. Retrying against the same host cannot help.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The host rejected the configured credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Failed to switch connection to keyspace: {0}")]
    Keyspace(String),

    /// The host started advertising a different shard count than the one the
    /// pool was built for. Buckets cannot be reused; the pool closes.
    #[error("Host changed its shard count from {expected} to {got}")]
    ShardCountChanged { expected: u16, got: u16 },
}

impl ConnectionError {
    /// Whether the error dooms every future connection attempt to this host.
    ///
    /// A critical error makes the pool emit
    /// [`on_pool_critical_error`](crate::ConnectionPoolListener::on_pool_critical_error)
    /// and tear itself down instead of rescheduling the attempt.
    #[inline]
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ConnectionError::Protocol(_)
                | ConnectionError::Authentication(_)
                | ConnectionError::ShardCountChanged { .. }
        )
    }
}
