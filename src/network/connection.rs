use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::errors::ConnectionError;
use crate::routing::sharding::ConnectionShardingInfo;
use crate::routing::Shard;

/// Resolved exactly once, when the underlying connection breaks or finishes
/// closing. A dropped sender counts as a clean close.
pub type ErrorReceiver = oneshot::Receiver<ConnectionError>;

/// A live, already-handshaked connection to a single host.
///
/// The pool does not perform any I/O itself; everything below the request
/// level (framing, authentication, TLS, the socket) lives behind this trait
/// and the [`Connector`](crate::Connector) that produces it.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Address the connection was established to.
    fn connect_address(&self) -> SocketAddr;

    /// Number of requests sent on this connection still awaiting a response.
    fn inflight_request_count(&self) -> usize;

    /// Whether the connection started closing and can no longer be used.
    fn is_closing(&self) -> bool;

    /// Initiates close. The [`ErrorReceiver`] handed out alongside this
    /// connection resolves once closing finishes.
    fn close(&self);

    /// Writes out requests buffered on the connection.
    fn flush(&self);
}

/// The bundle a [`Connector`](crate::Connector) returns for a freshly
/// established connection.
pub struct EstablishedConnection {
    pub connection: Arc<dyn Connection>,
    /// Resolves when `connection` breaks or finishes closing.
    pub error_receiver: ErrorReceiver,
    /// Sharding learned during the handshake, if the host shards its state.
    pub sharding: Option<ConnectionShardingInfo>,
}

impl fmt::Debug for EstablishedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishedConnection")
            .field("connection", &self.connection)
            .field("sharding", &self.sharding)
            .finish_non_exhaustive()
    }
}

pub(crate) type ConnId = u64;

/// Events a [`PooledConnection`] sends back into its pool's worker.
#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    RequiresFlush(ConnId),
}

/// A connection adopted by a pool.
///
/// The shard is learned at handshake and fixed for the connection's
/// lifetime. Closing is latched: once [`close`](PooledConnection::close) is
/// called the connection never reports itself usable again, and the pool is
/// notified of the closure exactly once through the error receiver.
pub struct PooledConnection {
    id: ConnId,
    conn: Arc<dyn Connection>,
    shard: Shard,
    closing: AtomicBool,
    pool_events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl PooledConnection {
    pub(crate) fn new(
        id: ConnId,
        conn: Arc<dyn Connection>,
        shard: Shard,
        pool_events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        PooledConnection {
            id,
            conn,
            shard,
            closing: AtomicBool::new(false),
            pool_events,
        }
    }

    pub(crate) fn id(&self) -> ConnId {
        self.id
    }

    /// The shard this connection is affine to. 0 on non-sharded hosts.
    #[inline]
    pub fn shard(&self) -> Shard {
        self.shard
    }

    #[inline]
    pub fn connect_address(&self) -> SocketAddr {
        self.conn.connect_address()
    }

    #[inline]
    pub fn inflight_request_count(&self) -> usize {
        self.conn.inflight_request_count()
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Relaxed) || self.conn.is_closing()
    }

    /// Initiates close of the underlying connection. Idempotent.
    pub fn close(&self) {
        if !self.closing.swap(true, Ordering::Relaxed) {
            self.conn.close();
        }
    }

    /// Writes out requests buffered on the underlying connection.
    #[inline]
    pub fn flush(&self) {
        self.conn.flush();
    }

    /// Tells the pool this connection has buffered writes.
    ///
    /// The pool batches these signals: the listener's `on_requires_flush`
    /// fires for the first pending connection per batch, and a later
    /// [`ConnectionPool::flush`](crate::ConnectionPool::flush) flushes the
    /// whole batch.
    pub fn request_flush(&self) {
        let _ = self
            .pool_events
            .send(ConnectionEvent::RequiresFlush(self.id));
    }

    /// Access to the underlying connection, for sending requests.
    #[inline]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("shard", &self.shard)
            .field("inflight", &self.inflight_request_count())
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}
