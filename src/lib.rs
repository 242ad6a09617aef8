//! Shard-aware, per-host connection pool for client drivers of sharded
//! wide-column databases.
//!
//! Hosts of such databases handle their state on a fixed set of shards, one
//! per CPU, and every TCP connection is affine to exactly one shard. A
//! [`ConnectionPool`] keeps a target number of live connections to a single
//! host, spread over its shards, and picks the least busy connection for
//! every outgoing request, preferring the shard that owns the request's
//! partition [`Token`].
//!
//! The pool does not speak the wire protocol itself. Connections are
//! established by a user-supplied [`Connector`] and consumed through the
//! [`Connection`] trait; the pool adds shard placement, least-busy
//! selection, reconnection with backoff (see
//! [`policies::reconnect`]), source-port shard targeting
//! (see [`routing::shard_port`]) and an orderly close protocol on top.
//!
//! # Overview
//!
//! ```ignore
//! use shoal::{ConnectionPool, ConnectionPoolListener, Host, PoolConfig, Token};
//!
//! struct Listener;
//! impl ConnectionPoolListener for Listener {}
//!
//! let pool = ConnectionPool::new(
//!     Host {
//!         address: "198.51.100.7:9042".parse().unwrap(),
//!         sharding: Some(sharding),
//!     },
//!     seeds,
//!     connector,
//!     PoolConfig::default(),
//!     None,
//!     Arc::new(Listener),
//!     None,
//! );
//!
//! // Route a request to the shard owning its partition token.
//! if let Some(conn) = pool.find_least_busy(Some(Token { value: 8093 })) {
//!     // send the request over `conn.connection()`
//! }
//! ```

pub mod errors;
pub mod network;
#[cfg(feature = "metrics")]
pub mod observability;
pub mod policies;
pub mod routing;

#[cfg(test)]
pub(crate) mod test_utils;

pub use errors::ConnectionError;
pub use network::connection::{
    Connection, ErrorReceiver, EstablishedConnection, PooledConnection,
};
pub use network::connection_pool::{
    CloseState, ConnectionPool, ConnectionPoolListener, Host, PoolConfig,
};
pub use network::connector::{ConnectRequest, ConnectionSettings, Connector};
pub use routing::sharding::{ConnectionShardingInfo, ShardingInfo};
pub use routing::{LocalPortRange, Shard, ShardCount, Token};
