use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use itertools::Itertools as _;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace, warn};

use super::connection::{
    ConnId, ConnectionEvent, ErrorReceiver, EstablishedConnection, PooledConnection,
};
use super::connector::{
    ConnectionSettings, Connector, ConnectorFinished, ConnectorHandle, ConnectorId,
    ConnectorOutcome, DelayedConnector, ShardTarget,
};
use crate::errors::ConnectionError;
#[cfg(feature = "metrics")]
use crate::observability::metrics::Metrics;
use crate::policies::reconnect::{
    ExponentialReconnectionPolicy, ReconnectionPolicy, ReconnectionSchedule,
};
use crate::routing::shard_port::ShardPortCalculator;
use crate::routing::sharding::ShardingInfo;
use crate::routing::{Shard, Token};

/// The host a pool maintains connections to. The sharding info, once
/// learned, is fixed for the pool's lifetime.
#[derive(Debug, Clone)]
pub struct Host {
    pub address: SocketAddr,
    pub sharding: Option<ShardingInfo>,
}

/// Configuration of a single per-host pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Total number of connections the pool keeps to the host, spread over
    /// its shards: each shard is topped up to
    /// `target_connections / shard_count`, rounded up.
    pub target_connections: NonZeroUsize,
    pub settings: ConnectionSettings,
    pub reconnection_policy: Arc<dyn ReconnectionPolicy>,
    /// Allows disabling source-port shard targeting even when the host
    /// advertises a shard-aware port (e.g. behind address translation).
    pub can_use_shard_aware_port: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            target_connections: NonZeroUsize::new(2).unwrap(),
            settings: ConnectionSettings::default(),
            reconnection_policy: Arc::new(ExponentialReconnectionPolicy::default()),
            can_use_shard_aware_port: true,
        }
    }
}

/// Receives pool lifecycle events.
///
/// `on_pool_up` and `on_pool_down` are deduplicated and strictly alternate
/// for a pool until a critical error occurs; `on_pool_critical_error` fires
/// at most once; `on_close` is terminal and no callback follows it. Pools
/// are per-host, so callbacks identify the pool by its host address.
pub trait ConnectionPoolListener: Send + Sync {
    /// The pool went from having no usable connection to having one.
    fn on_pool_up(&self, _address: SocketAddr) {}

    /// The pool lost its last usable connection.
    fn on_pool_down(&self, _address: SocketAddr) {}

    /// Reconnecting failed in a way retries cannot fix; the pool is closing.
    fn on_pool_critical_error(&self, _address: SocketAddr, _error: &ConnectionError) {}

    /// A first connection of a batch has buffered writes. The listener is
    /// expected to call [`ConnectionPool::flush`] soon.
    fn on_requires_flush(&self, _address: SocketAddr) {}

    /// The close protocol finished; every connection and pending connector
    /// has been drained.
    fn on_close(&self, _address: SocketAddr) {}
}

/// Close lifecycle of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Open,
    Closing,
    WaitingForConnections,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotifyState {
    New,
    Up,
    Down,
    Critical,
}

type Buckets = Vec<Vec<Arc<PooledConnection>>>;

/// A shard-aware pool of connections to a single host.
///
/// This is a cheap clonable handle; the actual state lives in a worker task
/// that keeps running until the close protocol finishes, even if every
/// handle is dropped. Selection reads a lock-free snapshot and never blocks
/// on the worker.
#[derive(Clone)]
pub struct ConnectionPool {
    host: Host,
    conns: Arc<ArcSwap<Buckets>>,
    commands: mpsc::UnboundedSender<PoolCommand>,
    close_state: watch::Receiver<CloseState>,
}

#[derive(Debug)]
enum PoolCommand {
    Close,
    Flush,
    SetKeyspace(Option<String>),
    AttemptImmediateConnect,
}

impl ConnectionPool {
    /// Creates a pool seeded with already-established connections and spawns
    /// its worker task.
    ///
    /// Seeds are adopted in input order while their shard bucket has room;
    /// surplus and already-closing seeds are closed. Every unfilled slot
    /// gets a reconnect scheduled for it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: Host,
        seed_connections: Vec<EstablishedConnection>,
        connector: Arc<dyn Connector>,
        config: PoolConfig,
        keyspace: Option<String>,
        listener: Arc<dyn ConnectionPoolListener>,
        port_calculator: Option<Arc<ShardPortCalculator>>,
        #[cfg(feature = "metrics")] metrics: Arc<Metrics>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (conn_event_tx, conn_event_rx) = mpsc::unbounded_channel();
        let (close_state_tx, close_state_rx) = watch::channel(CloseState::Open);
        let conns: Arc<ArcSwap<Buckets>> = Arc::new(ArcSwap::from_pointee(Vec::new()));

        let worker = PoolWorker {
            host: host.clone(),
            config,
            connector,
            listener,
            port_calculator,
            keyspace,
            buckets: Vec::new(),
            target_per_shard: 0,
            shared_conns: Arc::clone(&conns),
            pending: HashMap::new(),
            connector_events: FuturesUnordered::new(),
            closed_connections: FuturesUnordered::new(),
            to_flush: HashSet::new(),
            close_state: CloseState::Open,
            notify_state: NotifyState::New,
            commands: command_rx,
            commands_open: true,
            conn_events: conn_event_rx,
            conn_event_tx,
            close_state_tx,
            next_conn_id: 0,
            next_connector_id: 0,
            #[cfg(feature = "metrics")]
            metrics,
        };
        tokio::spawn(worker.run(seed_connections));

        ConnectionPool {
            host,
            conns,
            commands: command_tx,
            close_state: close_state_rx,
        }
    }

    #[inline]
    pub fn address(&self) -> SocketAddr {
        self.host.address
    }

    #[inline]
    pub fn sharding(&self) -> Option<&ShardingInfo> {
        self.host.sharding.as_ref()
    }

    /// Selects the least busy connection for a request.
    ///
    /// With a token (and sharding info known for the host), candidates come
    /// from the bucket of the shard owning the token; when that bucket is
    /// empty or its best connection is already closing, selection degrades
    /// to the whole pool. Without a token it is pool-wide from the start.
    ///
    /// `None` means no usable connection exists right now; callers surface
    /// it as "no host available".
    pub fn find_least_busy(&self, token: Option<Token>) -> Option<Arc<PooledConnection>> {
        let conns = self.conns.load();

        if let (Some(token), Some(sharding)) = (token, self.host.sharding.as_ref()) {
            let shard = sharding.shard_of(token) as usize;
            let best = conns
                .get(shard)
                .and_then(|bucket| bucket.iter().min_by(|a, b| least_busy_cmp(a, b)));
            if let Some(best) = best {
                if !best.is_closing() {
                    return Some(Arc::clone(best));
                }
            }
        }

        conns
            .iter()
            .flatten()
            .filter(|conn| !conn.is_closing())
            .min_by(|a, b| least_busy_cmp(a, b))
            .map(Arc::clone)
    }

    /// Whether any usable connection exists right now.
    pub fn is_up(&self) -> bool {
        self.conns
            .load()
            .iter()
            .flatten()
            .any(|conn| !conn.is_closing())
    }

    /// All connections currently pooled, including ones mid-close.
    pub fn working_connections(&self) -> Vec<Arc<PooledConnection>> {
        self.conns.load().iter().flatten().cloned().collect()
    }

    /// Flushes every connection that reported buffered writes since the last
    /// flush.
    pub fn flush(&self) {
        let _ = self.commands.send(PoolCommand::Flush);
    }

    /// Keyspace that connections established from now on will be switched to.
    pub fn set_keyspace(&self, keyspace: Option<String>) {
        let _ = self.commands.send(PoolCommand::SetKeyspace(keyspace));
    }

    /// Tells every pending reconnect to skip whatever remains of its delay.
    pub fn attempt_immediate_connect(&self) {
        let _ = self.commands.send(PoolCommand::AttemptImmediateConnect);
    }

    /// Initiates the close protocol: every live connection is closed, every
    /// pending connector canceled. Completion is signaled by the listener's
    /// `on_close` and by [`wait_until_closed`](ConnectionPool::wait_until_closed).
    pub fn close(&self) {
        let _ = self.commands.send(PoolCommand::Close);
    }

    #[inline]
    pub fn close_state(&self) -> CloseState {
        *self.close_state.borrow()
    }

    /// Completes once the close protocol has finished.
    pub async fn wait_until_closed(&self) {
        let mut close_state = self.close_state.clone();
        while *close_state.borrow_and_update() != CloseState::Closed {
            if close_state.changed().await.is_err() {
                break;
            }
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("host", &self.host)
            .field("close_state", &self.close_state())
            .finish_non_exhaustive()
    }
}

/// Ordering used by selection: a connection compares smaller when it is
/// "less busy". Closing connections are never less busy than live ones; two
/// live ones compare by inflight request count.
fn least_busy_cmp(a: &Arc<PooledConnection>, b: &Arc<PooledConnection>) -> Ordering {
    match (a.is_closing(), b.is_closing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a
            .inflight_request_count()
            .cmp(&b.inflight_request_count()),
    }
}

/// A reconnect in flight. The schedule lives here between the moments it is
/// pulled for a delay and either dropped (terminal outcome) or moved into
/// the follow-up connector (retry).
struct PendingConnector {
    handle: ConnectorHandle,
    schedule: Box<dyn ReconnectionSchedule>,
    desired_shard: Option<Shard>,
}

struct ClosedConnection {
    id: ConnId,
    shard: Shard,
    source_port: Option<u16>,
    error: Option<ConnectionError>,
}

async fn wait_for_close(
    id: ConnId,
    shard: Shard,
    source_port: Option<u16>,
    error_receiver: ErrorReceiver,
) -> ClosedConnection {
    // A dropped sender is a clean close.
    let error = error_receiver.await.ok();
    ClosedConnection {
        id,
        shard,
        source_port,
        error,
    }
}

struct PoolWorker {
    host: Host,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    listener: Arc<dyn ConnectionPoolListener>,
    port_calculator: Option<Arc<ShardPortCalculator>>,
    keyspace: Option<String>,

    buckets: Buckets,
    target_per_shard: usize,
    shared_conns: Arc<ArcSwap<Buckets>>,

    pending: HashMap<ConnectorId, PendingConnector>,
    connector_events: FuturesUnordered<BoxFuture<'static, ConnectorFinished>>,
    closed_connections: FuturesUnordered<BoxFuture<'static, ClosedConnection>>,

    to_flush: HashSet<ConnId>,
    close_state: CloseState,
    notify_state: NotifyState,

    commands: mpsc::UnboundedReceiver<PoolCommand>,
    commands_open: bool,
    conn_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    // Handed to every adopted connection; also keeps `conn_events` from
    // yielding `None`.
    conn_event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    close_state_tx: watch::Sender<CloseState>,

    next_conn_id: ConnId,
    next_connector_id: ConnectorId,
    #[cfg(feature = "metrics")]
    metrics: Arc<Metrics>,
}

impl PoolWorker {
    async fn run(mut self, seed_connections: Vec<EstablishedConnection>) {
        debug!("[{}] Started pool worker", self.host.address);
        self.initialize(seed_connections);

        while self.close_state != CloseState::Closed {
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        // Every handle is gone; nothing can use the pool
                        // anymore, so tear it down.
                        trace!(
                            "[{}] All pool handles dropped, closing",
                            self.host.address
                        );
                        self.commands_open = false;
                        self.internal_close();
                    }
                },
                Some(event) = self.conn_events.recv() => self.handle_connection_event(event),
                finished = self.connector_events.select_next_some(),
                        if !self.connector_events.is_empty() => {
                    self.on_connector_finished(finished);
                }
                closed = self.closed_connections.select_next_some(),
                        if !self.closed_connections.is_empty() => {
                    self.on_connection_closed(closed);
                }
            }
            trace!(pool_state = ?BucketsDebug(&self.buckets));
        }

        debug!("[{}] Pool worker stopped", self.host.address);
    }

    fn initialize(&mut self, seed_connections: Vec<EstablishedConnection>) {
        let shard_count = self
            .host
            .sharding
            .as_ref()
            .map_or(1, |sharding| sharding.nr_shards.get() as usize);
        self.buckets = vec![Vec::new(); shard_count];
        self.target_per_shard = self
            .config
            .target_connections
            .get()
            .div_ceil(shard_count);

        for established in seed_connections {
            if established.connection.is_closing() {
                continue;
            }
            let shard = established
                .sharding
                .as_ref()
                .map_or(0, |sharding| sharding.shard as usize);
            if shard < self.buckets.len() && self.buckets[shard].len() < self.target_per_shard {
                self.add_connection(established, None);
            } else {
                established.connection.close();
            }
        }
        self.update_shared_conns();
        self.notify_up_or_down();

        for shard in 0..self.buckets.len() {
            let deficit = self.target_per_shard - self.buckets[shard].len();
            for _ in 0..deficit {
                self.schedule_reconnect(None, Some(shard as Shard));
            }
        }
    }

    fn handle_command(&mut self, command: PoolCommand) {
        match command {
            PoolCommand::Close => self.internal_close(),
            PoolCommand::Flush => self.flush_pending(),
            PoolCommand::SetKeyspace(keyspace) => self.keyspace = keyspace,
            PoolCommand::AttemptImmediateConnect => {
                for pending in self.pending.values() {
                    pending.handle.attempt_immediate_connect();
                }
            }
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::RequiresFlush(id) => {
                if self.to_flush.is_empty() {
                    self.listener.on_requires_flush(self.host.address);
                }
                self.to_flush.insert(id);
            }
        }
    }

    fn flush_pending(&mut self) {
        let to_flush = std::mem::take(&mut self.to_flush);
        for id in to_flush {
            if let Some(conn) = self.buckets.iter().flatten().find(|conn| conn.id() == id) {
                conn.flush();
            }
        }
    }

    fn has_connections(&self) -> bool {
        self.buckets.iter().any(|bucket| !bucket.is_empty())
    }

    fn update_shared_conns(&mut self) {
        self.shared_conns.store(Arc::new(self.buckets.clone()));
    }

    fn add_connection(&mut self, established: EstablishedConnection, source_port: Option<u16>) {
        let EstablishedConnection {
            connection,
            error_receiver,
            sharding,
        } = established;
        let shard = sharding.map_or(0, |sharding| sharding.shard);

        let id = self.next_conn_id;
        self.next_conn_id += 1;

        #[cfg(feature = "metrics")]
        self.metrics.inc_total_connections();

        let pooled = Arc::new(PooledConnection::new(
            id,
            connection,
            shard,
            self.conn_event_tx.clone(),
        ));
        self.closed_connections
            .push(wait_for_close(id, shard, source_port, error_receiver).boxed());
        self.buckets[shard as usize].push(pooled);

        debug!(
            "[{}] Added connection to shard {}, now {} for the shard, {} total",
            self.host.address,
            shard,
            self.buckets[shard as usize].len(),
            self.active_connection_count(),
        );
        self.update_shared_conns();
    }

    fn active_connection_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Exactly-once notification that a pooled connection is gone, driven by
    /// its error receiver.
    fn on_connection_closed(&mut self, closed: ClosedConnection) {
        let ClosedConnection {
            id,
            shard,
            source_port,
            error,
        } = closed;

        if let (Some(port), Some(calculator)) = (source_port, &self.port_calculator) {
            calculator.release_port(port);
        }

        let bucket = &mut self.buckets[shard as usize];
        if let Some(idx) = bucket.iter().position(|conn| conn.id() == id) {
            bucket.remove(idx);
            #[cfg(feature = "metrics")]
            self.metrics.dec_total_connections();
            match error {
                Some(error) => debug!(
                    "[{}] Connection to shard {} broken: {}",
                    self.host.address, shard, error
                ),
                None => trace!(
                    "[{}] Connection to shard {} closed",
                    self.host.address,
                    shard
                ),
            }
        }
        self.to_flush.remove(&id);
        self.update_shared_conns();

        if self.close_state != CloseState::Open {
            self.maybe_closed();
            return;
        }

        // Losing the last connection flips the pool down.
        self.notify_up_or_down();
        // Refill the slot of the shard that just lost a connection.
        self.schedule_reconnect(None, Some(shard));
    }

    fn schedule_reconnect(
        &mut self,
        schedule: Option<Box<dyn ReconnectionSchedule>>,
        desired_shard: Option<Shard>,
    ) {
        if self.close_state != CloseState::Open {
            return;
        }

        // A fresh schedule for a new slot; retries of the same slot carry
        // theirs over so backoff keeps progressing.
        let mut schedule = schedule
            .unwrap_or_else(|| self.config.reconnection_policy.new_schedule());
        let delay = schedule.next_delay();

        let shard_target = desired_shard.and_then(|shard| self.shard_target(shard));

        let id = self.next_connector_id;
        self.next_connector_id += 1;

        let (connector, handle) = DelayedConnector::new(
            id,
            Arc::clone(&self.connector),
            self.host.address,
            self.keyspace.clone(),
            self.config.settings.clone(),
            shard_target,
            #[cfg(feature = "metrics")]
            Arc::clone(&self.metrics),
        );

        debug!(
            "[{}] Scheduling {} reconnect in {} ms (desired shard: {:?})",
            self.host.address,
            self.config.reconnection_policy.name(),
            delay.as_millis(),
            desired_shard,
        );

        self.pending.insert(
            id,
            PendingConnector {
                handle,
                schedule,
                desired_shard,
            },
        );
        self.connector_events
            .push(connector.delayed_connect(delay).boxed());
    }

    /// Source-port targeting parameters for a shard, when the host
    /// advertises the applicable shard-aware port and a calculator is
    /// configured. `None` degrades the reconnect to a plain connect.
    fn shard_target(&self, shard: Shard) -> Option<ShardTarget> {
        if !self.config.can_use_shard_aware_port {
            return None;
        }
        let sharding = self.host.sharding.as_ref()?;
        let shard_aware_port = sharding.shard_aware_port(self.config.settings.tls)?;
        let calculator = self.port_calculator.clone()?;
        Some(ShardTarget {
            shard,
            nr_shards: sharding.nr_shards,
            shard_aware_port,
            calculator,
        })
    }

    fn on_connector_finished(&mut self, finished: ConnectorFinished) {
        let ConnectorFinished { id, outcome } = finished;
        // A connector always has its schedule registered for as long as it
        // may still resolve.
        let PendingConnector {
            schedule,
            desired_shard,
            ..
        } = self
            .pending
            .remove(&id)
            .expect("connector finished without a registered reconnection schedule");

        if self.close_state != CloseState::Open {
            if let ConnectorOutcome::Connected {
                established,
                source_port,
            } = outcome
            {
                // The pool is going away; the fresh connection is surplus.
                established.connection.close();
                self.release_source_port(source_port);
            }
            self.maybe_closed();
            return;
        }

        match outcome {
            ConnectorOutcome::Connected {
                established,
                source_port,
            } => {
                if let Err(error) = self.check_shard_count(&established) {
                    established.connection.close();
                    self.release_source_port(source_port);
                    error!(
                        "[{}] Closing connection pool: {}",
                        self.host.address, error
                    );
                    self.notify_critical_error(&error);
                    self.internal_close();
                    return;
                }

                let shard = established
                    .sharding
                    .as_ref()
                    .map_or(0, |sharding| sharding.shard as usize);
                if shard < self.buckets.len()
                    && self.buckets[shard].len() < self.target_per_shard
                {
                    self.add_connection(established, source_port);
                    self.notify_up_or_down();
                } else {
                    // The host routed us to a shard whose bucket is already
                    // full (or out of range). Keep the backoff progressing
                    // and try the same slot again.
                    debug!(
                        "[{}] Reconnection landed on shard {}, reconnecting again",
                        self.host.address, shard
                    );
                    established.connection.close();
                    self.release_source_port(source_port);
                    self.schedule_reconnect(Some(schedule), desired_shard);
                }
            }
            ConnectorOutcome::Failed(error) => {
                if error.is_critical() {
                    error!(
                        "[{}] Closing connection pool because of the following error: {}",
                        self.host.address, error
                    );
                    self.notify_critical_error(&error);
                    self.internal_close();
                } else {
                    warn!(
                        "[{}] Failed to reconnect: {}",
                        self.host.address, error
                    );
                    self.schedule_reconnect(Some(schedule), desired_shard);
                }
            }
            // Cancellation only happens on a closing pool, which is handled
            // above; a canceled connector simply drains.
            ConnectorOutcome::Canceled => {}
        }
    }

    fn release_source_port(&self, source_port: Option<u16>) {
        if let (Some(port), Some(calculator)) = (source_port, &self.port_calculator) {
            calculator.release_port(port);
        }
    }

    fn check_shard_count(
        &self,
        established: &EstablishedConnection,
    ) -> Result<(), ConnectionError> {
        let (Some(pool_sharding), Some(conn_sharding)) =
            (self.host.sharding.as_ref(), established.sharding.as_ref())
        else {
            return Ok(());
        };
        let expected = pool_sharding.nr_shards.get();
        let got = conn_sharding.sharding.nr_shards.get();
        if expected != got {
            return Err(ConnectionError::ShardCountChanged { expected, got });
        }
        Ok(())
    }

    fn notify_up_or_down(&mut self) {
        let has_connections = self.has_connections();
        match self.notify_state {
            NotifyState::New | NotifyState::Up if !has_connections => {
                self.notify_state = NotifyState::Down;
                self.listener.on_pool_down(self.host.address);
            }
            NotifyState::New | NotifyState::Down if has_connections => {
                self.notify_state = NotifyState::Up;
                self.listener.on_pool_up(self.host.address);
            }
            _ => {}
        }
    }

    fn notify_critical_error(&mut self, error: &ConnectionError) {
        if self.notify_state != NotifyState::Critical {
            self.notify_state = NotifyState::Critical;
            self.listener
                .on_pool_critical_error(self.host.address, error);
        }
    }

    fn internal_close(&mut self) {
        if self.close_state != CloseState::Open {
            return;
        }
        debug!("[{}] Closing connection pool", self.host.address);
        self.set_close_state(CloseState::Closing);

        // Snapshot, so that close acknowledgements arriving while iterating
        // cannot invalidate what is being iterated.
        let connections: Vec<_> = self.buckets.iter().flatten().cloned().collect();
        for connection in connections {
            connection.close();
        }
        for pending in self.pending.values() {
            pending.handle.cancel();
        }

        self.set_close_state(CloseState::WaitingForConnections);
        self.maybe_closed();
    }

    /// Finishes the close protocol once every connection acknowledged its
    /// close and every pending connector resolved.
    fn maybe_closed(&mut self) {
        if self.close_state == CloseState::WaitingForConnections
            && !self.has_connections()
            && self.pending.is_empty()
        {
            self.set_close_state(CloseState::Closed);
            // Only mark DOWN if it's UP, otherwise multiple DOWN events
            // could be observed while the pool connects.
            if self.notify_state == NotifyState::Up {
                self.listener.on_pool_down(self.host.address);
            }
            self.listener.on_close(self.host.address);
        }
    }

    fn set_close_state(&mut self, state: CloseState) {
        self.close_state = state;
        let _ = self.close_state_tx.send(state);
    }
}

struct BucketsDebug<'a>(&'a Buckets);

impl fmt::Debug for BucketsDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .iter()
                .enumerate()
                .map(|(shard, bucket)| format!("{}:{}", shard, bucket.len()))
                .join(" "),
        )
    }
}
