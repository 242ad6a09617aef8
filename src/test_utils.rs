//! Shared helpers for unit tests: a scriptable connector, mock connections
//! and a listener that records every callback.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::errors::ConnectionError;
use crate::network::connection::{Connection, EstablishedConnection};
use crate::network::connection_pool::ConnectionPoolListener;
use crate::network::connector::{ConnectRequest, Connector};
use crate::routing::sharding::{ConnectionShardingInfo, ShardingInfo};
use crate::routing::Shard;

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

#[derive(Debug)]
pub(crate) struct MockConnection {
    address: SocketAddr,
    inflight: AtomicUsize,
    closing: AtomicBool,
    close_sender: Mutex<Option<oneshot::Sender<ConnectionError>>>,
    flushes: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn established(
        address: SocketAddr,
        sharding: Option<ConnectionShardingInfo>,
    ) -> (Arc<MockConnection>, EstablishedConnection) {
        let (close_tx, close_rx) = oneshot::channel();
        let conn = Arc::new(MockConnection {
            address,
            inflight: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            close_sender: Mutex::new(Some(close_tx)),
            flushes: AtomicUsize::new(0),
        });
        let established = EstablishedConnection {
            connection: Arc::clone(&conn) as Arc<dyn Connection>,
            error_receiver: close_rx,
            sharding,
        };
        (conn, established)
    }

    pub(crate) fn set_inflight(&self, count: usize) {
        self.inflight.store(count, Ordering::Relaxed);
    }

    /// Marks the connection closing without notifying the pool, as if close
    /// started but has not finished yet.
    pub(crate) fn set_closing_silently(&self) {
        self.closing.store(true, Ordering::Relaxed);
    }

    /// Simulates the connection breaking on its own.
    pub(crate) fn break_with(&self, error: ConnectionError) {
        self.closing.store(true, Ordering::Relaxed);
        if let Some(sender) = self.close_sender.lock().unwrap().take() {
            let _ = sender.send(error);
        }
    }

    pub(crate) fn was_closed(&self) -> bool {
        self.closing.load(Ordering::Relaxed)
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl Connection for MockConnection {
    fn connect_address(&self) -> SocketAddr {
        self.address
    }

    fn inflight_request_count(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.closing.store(true, Ordering::Relaxed);
        // Dropping the sender resolves the error receiver as a clean close.
        drop(self.close_sender.lock().unwrap().take());
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub(crate) enum ConnectAction {
    /// Connect successfully. With `shard` set, the handshake reports that
    /// shard; otherwise it reports the shard implied by the bound source
    /// port, or 0.
    Connect { shard: Option<Shard> },
    Fail(ConnectionError),
    /// Never resolves; only a timeout or cancellation gets past it.
    Hang,
}

/// A [`Connector`] following a scripted sequence of outcomes. Records every
/// request (with its paused-clock arrival time) and every connection handed
/// out. An exhausted script keeps connecting to the requested shard.
pub(crate) struct ScriptedConnector {
    sharding: Option<ShardingInfo>,
    script: Mutex<VecDeque<ConnectAction>>,
    requests: Mutex<Vec<(ConnectRequest, tokio::time::Instant)>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl ScriptedConnector {
    pub(crate) fn new(sharding: Option<ShardingInfo>) -> Self {
        ScriptedConnector {
            sharding,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_action(&self, action: ConnectAction) {
        self.script.lock().unwrap().push_back(action);
    }

    pub(crate) fn requests(&self) -> Vec<ConnectRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub(crate) fn request_times(&self) -> Vec<tokio::time::Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, instant)| *instant)
            .collect()
    }

    pub(crate) fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().unwrap().clone()
    }

    fn establish(
        &self,
        request: &ConnectRequest,
        shard_override: Option<Shard>,
    ) -> EstablishedConnection {
        let sharding = self.sharding.as_ref().map(|sharding| {
            let shard = shard_override.unwrap_or_else(|| match request.source_port {
                Some(port) => (port % sharding.nr_shards.get()) as Shard,
                None => 0,
            });
            ConnectionShardingInfo {
                shard,
                sharding: sharding.clone(),
            }
        });
        let (conn, established) = MockConnection::established(request.address, sharding);
        self.connections.lock().unwrap().push(conn);
        established
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<EstablishedConnection, ConnectionError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), tokio::time::Instant::now()));
        let action = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectAction::Connect { shard: None });
        match action {
            ConnectAction::Connect { shard } => Ok(self.establish(&request, shard)),
            ConnectAction::Fail(error) => Err(error),
            ConnectAction::Hang => {
                futures::future::pending::<Result<EstablishedConnection, ConnectionError>>().await
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ListenerEvent {
    Up,
    Down,
    CriticalError(String),
    RequiresFlush,
    Close,
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Self {
        RecordingListener::default()
    }

    pub(crate) fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ConnectionPoolListener for RecordingListener {
    fn on_pool_up(&self, _address: SocketAddr) {
        self.events.lock().unwrap().push(ListenerEvent::Up);
    }

    fn on_pool_down(&self, _address: SocketAddr) {
        self.events.lock().unwrap().push(ListenerEvent::Down);
    }

    fn on_pool_critical_error(&self, _address: SocketAddr, error: &ConnectionError) {
        self.events
            .lock()
            .unwrap()
            .push(ListenerEvent::CriticalError(error.to_string()));
    }

    fn on_requires_flush(&self, _address: SocketAddr) {
        self.events.lock().unwrap().push(ListenerEvent::RequiresFlush);
    }

    fn on_close(&self, _address: SocketAddr) {
        self.events.lock().unwrap().push(ListenerEvent::Close);
    }
}
