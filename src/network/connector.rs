use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::trace;

use super::connection::EstablishedConnection;
use crate::errors::ConnectionError;
#[cfg(feature = "metrics")]
use crate::observability::metrics::Metrics;
use crate::routing::shard_port::ShardPortCalculator;
use crate::routing::{Shard, ShardCount};

/// Per-connection settings passed through to the [`Connector`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub tcp_nodelay: bool,
    /// Whether connections are TLS-wrapped. Decides which of the host's
    /// advertised shard-aware ports applies.
    pub tls: bool,
    /// Wire protocol version the connector should negotiate.
    pub protocol_version: u8,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            connect_timeout: Duration::from_secs(5),
            tcp_nodelay: true,
            tls: false,
            protocol_version: 4,
        }
    }
}

/// A single connection attempt, as handed to a [`Connector`].
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Address to connect to. Already points at the host's shard-aware port
    /// when `source_port` is set.
    pub address: SocketAddr,
    /// Local port to bind to, chosen to target a specific shard.
    pub source_port: Option<u16>,
    /// Keyspace the connection should be switched to after the handshake.
    pub keyspace: Option<String>,
    pub settings: ConnectionSettings,
}

/// Establishes connections. The implementation owns everything the pool
/// treats as external: sockets, TLS, the wire handshake and authentication.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<EstablishedConnection, ConnectionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectorCommand {
    Wait,
    ConnectNow,
    Cancel,
}

/// Pool-side handle to a pending [`DelayedConnector`].
pub(crate) struct ConnectorHandle {
    commands: watch::Sender<ConnectorCommand>,
}

impl ConnectorHandle {
    /// Cancels the attempt. The connector still resolves, with
    /// [`ConnectorOutcome::Canceled`], even when caught mid-connect.
    pub(crate) fn cancel(&self) {
        self.commands.send_replace(ConnectorCommand::Cancel);
    }

    /// Skips whatever remains of the delay. A no-op once connecting started
    /// or the attempt got canceled.
    pub(crate) fn attempt_immediate_connect(&self) {
        self.commands.send_if_modified(|command| {
            if *command == ConnectorCommand::Wait {
                *command = ConnectorCommand::ConnectNow;
                true
            } else {
                false
            }
        });
    }
}

pub(crate) type ConnectorId = u64;

/// How a [`DelayedConnector`] resolved. Delivered to the pool exactly once.
#[derive(Debug)]
pub(crate) enum ConnectorOutcome {
    Connected {
        established: EstablishedConnection,
        /// The shard-targeting local port the connection is bound to, if any.
        /// Returned to the [`ShardPortCalculator`] when the connection closes.
        source_port: Option<u16>,
    },
    Failed(ConnectionError),
    Canceled,
}

pub(crate) struct ConnectorFinished {
    pub(crate) id: ConnectorId,
    pub(crate) outcome: ConnectorOutcome,
}

/// Everything needed to aim a connection at one specific shard: connect to
/// the advertised shard-aware port from a local port satisfying
/// `source_port % nr_shards == shard`.
pub(crate) struct ShardTarget {
    pub(crate) shard: Shard,
    pub(crate) nr_shards: ShardCount,
    pub(crate) shard_aware_port: u16,
    pub(crate) calculator: Arc<ShardPortCalculator>,
}

/// Establishes one outbound connection after a delay.
///
/// Owned by the pool worker through its [`ConnectorHandle`]; the connector
/// itself runs as a future polled by the worker and resolves exactly once.
pub(crate) struct DelayedConnector {
    id: ConnectorId,
    connector: Arc<dyn Connector>,
    address: SocketAddr,
    keyspace: Option<String>,
    settings: ConnectionSettings,
    shard_target: Option<ShardTarget>,
    commands: watch::Receiver<ConnectorCommand>,
    #[cfg(feature = "metrics")]
    metrics: Arc<Metrics>,
}

impl DelayedConnector {
    pub(crate) fn new(
        id: ConnectorId,
        connector: Arc<dyn Connector>,
        address: SocketAddr,
        keyspace: Option<String>,
        settings: ConnectionSettings,
        shard_target: Option<ShardTarget>,
        #[cfg(feature = "metrics")] metrics: Arc<Metrics>,
    ) -> (Self, ConnectorHandle) {
        let (command_tx, command_rx) = watch::channel(ConnectorCommand::Wait);
        let connector = DelayedConnector {
            id,
            connector,
            address,
            keyspace,
            settings,
            shard_target,
            commands: command_rx,
            #[cfg(feature = "metrics")]
            metrics,
        };
        let handle = ConnectorHandle {
            commands: command_tx,
        };
        (connector, handle)
    }

    /// Waits out the delay (unless hurried or canceled), then connects.
    pub(crate) async fn delayed_connect(self, delay: Duration) -> ConnectorFinished {
        let id = self.id;
        let outcome = self.run(delay).await;
        ConnectorFinished { id, outcome }
    }

    async fn run(self, delay: Duration) -> ConnectorOutcome {
        let mut commands = self.commands.clone();

        // Delay phase.
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {}
            interrupted = wait_for_interrupt(&mut commands) => match interrupted {
                Interrupt::Cancel => return ConnectorOutcome::Canceled,
                Interrupt::ConnectNow => {
                    trace!("[{}] Skipping remaining reconnect delay", self.address);
                }
            }
        }

        // A shard-targeting local port is claimed before connecting starts,
        // so that it can be released on every non-adopted outcome.
        let source_port = self.shard_target.as_ref().and_then(|target| {
            target
                .calculator
                .calc_outgoing_port_num(target.nr_shards, target.shard)
        });

        // Connect phase, still interruptible by cancellation.
        let connect = self.attempt_connect(source_port);
        tokio::pin!(connect);
        let outcome = tokio::select! {
            result = &mut connect => match result {
                Ok(established) => ConnectorOutcome::Connected {
                    established,
                    source_port,
                },
                Err(error) => ConnectorOutcome::Failed(error),
            },
            _ = wait_for_cancel(&mut commands) => ConnectorOutcome::Canceled,
        };

        if !matches!(outcome, ConnectorOutcome::Connected { .. }) {
            if let (Some(port), Some(target)) = (source_port, self.shard_target.as_ref()) {
                target.calculator.release_port(port);
            }
        }
        outcome
    }

    async fn attempt_connect(
        &self,
        source_port: Option<u16>,
    ) -> Result<EstablishedConnection, ConnectionError> {
        let address = match (&self.shard_target, source_port) {
            (Some(target), Some(_)) => SocketAddr::new(self.address.ip(), target.shard_aware_port),
            // No free port candidate for the shard: plain connect.
            _ => self.address,
        };
        let request = ConnectRequest {
            address,
            source_port,
            keyspace: self.keyspace.clone(),
            settings: self.settings.clone(),
        };

        let result =
            match tokio::time::timeout(self.settings.connect_timeout, self.connector.connect(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::ConnectTimeout),
            };

        #[cfg(feature = "metrics")]
        if matches!(result, Err(ConnectionError::ConnectTimeout)) {
            self.metrics.inc_connection_timeouts();
        }

        result
    }
}

enum Interrupt {
    Cancel,
    ConnectNow,
}

/// Completes when the connector is told to cancel or hurry up. Checks the
/// current value first, so commands sent before the call are not lost.
async fn wait_for_interrupt(commands: &mut watch::Receiver<ConnectorCommand>) -> Interrupt {
    loop {
        match *commands.borrow_and_update() {
            ConnectorCommand::Cancel => return Interrupt::Cancel,
            ConnectorCommand::ConnectNow => return Interrupt::ConnectNow,
            ConnectorCommand::Wait => {}
        }
        if commands.changed().await.is_err() {
            // The pool dropped the handle; nobody wants the result anymore.
            return Interrupt::Cancel;
        }
    }
}

async fn wait_for_cancel(commands: &mut watch::Receiver<ConnectorCommand>) {
    loop {
        if *commands.borrow_and_update() == ConnectorCommand::Cancel {
            return;
        }
        if commands.changed().await.is_err() {
            return;
        }
    }
}
