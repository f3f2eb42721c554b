//! In-memory transport backed by Tokio channels.
//!
//! A [`ChannelPeer`] is the half a session polls; its [`PeerDriver`] is the
//! "I/O side" that injects events and observes the commands the session
//! issued. Both halves are `Send`, so the driver may live on another thread.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::{
    ConnectionId, DeliveryMethod, TransportError, TransportEvent, TransportPeer,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A command the session issued to its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    Approve {
        connection: ConnectionId,
        payload: Vec<u8>,
    },
    Deny {
        connection: ConnectionId,
        reason: String,
    },
    Send {
        connection: ConnectionId,
        data: Vec<u8>,
        method: DeliveryMethod,
    },
    Disconnect {
        connection: ConnectionId,
        reason: String,
    },
    SendUnconnected {
        to: SocketAddr,
        data: Vec<u8>,
    },
}

/// The session-facing half of an in-memory transport.
pub struct ChannelPeer {
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::UnboundedSender<PeerCommand>,
    /// Connections this peer denied or disconnected.
    closed: HashSet<ConnectionId>,
}

impl ChannelPeer {
    /// Creates a connected peer/driver pair bound to `local_addr`.
    pub fn pair(local_addr: SocketAddr) -> (ChannelPeer, PeerDriver) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let peer = ChannelPeer {
            local_addr,
            events: event_rx,
            commands: command_tx,
            closed: HashSet::new(),
        };
        let driver = PeerDriver {
            events: event_tx,
            commands: command_rx,
        };
        tracing::debug!(%local_addr, "channel peer created");
        (peer, driver)
    }

    fn issue(&mut self, command: PeerCommand) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Shutdown)
    }

    fn ensure_open(&self, connection: ConnectionId) -> Result<(), TransportError> {
        if self.closed.contains(&connection) {
            return Err(TransportError::UnknownConnection(connection));
        }
        Ok(())
    }
}

impl TransportPeer for ChannelPeer {
    fn poll(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    fn approve(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.ensure_open(connection)?;
        self.issue(PeerCommand::Approve {
            connection,
            payload: payload.to_vec(),
        })
    }

    fn deny(
        &mut self,
        connection: ConnectionId,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open(connection)?;
        self.closed.insert(connection);
        self.issue(PeerCommand::Deny {
            connection,
            reason: reason.to_string(),
        })
    }

    fn send(
        &mut self,
        connection: ConnectionId,
        data: &[u8],
        method: DeliveryMethod,
    ) -> Result<(), TransportError> {
        self.ensure_open(connection)?;
        self.issue(PeerCommand::Send {
            connection,
            data: data.to_vec(),
            method,
        })
    }

    fn disconnect(
        &mut self,
        connection: ConnectionId,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open(connection)?;
        self.closed.insert(connection);
        self.issue(PeerCommand::Disconnect {
            connection,
            reason: reason.to_string(),
        })
    }

    fn send_unconnected(
        &mut self,
        to: SocketAddr,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.issue(PeerCommand::SendUnconnected {
            to,
            data: data.to_vec(),
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// The I/O-facing half of an in-memory transport.
pub struct PeerDriver {
    events: mpsc::UnboundedSender<TransportEvent>,
    commands: mpsc::UnboundedReceiver<PeerCommand>,
}

impl PeerDriver {
    /// Hands out a fresh, process-unique connection id.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Queues an event for the peer's next poll.
    pub fn push(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.events.send(event).map_err(|_| TransportError::Shutdown)
    }

    /// Takes the oldest command the peer issued, if any.
    pub fn try_command(&mut self) -> Option<PeerCommand> {
        self.commands.try_recv().ok()
    }

    /// Takes every command issued so far.
    pub fn drain_commands(&mut self) -> Vec<PeerCommand> {
        let mut out = Vec::new();
        while let Some(cmd) = self.try_command() {
            out.push(cmd);
        }
        out
    }
}
