//! Transport abstraction layer for netlobby.
//!
//! Provides the [`TransportPeer`] trait: a poll-based peer that surfaces
//! connection approval requests, status changes, application data and
//! out-of-band (unconnected) datagrams, and accepts approve/deny/send
//! commands back. The socket, reliability and NAT layers live behind it.
//!
//! # Feature Flags
//!
//! - `channel` (default): in-memory [`ChannelPeer`] driven by a
//!   [`PeerDriver`], used for tests and local demos.

mod error;
#[cfg(feature = "channel")]
mod channel;

pub use error::TransportError;
#[cfg(feature = "channel")]
pub use channel::{ChannelPeer, PeerCommand, PeerDriver};

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The delivery guarantee a message was sent or received with.
///
/// Higher layers use this to tell ordered/reliable traffic apart from
/// best-effort traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryMethod {
    /// May be lost, duplicated or reordered.
    Unreliable,
    /// May be lost; late packets are dropped instead of reordered.
    UnreliableSequenced,
    /// Never lost, may arrive out of order.
    ReliableUnordered,
    /// Never lost; late packets are dropped in favour of newer ones.
    ReliableSequenced,
    /// Never lost, always in order.
    #[default]
    ReliableOrdered,
}

impl DeliveryMethod {
    /// Returns `true` if the transport retransmits lost packets.
    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Self::ReliableUnordered | Self::ReliableSequenced | Self::ReliableOrdered
        )
    }

    /// Returns `true` if packets are delivered in send order.
    pub fn is_ordered(self) -> bool {
        matches!(self, Self::ReliableOrdered)
    }
}

/// Connection status reported in a status-changed event.
///
/// The numeric value is the first byte of the status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    None,
    InitiatedConnect,
    ReceivedInitiation,
    RespondedAwaitingApproval,
    RespondedConnect,
    Connected,
    Disconnecting,
    Disconnected,
}

impl ConnectionStatus {
    /// Wire byte for this status.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::InitiatedConnect => 1,
            Self::ReceivedInitiation => 2,
            Self::RespondedAwaitingApproval => 3,
            Self::RespondedConnect => 4,
            Self::Connected => 5,
            Self::Disconnecting => 6,
            Self::Disconnected => 7,
        }
    }

    /// Parses a wire byte. Returns `None` for unknown codes.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::InitiatedConnect,
            2 => Self::ReceivedInitiation,
            3 => Self::RespondedAwaitingApproval,
            4 => Self::RespondedConnect,
            5 => Self::Connected,
            6 => Self::Disconnecting,
            7 => Self::Disconnected,
            _ => return None,
        })
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Severity of a transport diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Verbose,
    Debug,
    Warning,
    Error,
}

/// One event surfaced by [`TransportPeer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A LAN discovery probe from `from`.
    DiscoveryRequest { from: SocketAddr },

    /// A remote peer asks to connect. `hail` is the payload it attached.
    ConnectionApproval {
        connection: ConnectionId,
        hail: Vec<u8>,
    },

    /// A connection changed status. `payload` is a status byte followed by
    /// an optional UTF-8 reason string. `connection` is `None` when the
    /// transport could not attribute the change to a connection.
    StatusChanged {
        connection: Option<ConnectionId>,
        payload: Vec<u8>,
    },

    /// Application data on an established connection.
    Data {
        connection: ConnectionId,
        method: DeliveryMethod,
        data: Vec<u8>,
    },

    /// An out-of-band datagram from an unconnected sender.
    UnconnectedData { from: SocketAddr, data: Vec<u8> },

    /// Fresh round-trip measurement for a connection.
    LatencyUpdated {
        connection: ConnectionId,
        round_trip: Duration,
    },

    /// Diagnostic output from the transport itself.
    Log { level: LogLevel, text: String },
}

/// A peer that surfaces transport events by polling and accepts commands.
///
/// Implementations may run their own I/O thread, but must hand completed
/// events over so that [`poll`](Self::poll) never blocks.
pub trait TransportPeer: Send + 'static {
    /// Returns the next queued event, or `None` if nothing is pending.
    fn poll(&mut self) -> Option<TransportEvent>;

    /// Returns a processed event's buffers to the transport.
    fn recycle(&mut self, _event: TransportEvent) {}

    /// Accepts a pending connection, attaching `payload` to the approval.
    fn approve(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Rejects a pending connection with a human-readable reason.
    fn deny(
        &mut self,
        connection: ConnectionId,
        reason: &str,
    ) -> Result<(), TransportError>;

    /// Sends data on an established connection.
    fn send(
        &mut self,
        connection: ConnectionId,
        data: &[u8],
        method: DeliveryMethod,
    ) -> Result<(), TransportError>;

    /// Closes a connection, communicating `reason` to the remote side.
    fn disconnect(
        &mut self,
        connection: ConnectionId,
        reason: &str,
    ) -> Result<(), TransportError>;

    /// Sends an out-of-band datagram to an address.
    fn send_unconnected(
        &mut self,
        to: SocketAddr,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// The address this peer is bound to.
    fn local_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_status_codes_are_stable() {
        assert_eq!(ConnectionStatus::Connected.code(), 5);
        assert_eq!(ConnectionStatus::Disconnected.code(), 7);
        for code in 0..=7u8 {
            let status = ConnectionStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_connection_status_unknown_code_is_none() {
        assert_eq!(ConnectionStatus::from_code(8), None);
        assert_eq!(ConnectionStatus::from_code(255), None);
    }

    #[test]
    fn test_delivery_method_guarantees() {
        assert!(DeliveryMethod::ReliableOrdered.is_reliable());
        assert!(DeliveryMethod::ReliableOrdered.is_ordered());
        assert!(DeliveryMethod::ReliableUnordered.is_reliable());
        assert!(!DeliveryMethod::ReliableUnordered.is_ordered());
        assert!(!DeliveryMethod::Unreliable.is_reliable());
        assert!(!DeliveryMethod::UnreliableSequenced.is_reliable());
        assert_eq!(DeliveryMethod::default(), DeliveryMethod::ReliableOrdered);
    }
}
