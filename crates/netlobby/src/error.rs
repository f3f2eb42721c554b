//! Unified error type for netlobby.

use netlobby_discovery::DiscoveryError;
use netlobby_protocol::ProtocolError;
use netlobby_session::SessionError;
use netlobby_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// The `#[from]` attributes let `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The transport refused a command (unknown connection, shut down).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bytes that were expected to be well-formed were not.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Membership, slot, lifecycle or role rule violated.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl LobbyError {
    /// `true` when the failure came from using a torn-down session.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Session(SessionError::Disposed(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlobby_protocol::MachineId;

    #[test]
    fn test_from_transport_error() {
        let err: LobbyError = TransportError::Shutdown.into();
        assert!(matches!(err, LobbyError::Transport(_)));
        assert!(err.to_string().contains("shut down"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: LobbyError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, LobbyError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: LobbyError = SessionError::AlreadyRemoved(MachineId(2)).into();
        assert!(matches!(err, LobbyError::Session(_)));
        assert!(err.to_string().contains("M-2"));
    }

    #[test]
    fn test_from_discovery_error() {
        let err: LobbyError = DiscoveryError::NoEndpoint.into();
        assert!(matches!(err, LobbyError::Discovery(_)));
    }

    #[test]
    fn test_is_disposed() {
        let err: LobbyError = SessionError::Disposed("session").into();
        assert!(err.is_disposed());
        assert!(!LobbyError::from(TransportError::Shutdown).is_disposed());
    }
}
