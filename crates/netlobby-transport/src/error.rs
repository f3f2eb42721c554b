use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is not known to the transport (never existed or
    /// already closed).
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The I/O side of the transport is gone.
    #[error("transport shut down")]
    Shutdown,
}
