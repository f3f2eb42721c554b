//! Error types for the discovery client.

use netlobby_protocol::ProtocolError;
use netlobby_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The configured endpoint did not resolve to an address.
    #[error("cannot resolve discovery endpoint {endpoint:?}: {reason}")]
    Resolve { endpoint: String, reason: String },

    /// A call was made but no endpoint is configured.
    #[error("no discovery endpoint configured")]
    NoEndpoint,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
