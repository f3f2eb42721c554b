use std::net::{SocketAddr, ToSocketAddrs};

use crate::DiscoveryError;

/// Resolves a `host:port` endpoint once, taking the first address.
///
/// Hostnames go through the system resolver, so this may block.
pub fn resolve_endpoint(endpoint: &str) -> Result<SocketAddr, DiscoveryError> {
    let mut addrs = endpoint
        .to_socket_addrs()
        .map_err(|e| DiscoveryError::Resolve {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        })?;
    addrs.next().ok_or_else(|| DiscoveryError::Resolve {
        endpoint: endpoint.to_owned(),
        reason: "no addresses".into(),
    })
}
