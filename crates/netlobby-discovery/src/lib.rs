//! Discovery/registration client for netlobby.
//!
//! - [`DiscoveryClient`] issues the four service calls and validates the
//!   out-of-band responses, exposing `registered` / `validation failed`
//!   flags for polling.
//! - [`RegistrationHeartbeat`] decides when an online host re-registers.
//! - [`resolve_endpoint`] turns the configured `host:port` into the one
//!   address responses are accepted from.
//!
//! The service's own framing is not defined here; requests and responses
//! go through the session's [`Codec`](netlobby_protocol::Codec).

mod client;
mod endpoint;
mod error;
mod heartbeat;

pub use client::DiscoveryClient;
pub use endpoint::resolve_endpoint;
pub use error::DiscoveryError;
pub use heartbeat::RegistrationHeartbeat;

use netlobby_protocol::HostId;
use rand::Rng;

/// A random identity for a newly created host session.
pub fn generate_host_id() -> HostId {
    HostId(rand::rng().random())
}
