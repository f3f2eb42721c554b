//! Wire protocol for netlobby.
//!
//! This crate defines everything peers and the discovery service agree on:
//!
//! - **Identity** ([`MachineId`], [`GamerId`], [`HostId`]): small
//!   newtypes that travel in messages.
//! - **Code tables** ([`EndReason`], [`JoinError`]): versioned numeric
//!   mappings with stable names for the text channels.
//! - **Fixed sub-protocols** ([`encode_approval`], [`StatusPayload`]):
//!   byte layouts other implementations must match exactly.
//! - **Session messages** ([`Envelope`], [`SessionMessage`]): membership
//!   traffic between a host and its clients.
//! - **Discovery contract** ([`DiscoveryRequest`], [`DiscoveryResponse`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope, payloads) → Session (membership)
//! ```

mod codec;
mod discovery;
mod error;
mod message;
mod reason;
mod types;
mod wire;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use discovery::{
    DiscoveryRequest, DiscoveryResponse, HostAdvert, ResponseKind,
    ResponseResult,
};
pub use error::ProtocolError;
pub use message::{Envelope, JoinRequest, Payload, SessionMessage, WIRE_VERSION};
pub use reason::{EndReason, JoinError};
pub use types::{
    GamerId, GamerInfo, GamerProfile, HostId, MachineId, PublicInfo, Recipient,
    SessionProperties, SessionType,
};
pub use wire::{StatusPayload, decode_approval, encode_approval};
