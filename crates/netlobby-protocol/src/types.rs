//! Core protocol types: identities, session metadata and gamer records.
//!
//! Everything here is serialized into envelopes, join hails or discovery
//! messages, so field names and serde attributes are part of the wire
//! contract.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Session-scoped identifier of a machine (one connected peer process).
///
/// Valid identifiers are `0..=254`; `0` is always the host. The value 255
/// is reserved so that every identifier fits the single approval byte with
/// room for a sentinel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MachineId(pub u8);

impl MachineId {
    /// The host's identifier.
    pub const HOST: MachineId = MachineId(0);

    /// Number of assignable identifiers (`0..255`).
    pub const CAPACITY: usize = 255;

    /// Returns `true` for the host's identifier.
    pub fn is_host(self) -> bool {
        self == Self::HOST
    }

    /// Returns `true` if the identifier lies in the assignable range.
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < Self::CAPACITY
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// Identifier of a gamer, unique within its owning machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GamerId(pub u8);

impl fmt::Display for GamerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// Identity a host advertises under at the discovery service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H-{:016x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who an outgoing game message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every reachable machine.
    All,
    /// One machine.
    Machine(MachineId),
    /// Every reachable machine except one.
    AllExcept(MachineId),
}

impl Recipient {
    /// Returns `true` if `machine` is addressed.
    pub fn includes(self, machine: MachineId) -> bool {
        match self {
            Self::All => true,
            Self::Machine(target) => target == machine,
            Self::AllExcept(excluded) => excluded != machine,
        }
    }
}

// ---------------------------------------------------------------------------
// Session metadata
// ---------------------------------------------------------------------------

/// How a session is advertised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionType {
    /// Single process, no networking.
    #[default]
    Local,
    /// LAN only, found through discovery probes.
    SystemLink,
    /// Internet session advertised at the discovery service.
    PlayerMatch,
    /// Internet session advertised at the discovery service.
    Ranked,
}

impl SessionType {
    /// Returns `true` for the modes that register with the discovery
    /// service.
    pub fn is_online(self) -> bool {
        matches!(self, Self::PlayerMatch | Self::Ranked)
    }
}

/// Application-defined integer properties attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionProperties(BTreeMap<u8, i32>);

impl SessionProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u8) -> Option<i32> {
        self.0.get(&key).copied()
    }

    pub fn set(&mut self, key: u8, value: i32) {
        self.0.insert(key, value);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: u8, value: i32) -> Self {
        self.set(key, value);
        self
    }

    pub fn clear(&mut self, key: u8) {
        self.0.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Session metadata advertised to discovery probes and the discovery
/// service. Field order is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInfo {
    pub session_type: SessionType,
    pub properties: SessionProperties,
    pub host_display_name: String,
    pub max_gamers: u32,
    pub private_gamer_slots: u32,
    pub current_gamer_count: u32,
    pub open_private_slots: i32,
    pub open_public_slots: i32,
}

// ---------------------------------------------------------------------------
// Gamers
// ---------------------------------------------------------------------------

/// What a joining machine says about one of its local gamers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamerProfile {
    pub display_name: String,
    pub gamertag: String,
}

impl GamerProfile {
    pub fn new(display_name: impl Into<String>, gamertag: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            gamertag: gamertag.into(),
        }
    }
}

/// A gamer as announced to other machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamerInfo {
    pub gamer_id: GamerId,
    pub display_name: String,
    pub gamertag: String,
    pub is_private_slot: bool,
    pub is_ready: bool,
}
