//! Session configuration.

use std::time::Duration;

use netlobby_protocol::{SessionProperties, SessionType};
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Upper bound on `max_gamers`.
pub const MAX_GAMERS: u32 = 255;

// ---------------------------------------------------------------------------
// SlotConfig
// ---------------------------------------------------------------------------

/// Gamer capacity, split into a public and a private pool.
///
/// Always satisfies `1 <= max_gamers <= MAX_GAMERS` and
/// `private_gamer_slots <= max_gamers`; deserialization goes through the
/// same check as [`SlotConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSlotConfig")]
pub struct SlotConfig {
    max_gamers: u32,
    private_gamer_slots: u32,
}

#[derive(Deserialize)]
struct RawSlotConfig {
    max_gamers: u32,
    #[serde(default)]
    private_gamer_slots: u32,
}

impl TryFrom<RawSlotConfig> for SlotConfig {
    type Error = SessionError;

    fn try_from(raw: RawSlotConfig) -> Result<Self, Self::Error> {
        SlotConfig::new(raw.max_gamers, raw.private_gamer_slots)
    }
}

impl SlotConfig {
    /// # Errors
    /// [`SessionError::InvalidConfig`] if the bounds above do not hold.
    pub fn new(max_gamers: u32, private_gamer_slots: u32) -> Result<Self, SessionError> {
        if max_gamers == 0 || max_gamers > MAX_GAMERS {
            return Err(SessionError::InvalidConfig(format!(
                "max_gamers must be in 1..={MAX_GAMERS}, got {max_gamers}"
            )));
        }
        if private_gamer_slots > max_gamers {
            return Err(SessionError::InvalidConfig(format!(
                "private_gamer_slots ({private_gamer_slots}) exceeds max_gamers ({max_gamers})"
            )));
        }
        Ok(Self {
            max_gamers,
            private_gamer_slots,
        })
    }

    pub fn max_gamers(&self) -> u32 {
        self.max_gamers
    }

    pub fn private_gamer_slots(&self) -> u32 {
        self.private_gamer_slots
    }

    /// Size of the public pool.
    pub fn public_gamer_slots(&self) -> u32 {
        self.max_gamers - self.private_gamer_slots
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            max_gamers: 8,
            private_gamer_slots: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything a session is created with.
///
/// Missing fields fall back to [`Default`] when deserialized, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub slots: SlotConfig,

    pub session_type: SessionType,

    /// Admit new machines after the lobby phase.
    pub allow_join_in_progress: bool,

    pub properties: SessionProperties,

    /// Minimum time between registrations with the discovery service.
    /// Default: 60 s.
    pub registration_interval: Duration,

    /// How long removed machines and gamers stay addressable.
    /// Default: 5 s.
    pub tombstone_ttl: Duration,

    /// `host:port` of the discovery service. Required for online hosts.
    pub discovery_endpoint: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slots: SlotConfig::default(),
            session_type: SessionType::default(),
            allow_join_in_progress: false,
            properties: SessionProperties::default(),
            registration_interval: Duration::from_secs(60),
            tombstone_ttl: Duration::from_secs(5),
            discovery_endpoint: None,
        }
    }
}

impl SessionConfig {
    /// Checks settings that depend on each other.
    ///
    /// # Errors
    /// [`SessionError::InvalidConfig`] for an online session without a
    /// discovery endpoint.
    pub fn validate(&self, hosting: bool) -> Result<(), SessionError> {
        if hosting && self.session_type.is_online() && self.discovery_endpoint.is_none() {
            return Err(SessionError::InvalidConfig(format!(
                "{:?} sessions need a discovery endpoint",
                self.session_type
            )));
        }
        Ok(())
    }
}
