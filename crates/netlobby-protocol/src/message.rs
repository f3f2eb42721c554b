//! Session-level messages carried inside transport data events.
//!
//! Every data event is one codec-encoded [`Envelope`]. Membership traffic
//! travels as [`Payload::System`]; application bytes travel untouched as
//! [`Payload::Game`].

use serde::{Deserialize, Serialize};

use crate::{GamerId, GamerInfo, GamerProfile, MachineId, ProtocolError};

/// Version stamped into every envelope and governing the code tables.
pub const WIRE_VERSION: u8 = 1;

/// Membership and lifecycle traffic between a host and its clients.
///
/// JSON shape: `{"type": "GamerReady", "machine_id": 2, "gamer_id": 0, "ready": true}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionMessage {
    /// A machine finished connecting to the host.
    MachineConnected { machine_id: MachineId },

    /// A machine left the session.
    MachineDisconnected { machine_id: MachineId },

    /// A gamer became part of the session on `machine_id`.
    GamerJoined { machine_id: MachineId, gamer: GamerInfo },

    /// A gamer left the session.
    GamerLeft {
        machine_id: MachineId,
        gamer_id: GamerId,
    },

    /// A gamer toggled readiness.
    GamerReady {
        machine_id: MachineId,
        gamer_id: GamerId,
        ready: bool,
    },

    /// Lobby → Playing.
    GameStarted,

    /// Playing → Lobby.
    GameEnded,
}

impl SessionMessage {
    /// Messages only the host may originate.
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            Self::MachineConnected { .. }
                | Self::MachineDisconnected { .. }
                | Self::GameStarted
                | Self::GameEnded
        )
    }

    /// The machine whose gamer a gamer message is about.
    pub fn gamer_owner(&self) -> Option<MachineId> {
        match self {
            Self::GamerJoined { machine_id, .. }
            | Self::GamerLeft { machine_id, .. }
            | Self::GamerReady { machine_id, .. } => Some(*machine_id),
            _ => None,
        }
    }
}

/// What an envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SessionMessage),
    /// Opaque application bytes.
    Game(Vec<u8>),
}

/// The unit of every data event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    /// Per-sender sequence number, for tracing only.
    pub seq: u64,
    pub payload: Payload,
}

impl Envelope {
    pub fn system(seq: u64, message: SessionMessage) -> Self {
        Self {
            version: WIRE_VERSION,
            seq,
            payload: Payload::System(message),
        }
    }

    pub fn game(seq: u64, data: Vec<u8>) -> Self {
        Self {
            version: WIRE_VERSION,
            seq,
            payload: Payload::Game(data),
        }
    }

    /// Rejects envelopes from another wire version.
    pub fn check_version(&self) -> Result<(), ProtocolError> {
        if self.version == WIRE_VERSION {
            Ok(())
        } else {
            Err(ProtocolError::VersionMismatch {
                expected: WIRE_VERSION,
                got: self.version,
            })
        }
    }
}

/// Hail sent with a connection request: the joining machine's gamers, in
/// the order they will be numbered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    pub gamers: Vec<GamerProfile>,
}

impl JoinRequest {
    pub fn new(gamers: Vec<GamerProfile>) -> Self {
        Self { gamers }
    }

    /// Public slots the join needs. A machine always takes at least one.
    pub fn slots_needed(&self) -> usize {
        self.gamers.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_message_json_is_internally_tagged() {
        let msg = SessionMessage::GamerReady {
            machine_id: MachineId(2),
            gamer_id: GamerId(0),
            ready: true,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "GamerReady");
        assert_eq!(value["machine_id"], 2);
        assert_eq!(value["ready"], true);
    }

    #[test]
    fn test_is_host_only_classification() {
        assert!(SessionMessage::GameStarted.is_host_only());
        assert!(
            SessionMessage::MachineDisconnected {
                machine_id: MachineId(1)
            }
            .is_host_only()
        );
        assert!(
            !SessionMessage::GamerLeft {
                machine_id: MachineId(1),
                gamer_id: GamerId(0)
            }
            .is_host_only()
        );
    }

    #[test]
    fn test_gamer_owner_only_for_gamer_messages() {
        let left = SessionMessage::GamerLeft {
            machine_id: MachineId(3),
            gamer_id: GamerId(1),
        };
        assert_eq!(left.gamer_owner(), Some(MachineId(3)));
        assert_eq!(SessionMessage::GameEnded.gamer_owner(), None);
    }

    #[test]
    fn test_envelope_game_payload_shape() {
        let env = Envelope::game(7, vec![1, 2, 3]);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["version"], WIRE_VERSION);
        assert_eq!(value["payload"]["type"], "Game");
        assert_eq!(value["payload"]["data"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_check_version_rejects_other_versions() {
        let mut env = Envelope::system(1, SessionMessage::GameStarted);
        assert!(env.check_version().is_ok());
        env.version = 9;
        assert!(matches!(
            env.check_version(),
            Err(ProtocolError::VersionMismatch { expected: 1, got: 9 })
        ));
    }

    #[test]
    fn test_slots_needed_is_at_least_one() {
        assert_eq!(JoinRequest::default().slots_needed(), 1);
        let two = JoinRequest::new(vec![
            GamerProfile::new("a", "a#1"),
            GamerProfile::new("b", "b#1"),
        ]);
        assert_eq!(two.slots_needed(), 2);
    }
}
