//! Error types for the session layer.

use netlobby_protocol::{GamerId, MachineId};

use crate::SessionState;

/// Errors raised by membership, slot and lifecycle operations.
///
/// Every variant is fatal to the call that produced it. Conditions caused
/// by remote peers that must not destabilize the session (bad reason text,
/// late messages about departed gamers) never become a `SessionError`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A host-only operation was attempted on a client, or the reverse.
    #[error("role violation: {0}")]
    RoleViolation(String),

    /// A transport event referenced a connection with no machine.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The session (or the named object) has already been torn down.
    #[error("{0} is disposed")]
    Disposed(&'static str),

    /// The machine was already removed once.
    #[error("machine {0} was already removed")]
    AlreadyRemoved(MachineId),

    #[error("gamer {gamer_id} on machine {machine_id} was already removed")]
    GamerAlreadyRemoved {
        machine_id: MachineId,
        gamer_id: GamerId,
    },

    /// Every machine identifier in `0..255` is in use. Distinct from
    /// [`NoOpenSlots`](Self::NoOpenSlots).
    #[error("no free machine identifier")]
    MachineIdsExhausted,

    /// Not enough open gamer slots.
    #[error("no open gamer slots (needed {needed}, open {open})")]
    NoOpenSlots { needed: usize, open: i32 },

    #[error("gamer {gamer_id} already exists on machine {machine_id}")]
    GamerExists {
        machine_id: MachineId,
        gamer_id: GamerId,
    },

    #[error("unknown machine {0}")]
    UnknownMachine(MachineId),

    #[error("unknown gamer {gamer_id} on machine {machine_id}")]
    UnknownGamer {
        machine_id: MachineId,
        gamer_id: GamerId,
    },

    /// A live machine already holds this identifier.
    #[error("machine {0} already exists")]
    MachineExists(MachineId),

    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
