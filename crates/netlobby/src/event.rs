//! Notifications a session raises to its owning application.

use netlobby_protocol::{EndReason, GamerId, GamerInfo, MachineId};
use netlobby_session::SessionState;
use netlobby_transport::DeliveryMethod;
use tokio::sync::mpsc;

/// Something the application may want to react to.
///
/// Raised from inside [`NetworkSession::pump`](crate::NetworkSession::pump)
/// (or a local operation) in the order the changes were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    MachineJoined {
        machine_id: MachineId,
    },
    MachineLeft {
        machine_id: MachineId,
    },
    GamerJoined {
        machine_id: MachineId,
        gamer: GamerInfo,
        is_local: bool,
    },
    GamerLeft {
        machine_id: MachineId,
        gamer_id: GamerId,
    },
    GamerReadyChanged {
        machine_id: MachineId,
        gamer_id: GamerId,
        ready: bool,
    },
    StateChanged {
        state: SessionState,
    },
    /// Application bytes from another machine, with the transport's
    /// delivery guarantee.
    DataReceived {
        from: MachineId,
        method: DeliveryMethod,
        data: Vec<u8>,
    },
    /// The session ended. Always the last event.
    SessionEnded {
        reason: EndReason,
    },
}

/// Receiving end of a session's notifications.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;
