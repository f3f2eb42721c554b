//! # netlobby
//!
//! Peer-to-peer session and lobby engine.
//!
//! One machine hosts; others join it. The host approves joins, keeps slot
//! accounting for every peer and relays membership changes, so each
//! machine holds the same view of who is in the session. An online host
//! also keeps itself registered with a discovery service.
//!
//! The application owns the transport (anything implementing
//! [`TransportPeer`](netlobby_transport::TransportPeer)) and calls
//! [`NetworkSession::pump`] once per tick; all state changes happen inside
//! that call and come back as [`SessionEvent`]s.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netlobby::prelude::*;
//!
//! # fn main() -> Result<(), LobbyError> {
//! let (peer, _driver) = ChannelPeer::pair("127.0.0.1:14242".parse().unwrap());
//! let (mut session, mut events) = SessionBuilder::new()
//!     .max_gamers(4)
//!     .session_type(SessionType::SystemLink)
//!     .host(peer)?;
//!
//! session.add_local_gamer(GamerProfile::new("Host", "host#1"), false)?;
//! session.pump()?;
//! while let Ok(event) = events.try_recv() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod error;
mod event;
mod session;
mod state;

pub use error::LobbyError;
pub use event::{SessionEvent, SessionEvents};
pub use session::{NetworkSession, SessionBuilder};

/// Common imports for applications.
pub mod prelude {
    pub use crate::{LobbyError, NetworkSession, SessionBuilder, SessionEvent, SessionEvents};
    pub use netlobby_protocol::{
        EndReason, GamerId, GamerInfo, GamerProfile, JoinError, JoinRequest, MachineId,
        PublicInfo, Recipient, SessionProperties, SessionType,
    };
    pub use netlobby_session::{Gamer, Machine, SessionConfig, SessionSnapshot, SessionState};
    #[cfg(feature = "channel")]
    pub use netlobby_transport::{ChannelPeer, PeerCommand, PeerDriver};
    pub use netlobby_transport::{ConnectionId, DeliveryMethod, TransportEvent, TransportPeer};
}
