//! Membership and lifecycle state for netlobby.
//!
//! This crate holds everything a session knows, independent of how events
//! reach it:
//!
//! 1. **Configuration**: [`SlotConfig`] and [`SessionConfig`]
//! 2. **Membership**: [`Registry`] of [`Machine`]s and their [`Gamer`]s,
//!    with the Pending/Added/Removed lifecycle ([`MemberState`])
//! 3. **Slot accounting**: [`SlotUsage`] and [`allocate_machine_id`]
//! 4. **Lifecycle**: [`Lifecycle`] over [`SessionState`]
//! 5. **Snapshots**: [`SessionSnapshot`] for readers on other threads
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)        ← dispatches transport events into this state
//!     ↕
//! Session (this crate)  ← who is in the session, how many slots are left
//!     ↕
//! Protocol (below)      ← MachineId, GamerId, EndReason, PublicInfo
//! ```

mod config;
mod error;
mod lifecycle;
mod machine;
mod registry;
mod slots;
mod snapshot;

pub use config::{MAX_GAMERS, SessionConfig, SlotConfig};
pub use error::SessionError;
pub use lifecycle::{Lifecycle, SessionState};
pub use machine::{Gamer, Machine, MemberState};
pub use registry::{PendingCounts, Registry};
pub use slots::{SlotUsage, allocate_machine_id};
pub use snapshot::{GamerSnapshot, MachineSnapshot, SessionSnapshot, public_info};
