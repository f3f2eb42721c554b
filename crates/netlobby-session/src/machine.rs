//! Machines and the gamers they own.

use std::time::Duration;

use netlobby_protocol::{GamerId, GamerInfo, GamerProfile, MachineId};
use tokio::time::Instant;

/// Where a machine or gamer is in its membership lifecycle.
///
/// ```text
///   Pending ──commit──→ Added ──remove──→ Removed { since }  ──ttl──→ (purged)
/// ```
///
/// Only `Added` entries are visible to iteration and counted in slot
/// accounting. `Removed` entries are tombstones kept so that late
/// messages naming them can still be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Pending,
    Added,
    Removed { since: Instant },
}

impl MemberState {
    pub fn is_added(self) -> bool {
        matches!(self, Self::Added)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_removed(self) -> bool {
        matches!(self, Self::Removed { .. })
    }

    /// `true` for a tombstone older than `ttl`.
    pub fn expired(self, now: Instant, ttl: Duration) -> bool {
        match self {
            Self::Removed { since } => now.saturating_duration_since(since) >= ttl,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Gamer
// ---------------------------------------------------------------------------

/// One human participant slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gamer {
    pub id: GamerId,
    pub machine_id: MachineId,
    pub display_name: String,
    pub gamertag: String,
    pub is_private_slot: bool,
    pub is_ready: bool,
    pub state: MemberState,
}

impl Gamer {
    /// A new pending gamer.
    pub fn new(
        id: GamerId,
        machine_id: MachineId,
        profile: GamerProfile,
        is_private_slot: bool,
    ) -> Self {
        Self {
            id,
            machine_id,
            display_name: profile.display_name,
            gamertag: profile.gamertag,
            is_private_slot,
            is_ready: false,
            state: MemberState::Pending,
        }
    }

    /// A gamer announced by another machine.
    pub fn from_info(machine_id: MachineId, info: GamerInfo) -> Self {
        Self {
            id: info.gamer_id,
            machine_id,
            display_name: info.display_name,
            gamertag: info.gamertag,
            is_private_slot: info.is_private_slot,
            is_ready: info.is_ready,
            state: MemberState::Pending,
        }
    }

    pub fn to_info(&self) -> GamerInfo {
        GamerInfo {
            gamer_id: self.id,
            display_name: self.display_name.clone(),
            gamertag: self.gamertag.clone(),
            is_private_slot: self.is_private_slot,
            is_ready: self.is_ready,
        }
    }

    /// Has this gamer left the session?
    pub fn has_left(&self) -> bool {
        self.state.is_removed()
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// One peer process in the session.
#[derive(Debug, Clone)]
pub struct Machine {
    pub id: MachineId,
    pub is_local: bool,
    /// Set for machine 0 on every peer.
    pub is_host: bool,
    /// In join order. The first gamer that has not left is the primary
    /// gamer; the rest are guests.
    pub gamers: Vec<Gamer>,
    pub round_trip_time: Duration,
    pub state: MemberState,
    /// A removal was requested and is waiting for the disconnect.
    pub being_removed: bool,
}

impl Machine {
    /// A new machine, already `Added`.
    pub fn new(id: MachineId, is_local: bool) -> Self {
        Self {
            id,
            is_local,
            is_host: id.is_host(),
            gamers: Vec::new(),
            round_trip_time: Duration::ZERO,
            state: MemberState::Added,
            being_removed: false,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.state.is_removed()
    }

    /// The first admitted gamer. Pending and departed entries never count.
    pub fn primary_gamer(&self) -> Option<&Gamer> {
        self.added_gamers().next()
    }

    /// Looks up a gamer in any state.
    pub fn gamer(&self, id: GamerId) -> Option<&Gamer> {
        self.gamers.iter().find(|g| g.id == id)
    }

    pub fn gamer_mut(&mut self, id: GamerId) -> Option<&mut Gamer> {
        self.gamers.iter_mut().find(|g| g.id == id)
    }

    pub fn added_gamers(&self) -> impl Iterator<Item = &Gamer> {
        self.gamers.iter().filter(|g| g.state.is_added())
    }

    /// Smallest gamer id not held by any entry, tombstones included.
    pub fn next_gamer_id(&self) -> Option<GamerId> {
        (0..=u8::MAX)
            .map(GamerId)
            .find(|id| self.gamer(*id).is_none())
    }
}
