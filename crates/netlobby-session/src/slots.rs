//! Slot accounting and machine identifier allocation.
//!
//! All counts are pure functions of the [`Registry`] and the
//! [`SlotConfig`]. Only `Added` gamers occupy a slot, so at any point:
//!
//! ```text
//! open_public  + used_public  == max_gamers - private_gamer_slots
//! open_private + used_private == private_gamer_slots
//! ```
//!
//! Open counts are signed. A client mirrors whatever the host decided,
//! and the host may draw from the private pool, so a pool can be
//! over-committed from one peer's point of view.

use netlobby_protocol::MachineId;

use crate::{Machine, Registry, SessionError, SlotConfig};

/// Slot usage at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUsage {
    pub used_public: u32,
    pub used_private: u32,
    pub open_public: i32,
    pub open_private: i32,
}

impl SlotUsage {
    pub fn count(config: &SlotConfig, registry: &Registry) -> Self {
        let (mut used_public, mut used_private) = (0u32, 0u32);
        for gamer in registry.gamers() {
            if gamer.is_private_slot {
                used_private += 1;
            } else {
                used_public += 1;
            }
        }
        Self {
            used_public,
            used_private,
            open_public: config.public_gamer_slots() as i32 - used_public as i32,
            open_private: config.private_gamer_slots() as i32 - used_private as i32,
        }
    }

    /// Open slots available to gamers of `machine`.
    ///
    /// The host may draw from either pool and gets `max(public, private)`.
    /// Whether it should rather be the sum is unresolved, so this stays
    /// `max` for now.
    pub fn open_slots_for(&self, machine: &Machine) -> i32 {
        if machine.is_host {
            self.open_public.max(self.open_private)
        } else {
            self.open_public
        }
    }

    /// Public slots left once pending gamers are seated as well.
    pub fn admissible_public(&self, registry: &Registry) -> i32 {
        self.open_public - registry.pending_counts().public as i32
    }

    /// Private slots left once pending gamers are seated as well.
    pub fn admissible_private(&self, registry: &Registry) -> i32 {
        self.open_private - registry.pending_counts().private as i32
    }
}

/// Smallest machine identifier in `[0, 255)` not held by a live machine.
///
/// # Errors
/// [`SessionError::MachineIdsExhausted`] when all 255 are in use.
pub fn allocate_machine_id(registry: &Registry) -> Result<MachineId, SessionError> {
    let mut expected = 0usize;
    for id in registry.live_ids() {
        if id.0 as usize != expected {
            break;
        }
        expected += 1;
    }
    if expected < MachineId::CAPACITY {
        Ok(MachineId(expected as u8))
    } else {
        Err(SessionError::MachineIdsExhausted)
    }
}
