//! The authoritative membership store.
//!
//! The registry owns every [`Machine`] (and through them every [`Gamer`])
//! the local peer knows about. It is a plain single-writer structure: the
//! session pump is the only thing that mutates it, so there is no locking
//! here. Readers on other threads get a [`SessionSnapshot`](crate::SessionSnapshot)
//! instead of a reference.
//!
//! Ordering is by machine identifier, then by gamer join order, so
//! enumeration is deterministic on every peer.

use std::collections::BTreeMap;
use std::time::Duration;

use netlobby_protocol::{GamerId, MachineId};
use tokio::time::Instant;

use crate::{Gamer, Machine, MemberState, SessionError};

/// Pending gamer counts, by pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub public: u32,
    pub private: u32,
}

#[derive(Debug, Default)]
pub struct Registry {
    machines: BTreeMap<MachineId, Machine>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Machines -----------------------------------------------------------

    /// Registers a machine, replacing a tombstone with the same id.
    ///
    /// # Errors
    /// [`SessionError::MachineExists`] if a live machine holds the id.
    pub fn add_machine(&mut self, machine: Machine) -> Result<(), SessionError> {
        let id = machine.id;
        if self.machine(id).is_some() {
            return Err(SessionError::MachineExists(id));
        }
        tracing::info!(machine_id = %id, local = machine.is_local, "machine added");
        self.machines.insert(id, machine);
        Ok(())
    }

    /// Tombstones a machine and all of its gamers.
    ///
    /// Returns the gamers that were `Added` at the time of removal, so the
    /// caller can announce their departure.
    ///
    /// # Errors
    /// - [`SessionError::UnknownMachine`]: never registered (or purged).
    /// - [`SessionError::AlreadyRemoved`]: removed before.
    pub fn remove_machine(
        &mut self,
        id: MachineId,
        now: Instant,
    ) -> Result<Vec<Gamer>, SessionError> {
        let machine = self
            .machines
            .get_mut(&id)
            .ok_or(SessionError::UnknownMachine(id))?;
        if machine.is_removed() {
            return Err(SessionError::AlreadyRemoved(id));
        }

        machine.state = MemberState::Removed { since: now };
        let mut departed = Vec::new();
        for gamer in &mut machine.gamers {
            if gamer.state.is_added() {
                departed.push(gamer.clone());
            }
            if !gamer.has_left() {
                gamer.state = MemberState::Removed { since: now };
            }
        }

        tracing::info!(machine_id = %id, gamers = departed.len(), "machine removed");
        Ok(departed)
    }

    /// A live machine.
    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(&id).filter(|m| !m.is_removed())
    }

    pub fn machine_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.get_mut(&id).filter(|m| !m.is_removed())
    }

    /// A machine in any state, tombstones included.
    pub fn machine_entry(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(&id)
    }

    /// Live machines in identifier order.
    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values().filter(|m| !m.is_removed())
    }

    pub fn live_ids(&self) -> impl Iterator<Item = MachineId> + '_ {
        self.machines().map(|m| m.id)
    }

    pub fn machine_count(&self) -> usize {
        self.machines().count()
    }

    // -- Gamers -------------------------------------------------------------

    /// `Added` gamers of live machines.
    pub fn gamers(&self) -> impl Iterator<Item = &Gamer> {
        self.machines().flat_map(|m| m.added_gamers())
    }

    pub fn gamer_count(&self) -> usize {
        self.gamers().count()
    }

    /// Looks up a gamer in any state, including gamers of tombstoned
    /// machines.
    pub fn gamer(&self, machine_id: MachineId, gamer_id: GamerId) -> Option<&Gamer> {
        self.machines.get(&machine_id)?.gamer(gamer_id)
    }

    /// Adds a gamer in the `Pending` state.
    pub fn add_gamer(&mut self, gamer: Gamer) -> Result<(), SessionError> {
        self.insert_gamer(gamer, MemberState::Pending)
    }

    /// Adds a gamer directly in the `Added` state.
    pub fn admit_gamer(&mut self, gamer: Gamer) -> Result<(), SessionError> {
        self.insert_gamer(gamer, MemberState::Added)
    }

    fn insert_gamer(&mut self, mut gamer: Gamer, state: MemberState) -> Result<(), SessionError> {
        let machine_id = gamer.machine_id;
        let machine = self
            .machine_mut(machine_id)
            .ok_or(SessionError::UnknownMachine(machine_id))?;

        gamer.state = state;
        match machine.gamers.iter_mut().find(|g| g.id == gamer.id) {
            Some(existing) if existing.has_left() => *existing = gamer,
            Some(_) => {
                return Err(SessionError::GamerExists {
                    machine_id,
                    gamer_id: gamer.id,
                });
            }
            None => machine.gamers.push(gamer),
        }
        Ok(())
    }

    /// Tombstones a gamer and returns it as it was before removal.
    ///
    /// # Errors
    /// - [`SessionError::UnknownMachine`] / [`SessionError::UnknownGamer`]
    /// - [`SessionError::GamerAlreadyRemoved`]
    pub fn remove_gamer(
        &mut self,
        machine_id: MachineId,
        gamer_id: GamerId,
        now: Instant,
    ) -> Result<Gamer, SessionError> {
        let machine = self
            .machines
            .get_mut(&machine_id)
            .ok_or(SessionError::UnknownMachine(machine_id))?;
        let gamer = machine
            .gamer_mut(gamer_id)
            .ok_or(SessionError::UnknownGamer {
                machine_id,
                gamer_id,
            })?;
        if gamer.has_left() {
            return Err(SessionError::GamerAlreadyRemoved {
                machine_id,
                gamer_id,
            });
        }
        let before = gamer.clone();
        gamer.state = MemberState::Removed { since: now };
        tracing::info!(%machine_id, %gamer_id, "gamer removed");
        Ok(before)
    }

    /// Sets readiness on a gamer that has not left.
    pub fn set_ready(
        &mut self,
        machine_id: MachineId,
        gamer_id: GamerId,
        ready: bool,
    ) -> Result<(), SessionError> {
        let gamer = self
            .machine_mut(machine_id)
            .ok_or(SessionError::UnknownMachine(machine_id))?
            .gamer_mut(gamer_id)
            .filter(|g| !g.has_left())
            .ok_or(SessionError::UnknownGamer {
                machine_id,
                gamer_id,
            })?;
        gamer.is_ready = ready;
        Ok(())
    }

    /// Promotes every pending gamer of a live machine to `Added` and
    /// returns the promoted gamers.
    pub fn commit_pending(&mut self) -> Vec<Gamer> {
        let mut committed = Vec::new();
        for machine in self.machines.values_mut().filter(|m| !m.is_removed()) {
            for gamer in machine.gamers.iter_mut().filter(|g| g.state.is_pending()) {
                gamer.state = MemberState::Added;
                committed.push(gamer.clone());
            }
        }
        committed
    }

    pub fn pending_counts(&self) -> PendingCounts {
        let mut counts = PendingCounts::default();
        for gamer in self
            .machines()
            .flat_map(|m| m.gamers.iter())
            .filter(|g| g.state.is_pending())
        {
            if gamer.is_private_slot {
                counts.private += 1;
            } else {
                counts.public += 1;
            }
        }
        counts
    }

    /// Drops tombstones older than `ttl`. Returns the machines purged.
    pub fn purge_tombstones(&mut self, now: Instant, ttl: Duration) -> Vec<MachineId> {
        let purged: Vec<MachineId> = self
            .machines
            .values()
            .filter(|m| m.state.expired(now, ttl))
            .map(|m| m.id)
            .collect();
        for id in &purged {
            self.machines.remove(id);
        }
        for machine in self.machines.values_mut() {
            machine.gamers.retain(|g| !g.state.expired(now, ttl));
        }
        if !purged.is_empty() {
            tracing::debug!(count = purged.len(), "purged machine tombstones");
        }
        purged
    }
}
