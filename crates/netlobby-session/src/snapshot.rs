//! Immutable point-in-time views of a session.
//!
//! Snapshots own their data, so they can be handed to another thread (a
//! render loop, a UI) while the pump keeps mutating the registry.

use std::time::Duration;

use netlobby_protocol::{GamerId, MachineId, PublicInfo};

use crate::{Gamer, Machine, Registry, SessionConfig, SessionState, SlotUsage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamerSnapshot {
    pub machine_id: MachineId,
    pub gamer_id: GamerId,
    pub display_name: String,
    pub gamertag: String,
    pub is_private_slot: bool,
    pub is_ready: bool,
    pub is_local: bool,
    /// Not the first gamer on its machine.
    pub is_guest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub is_local: bool,
    pub is_host: bool,
    pub round_trip_time: Duration,
    pub gamers: Vec<GamerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub local_machine: MachineId,
    pub is_host: bool,
    pub machines: Vec<MachineSnapshot>,
    pub public_info: PublicInfo,
}

impl SessionSnapshot {
    pub fn capture(
        state: SessionState,
        local_machine: MachineId,
        config: &SessionConfig,
        registry: &Registry,
    ) -> Self {
        Self {
            state,
            local_machine,
            is_host: local_machine.is_host(),
            machines: registry.machines().map(MachineSnapshot::from).collect(),
            public_info: public_info(config, registry),
        }
    }

    pub fn gamers(&self) -> impl Iterator<Item = &GamerSnapshot> {
        self.machines.iter().flat_map(|m| m.gamers.iter())
    }

    pub fn machine(&self, id: MachineId) -> Option<&MachineSnapshot> {
        self.machines.iter().find(|m| m.id == id)
    }
}

impl From<&Machine> for MachineSnapshot {
    fn from(machine: &Machine) -> Self {
        let primary = machine.primary_gamer().map(|g| g.id);
        Self {
            id: machine.id,
            is_local: machine.is_local,
            is_host: machine.is_host,
            round_trip_time: machine.round_trip_time,
            gamers: machine
                .added_gamers()
                .map(|g| gamer_snapshot(machine, g, primary))
                .collect(),
        }
    }
}

fn gamer_snapshot(machine: &Machine, gamer: &Gamer, primary: Option<GamerId>) -> GamerSnapshot {
    GamerSnapshot {
        machine_id: machine.id,
        gamer_id: gamer.id,
        display_name: gamer.display_name.clone(),
        gamertag: gamer.gamertag.clone(),
        is_private_slot: gamer.is_private_slot,
        is_ready: gamer.is_ready,
        is_local: machine.is_local,
        is_guest: primary != Some(gamer.id),
    }
}

/// Recomputes the advertised session metadata.
///
/// The host display name is the gamertag of the host machine's primary
/// gamer, or empty while the host has none.
pub fn public_info(config: &SessionConfig, registry: &Registry) -> PublicInfo {
    let usage = SlotUsage::count(&config.slots, registry);
    let host_display_name = registry
        .machine(MachineId::HOST)
        .and_then(Machine::primary_gamer)
        .map(|g| g.gamertag.clone())
        .unwrap_or_default();

    PublicInfo {
        session_type: config.session_type,
        properties: config.properties.clone(),
        host_display_name,
        max_gamers: config.slots.max_gamers(),
        private_gamer_slots: config.slots.private_gamer_slots(),
        current_gamer_count: registry.gamer_count() as u32,
        open_private_slots: usage.open_private,
        open_public_slots: usage.open_public,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlotConfig;
    use netlobby_protocol::{GamerProfile, SessionProperties, SessionType};

    fn config() -> SessionConfig {
        SessionConfig {
            slots: SlotConfig::new(4, 1).unwrap(),
            session_type: SessionType::SystemLink,
            properties: SessionProperties::new().with(0, 7),
            ..SessionConfig::default()
        }
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.add_machine(Machine::new(MachineId::HOST, true)).unwrap();
        reg.add_machine(Machine::new(MachineId(1), false)).unwrap();
        reg.admit_gamer(Gamer::new(
            GamerId(0),
            MachineId::HOST,
            GamerProfile::new("Host Person", "host#1"),
            false,
        ))
        .unwrap();
        reg.admit_gamer(Gamer::new(
            GamerId(0),
            MachineId(1),
            GamerProfile::new("Guest", "guest#1"),
            false,
        ))
        .unwrap();
        reg.admit_gamer(Gamer::new(
            GamerId(1),
            MachineId(1),
            GamerProfile::new("Couch", "couch#1"),
            false,
        ))
        .unwrap();
        reg
    }

    #[test]
    fn test_public_info_reflects_registry() {
        let info = public_info(&config(), &registry());
        assert_eq!(info.session_type, SessionType::SystemLink);
        assert_eq!(info.properties.get(0), Some(7));
        assert_eq!(info.host_display_name, "host#1");
        assert_eq!(info.max_gamers, 4);
        assert_eq!(info.private_gamer_slots, 1);
        assert_eq!(info.current_gamer_count, 3);
        assert_eq!(info.open_public_slots, 0);
        assert_eq!(info.open_private_slots, 1);
    }

    #[test]
    fn test_public_info_host_without_gamers_has_empty_name() {
        let mut reg = Registry::new();
        reg.add_machine(Machine::new(MachineId::HOST, true)).unwrap();
        assert_eq!(public_info(&config(), &reg).host_display_name, "");
    }

    #[test]
    fn test_public_info_ignores_pending_host_gamer() {
        let mut reg = Registry::new();
        reg.add_machine(Machine::new(MachineId::HOST, true)).unwrap();
        reg.add_gamer(Gamer::new(
            GamerId(0),
            MachineId::HOST,
            GamerProfile::new("Host Person", "host#1"),
            false,
        ))
        .unwrap();

        let info = public_info(&config(), &reg);
        assert_eq!(info.host_display_name, "");
        assert_eq!(info.current_gamer_count, 0);

        reg.commit_pending();
        assert_eq!(public_info(&config(), &reg).host_display_name, "host#1");
    }

    #[test]
    fn test_capture_marks_guests_and_locality() {
        let snap = SessionSnapshot::capture(
            SessionState::Lobby,
            MachineId::HOST,
            &config(),
            &registry(),
        );
        assert!(snap.is_host);
        assert_eq!(snap.machines.len(), 2);
        let gamers: Vec<_> = snap
            .gamers()
            .map(|g| (g.machine_id.0, g.gamer_id.0, g.is_local, g.is_guest))
            .collect();
        assert_eq!(
            gamers,
            vec![(0, 0, true, false), (1, 0, false, false), (1, 1, false, true)]
        );
        assert!(snap.machine(MachineId(1)).is_some());
    }
}
