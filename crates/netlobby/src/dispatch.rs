//! The message dispatcher.
//!
//! [`dispatch`] routes one transport event. Everything that depends on
//! whether the local peer hosts goes through a [`RoleDispatcher`], picked
//! once when the session is created:
//!
//! | Event                    | Host                                   | Client                  |
//! |--------------------------|----------------------------------------|-------------------------|
//! | discovery probe          | reply with [`HostAdvert`]              | ignore                  |
//! | connection approval      | approve or deny                        | role violation          |
//! | status → Connected       | roster + `MachineConnected` broadcast  | role violation          |
//! | status → Disconnected    | remove + `MachineDisconnected`         | remove + end session    |
//! | system message           | validate, apply, relay                 | apply                   |
//!
//! Data, unconnected data, latency and log events are handled the same way
//! for both roles.
//!
//! Input from remote peers is never trusted to be well-formed: undecodable
//! envelopes, messages about departed machines or gamers and messages a
//! peer had no business sending are logged and dropped. Inconsistencies in
//! what the local transport reports (a data event on a connection that was
//! never approved) are fatal.

use std::net::SocketAddr;

use netlobby_protocol::{
    Codec, Envelope, GamerId, GamerInfo, JoinError, JoinRequest, MachineId, Payload,
    SessionMessage, StatusPayload, encode_approval,
};
use netlobby_session::{Gamer, Machine, SessionError, SessionState, allocate_machine_id};
use netlobby_transport::{
    ConnectionId, ConnectionStatus, DeliveryMethod, LogLevel, TransportEvent, TransportPeer,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::state::SessionCore;
use crate::{LobbyError, SessionEvent};

/// Role-specific handling of transport events.
pub(crate) trait RoleDispatcher<T: TransportPeer, C: Codec + Clone>: Send {
    /// Whether this role takes incoming connections at all.
    fn accepts_connections(&self) -> bool;

    fn on_discovery_request(
        &self,
        core: &mut SessionCore<T, C>,
        from: SocketAddr,
    ) -> Result<(), LobbyError>;

    fn on_connection_approval(
        &self,
        core: &mut SessionCore<T, C>,
        connection: ConnectionId,
        hail: &[u8],
    ) -> Result<(), LobbyError>;

    fn on_connected(
        &self,
        core: &mut SessionCore<T, C>,
        machine_id: MachineId,
    ) -> Result<(), LobbyError>;

    fn on_disconnected(
        &self,
        core: &mut SessionCore<T, C>,
        machine_id: MachineId,
        status: &StatusPayload,
    ) -> Result<(), LobbyError>;

    fn on_system_message(
        &self,
        core: &mut SessionCore<T, C>,
        from: MachineId,
        message: SessionMessage,
    ) -> Result<(), LobbyError>;
}

/// Routes one transport event.
pub(crate) fn dispatch<T: TransportPeer, C: Codec + Clone>(
    core: &mut SessionCore<T, C>,
    role: &dyn RoleDispatcher<T, C>,
    event: &TransportEvent,
) -> Result<(), LobbyError> {
    match event {
        TransportEvent::DiscoveryRequest { from } => role.on_discovery_request(core, *from),

        TransportEvent::ConnectionApproval { connection, hail } => {
            role.on_connection_approval(core, *connection, hail)
        }

        TransportEvent::StatusChanged {
            connection,
            payload,
        } => {
            let status = StatusPayload::decode(payload)?;
            trace!(?connection, status = %status.status, reason = ?status.reason, "status changed");
            match status.status {
                ConnectionStatus::Connected => {
                    if !role.accepts_connections() {
                        return Err(SessionError::RoleViolation(format!(
                            "a client cannot accept new connections ({connection:?})"
                        ))
                        .into());
                    }
                    let connection = connection.ok_or_else(|| {
                        SessionError::ProtocolViolation("connected status without a connection".into())
                    })?;
                    let machine_id = core.machine_for(connection, "connected status")?;
                    role.on_connected(core, machine_id)
                }
                ConnectionStatus::Disconnected => {
                    let Some(connection) = *connection else {
                        debug!("disconnect without a connection, ignoring");
                        return Ok(());
                    };
                    let machine_id = core.machine_for(connection, "disconnected status")?;
                    role.on_disconnected(core, machine_id, &status)
                }
                _ => Ok(()),
            }
        }

        TransportEvent::Data {
            connection,
            method,
            data,
        } => {
            let from = core.machine_for(*connection, "data")?;
            on_data(core, role, from, *method, data)
        }

        TransportEvent::UnconnectedData { from, data } => {
            core.discovery.handle_unconnected(*from, data);
            Ok(())
        }

        TransportEvent::LatencyUpdated {
            connection,
            round_trip,
        } => {
            if let Some(machine) = core
                .connections
                .get(connection)
                .copied()
                .and_then(|id| core.registry.machine_mut(id))
            {
                machine.round_trip_time = *round_trip;
            }
            Ok(())
        }

        TransportEvent::Log { level, text } => {
            log_transport(*level, text);
            Ok(())
        }
    }
}

fn on_data<T: TransportPeer, C: Codec + Clone>(
    core: &mut SessionCore<T, C>,
    role: &dyn RoleDispatcher<T, C>,
    from: MachineId,
    method: DeliveryMethod,
    data: &[u8],
) -> Result<(), LobbyError> {
    let envelope: Envelope = match core.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(%from, error = %e, "dropping undecodable envelope");
            return Ok(());
        }
    };
    if let Err(e) = envelope.check_version() {
        warn!(%from, error = %e, "dropping envelope");
        return Ok(());
    }
    trace!(%from, seq = envelope.seq, "envelope received");

    match envelope.payload {
        Payload::Game(data) => {
            core.emit(SessionEvent::DataReceived { from, method, data });
            Ok(())
        }
        Payload::System(message) => role.on_system_message(core, from, message),
    }
}

fn log_transport(level: LogLevel, text: &str) {
    match level {
        LogLevel::Verbose => tracing::trace!(target: "netlobby::transport", "{text}"),
        LogLevel::Debug => tracing::debug!(target: "netlobby::transport", "{text}"),
        LogLevel::Warning => tracing::warn!(target: "netlobby::transport", "{text}"),
        LogLevel::Error => tracing::error!(target: "netlobby::transport", "{text}"),
    }
}

// ---------------------------------------------------------------------------
// Shared membership updates
// ---------------------------------------------------------------------------

/// Tombstones a machine and raises the matching notifications.
fn remove_machine<T: TransportPeer, C: Codec + Clone>(
    core: &mut SessionCore<T, C>,
    machine_id: MachineId,
) -> Result<(), SessionError> {
    let departed = core.registry.remove_machine(machine_id, Instant::now())?;
    for gamer in departed {
        core.emit(SessionEvent::GamerLeft {
            machine_id,
            gamer_id: gamer.id,
        });
    }
    core.emit(SessionEvent::MachineLeft { machine_id });
    Ok(())
}

/// Applies a gamer departure. `false` when it referred to nothing live.
fn apply_gamer_left<T: TransportPeer, C: Codec + Clone>(
    core: &mut SessionCore<T, C>,
    machine_id: MachineId,
    gamer_id: GamerId,
) -> bool {
    match core.registry.remove_gamer(machine_id, gamer_id, Instant::now()) {
        Ok(before) => {
            if before.state.is_added() {
                core.emit(SessionEvent::GamerLeft {
                    machine_id,
                    gamer_id,
                });
            }
            true
        }
        Err(e) => {
            debug!(%machine_id, %gamer_id, error = %e, "gamer left for unknown or departed gamer");
            false
        }
    }
}

/// Applies a readiness change. `false` when it referred to nothing live.
fn apply_gamer_ready<T: TransportPeer, C: Codec + Clone>(
    core: &mut SessionCore<T, C>,
    machine_id: MachineId,
    gamer_id: GamerId,
    ready: bool,
) -> bool {
    match core.registry.set_ready(machine_id, gamer_id, ready) {
        Ok(()) => {
            core.emit(SessionEvent::GamerReadyChanged {
                machine_id,
                gamer_id,
                ready,
            });
            true
        }
        Err(e) => {
            debug!(%machine_id, %gamer_id, error = %e, "ready change for unknown or departed gamer");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

pub(crate) struct HostDispatcher;

impl HostDispatcher {
    fn deny<T: TransportPeer, C: Codec + Clone>(
        core: &mut SessionCore<T, C>,
        connection: ConnectionId,
        error: JoinError,
    ) -> Result<(), LobbyError> {
        info!(%connection, reason = %error, "join denied");
        core.transport.deny(connection, error.as_str())?;
        Ok(())
    }

    /// Sends the newcomer everything it needs to mirror the session.
    fn send_roster<T: TransportPeer, C: Codec + Clone>(
        core: &mut SessionCore<T, C>,
        newcomer: MachineId,
    ) {
        let others: Vec<MachineId> = core
            .registry
            .live_ids()
            .filter(|id| !id.is_host() && *id != newcomer)
            .collect();
        for machine_id in others {
            core.notify(newcomer, SessionMessage::MachineConnected { machine_id });
        }

        let gamers: Vec<(MachineId, _)> = core
            .registry
            .gamers()
            .filter(|g| g.machine_id != newcomer)
            .map(|g| (g.machine_id, g.to_info()))
            .collect();
        for (machine_id, gamer) in gamers {
            core.notify(newcomer, SessionMessage::GamerJoined { machine_id, gamer });
        }

        if core.lifecycle.state() == SessionState::Playing {
            core.notify(newcomer, SessionMessage::GameStarted);
        }
    }

    fn on_gamer_joined<T: TransportPeer, C: Codec + Clone>(
        core: &mut SessionCore<T, C>,
        from: MachineId,
        info: GamerInfo,
    ) -> Result<(), LobbyError> {
        let usage = core.usage();
        let open = if info.is_private_slot {
            usage.admissible_private(&core.registry)
        } else {
            usage.admissible_public(&core.registry)
        };
        let gamer_id = info.gamer_id;
        if open < 1 {
            info!(machine_id = %from, %gamer_id, "no slot for announced gamer, rejecting");
            core.notify(
                from,
                SessionMessage::GamerLeft {
                    machine_id: from,
                    gamer_id,
                },
            );
            return Ok(());
        }

        if let Err(e) = core.registry.admit_gamer(Gamer::from_info(from, info.clone())) {
            warn!(machine_id = %from, %gamer_id, error = %e, "dropping gamer announcement");
            return Ok(());
        }
        info!(machine_id = %from, %gamer_id, "gamer joined");
        core.emit(SessionEvent::GamerJoined {
            machine_id: from,
            gamer: info.clone(),
            is_local: false,
        });
        core.broadcast_system(
            SessionMessage::GamerJoined {
                machine_id: from,
                gamer: info,
            },
            Some(from),
        )
    }
}

impl<T: TransportPeer, C: Codec + Clone> RoleDispatcher<T, C> for HostDispatcher {
    fn accepts_connections(&self) -> bool {
        true
    }

    fn on_discovery_request(
        &self,
        core: &mut SessionCore<T, C>,
        from: SocketAddr,
    ) -> Result<(), LobbyError> {
        debug!(%from, "discovery probe");
        let Some(advert) = core.advert() else {
            return Ok(());
        };
        core.discovery.reply_probe(&mut core.transport, from, &advert)?;
        Ok(())
    }

    fn on_connection_approval(
        &self,
        core: &mut SessionCore<T, C>,
        connection: ConnectionId,
        hail: &[u8],
    ) -> Result<(), LobbyError> {
        if !core
            .lifecycle
            .accepts_joiners(core.config.allow_join_in_progress)
        {
            return Self::deny(core, connection, JoinError::SessionNotJoinable);
        }

        let request: JoinRequest = if hail.is_empty() {
            JoinRequest::default()
        } else {
            core.codec.decode(hail).unwrap_or_else(|e| {
                warn!(%connection, error = %e, "undecodable join hail, seating no gamers");
                JoinRequest::default()
            })
        };

        let needed = request.slots_needed();
        let open = core.usage().admissible_public(&core.registry);
        let machine_id = if open >= needed as i32 {
            allocate_machine_id(&core.registry).ok()
        } else {
            None
        };
        let Some(machine_id) = machine_id else {
            return Self::deny(core, connection, JoinError::SessionFull);
        };

        core.registry.add_machine(Machine::new(machine_id, false))?;
        core.associate(connection, machine_id);
        core.emit(SessionEvent::MachineJoined { machine_id });

        for (index, profile) in request.gamers.into_iter().enumerate() {
            let gamer = Gamer::new(GamerId(index as u8), machine_id, profile, false);
            let info = gamer.to_info();
            core.registry.admit_gamer(gamer)?;
            core.emit(SessionEvent::GamerJoined {
                machine_id,
                gamer: info,
                is_local: false,
            });
        }

        info!(%connection, %machine_id, gamers = needed, "join approved");
        core.transport.approve(connection, &encode_approval(machine_id))?;
        Ok(())
    }

    fn on_connected(
        &self,
        core: &mut SessionCore<T, C>,
        machine_id: MachineId,
    ) -> Result<(), LobbyError> {
        info!(%machine_id, "machine connected");
        Self::send_roster(core, machine_id);

        core.broadcast_system(SessionMessage::MachineConnected { machine_id }, Some(machine_id))?;
        let gamers: Vec<_> = core
            .registry
            .machine(machine_id)
            .map(|m| m.added_gamers().map(Gamer::to_info).collect())
            .unwrap_or_default();
        for gamer in gamers {
            core.broadcast_system(
                SessionMessage::GamerJoined { machine_id, gamer },
                Some(machine_id),
            )?;
        }
        Ok(())
    }

    fn on_disconnected(
        &self,
        core: &mut SessionCore<T, C>,
        machine_id: MachineId,
        status: &StatusPayload,
    ) -> Result<(), LobbyError> {
        info!(%machine_id, reason = ?status.reason, "machine disconnected");
        remove_machine(core, machine_id)?;
        core.broadcast_system(SessionMessage::MachineDisconnected { machine_id }, None)
    }

    fn on_system_message(
        &self,
        core: &mut SessionCore<T, C>,
        from: MachineId,
        message: SessionMessage,
    ) -> Result<(), LobbyError> {
        if message.is_host_only() {
            warn!(%from, ?message, "client sent a host-only message, dropping");
            return Ok(());
        }
        if message.gamer_owner() != Some(from) {
            warn!(%from, ?message, "machine announced another machine's gamer, dropping");
            return Ok(());
        }

        match message {
            SessionMessage::GamerJoined { gamer, .. } => Self::on_gamer_joined(core, from, gamer),
            SessionMessage::GamerLeft { gamer_id, .. } => {
                if apply_gamer_left(core, from, gamer_id) {
                    core.broadcast_system(
                        SessionMessage::GamerLeft {
                            machine_id: from,
                            gamer_id,
                        },
                        Some(from),
                    )?;
                }
                Ok(())
            }
            SessionMessage::GamerReady {
                gamer_id, ready, ..
            } => {
                if apply_gamer_ready(core, from, gamer_id, ready) {
                    core.broadcast_system(
                        SessionMessage::GamerReady {
                            machine_id: from,
                            gamer_id,
                            ready,
                        },
                        Some(from),
                    )?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub(crate) struct ClientDispatcher;

impl<T: TransportPeer, C: Codec + Clone> RoleDispatcher<T, C> for ClientDispatcher {
    fn accepts_connections(&self) -> bool {
        false
    }

    fn on_discovery_request(
        &self,
        _core: &mut SessionCore<T, C>,
        from: SocketAddr,
    ) -> Result<(), LobbyError> {
        trace!(%from, "ignoring discovery probe as client");
        Ok(())
    }

    fn on_connection_approval(
        &self,
        _core: &mut SessionCore<T, C>,
        connection: ConnectionId,
        _hail: &[u8],
    ) -> Result<(), LobbyError> {
        Err(SessionError::RoleViolation(format!(
            "client received a connection approval request on {connection}"
        ))
        .into())
    }

    fn on_connected(
        &self,
        _core: &mut SessionCore<T, C>,
        machine_id: MachineId,
    ) -> Result<(), LobbyError> {
        Err(SessionError::RoleViolation(format!(
            "a client cannot accept new connections ({machine_id})"
        ))
        .into())
    }

    fn on_disconnected(
        &self,
        core: &mut SessionCore<T, C>,
        machine_id: MachineId,
        status: &StatusPayload,
    ) -> Result<(), LobbyError> {
        remove_machine(core, machine_id)?;
        let reason = status.end_reason();
        info!(%machine_id, %reason, text = ?status.reason, "lost connection to host");
        core.teardown(reason);
        Ok(())
    }

    fn on_system_message(
        &self,
        core: &mut SessionCore<T, C>,
        from: MachineId,
        message: SessionMessage,
    ) -> Result<(), LobbyError> {
        trace!(%from, ?message, "system message");
        let local = core.local_machine;
        match message {
            SessionMessage::MachineConnected { machine_id } => {
                if machine_id == local || machine_id.is_host() {
                    return Ok(());
                }
                match core.registry.add_machine(Machine::new(machine_id, false)) {
                    Ok(()) => core.emit(SessionEvent::MachineJoined { machine_id }),
                    Err(e) => warn!(%machine_id, error = %e, "ignoring machine announcement"),
                }
            }
            SessionMessage::MachineDisconnected { machine_id } => {
                if machine_id == local {
                    return Ok(());
                }
                if let Err(e) = remove_machine(core, machine_id) {
                    debug!(%machine_id, error = %e, "disconnect for unknown or departed machine");
                }
            }
            SessionMessage::GamerJoined { machine_id, gamer } => {
                if machine_id == local {
                    return Ok(());
                }
                let gamer_id = gamer.gamer_id;
                match core.registry.admit_gamer(Gamer::from_info(machine_id, gamer.clone())) {
                    Ok(()) => core.emit(SessionEvent::GamerJoined {
                        machine_id,
                        gamer,
                        is_local: false,
                    }),
                    Err(e) => {
                        debug!(%machine_id, %gamer_id, error = %e, "gamer joined on unknown or departed machine");
                    }
                }
            }
            SessionMessage::GamerLeft {
                machine_id,
                gamer_id,
            } => {
                apply_gamer_left(core, machine_id, gamer_id);
            }
            SessionMessage::GamerReady {
                machine_id,
                gamer_id,
                ready,
            } => {
                apply_gamer_ready(core, machine_id, gamer_id, ready);
            }
            SessionMessage::GameStarted => match core.lifecycle.start_game() {
                Ok(()) => core.emit(SessionEvent::StateChanged {
                    state: core.lifecycle.state(),
                }),
                Err(e) => warn!(error = %e, "ignoring game start"),
            },
            SessionMessage::GameEnded => match core.lifecycle.end_game() {
                Ok(()) => core.emit(SessionEvent::StateChanged {
                    state: core.lifecycle.state(),
                }),
                Err(e) => warn!(error = %e, "ignoring game end"),
            },
        }
        Ok(())
    }
}
