//! `NetworkSession` builder and pump.
//!
//! This is the entry point for an application: build a session as host or
//! as a joining client, call [`NetworkSession::pump`] once per tick, and
//! read [`SessionEvent`]s from the returned receiver.

use std::sync::Arc;
use std::time::Duration;

use netlobby_discovery::{DiscoveryClient, generate_host_id, resolve_endpoint};
use netlobby_protocol::{
    Codec, EndReason, Envelope, GamerId, GamerProfile, JoinRequest, JsonCodec, MachineId,
    PublicInfo, Recipient, SessionMessage, SessionProperties, SessionType, decode_approval,
};
use netlobby_session::{
    Gamer, Machine, Registry, SessionConfig, SessionError, SessionSnapshot, SessionState,
    SlotConfig, SlotUsage,
};
use netlobby_transport::{ConnectionId, DeliveryMethod, TransportPeer};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info};

use crate::state::SessionCore;
use crate::dispatch::{ClientDispatcher, HostDispatcher, RoleDispatcher, dispatch};
use crate::{LobbyError, SessionEvent, SessionEvents};

/// Builder for hosting or joining a session.
///
/// # Example
///
/// ```rust,ignore
/// use netlobby::prelude::*;
///
/// let (mut session, mut events) = SessionBuilder::new()
///     .max_gamers(4)
///     .private_gamer_slots(1)
///     .session_type(SessionType::SystemLink)
///     .host(peer)?;
///
/// loop {
///     session.pump()?;
///     while let Ok(event) = events.try_recv() {
///         // react
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    config: SessionConfig,
    max_gamers: u32,
    private_gamer_slots: u32,
}

impl SessionBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::from_config(SessionConfig::default())
    }

    fn from_config(config: SessionConfig) -> Self {
        Self {
            max_gamers: config.slots.max_gamers(),
            private_gamer_slots: config.slots.private_gamer_slots(),
            config,
        }
    }

    /// Replaces every setting with `config`.
    pub fn config(self, config: SessionConfig) -> Self {
        Self::from_config(config)
    }

    /// Total gamer slots, private ones included. At most 255.
    pub fn max_gamers(mut self, max_gamers: u32) -> Self {
        self.max_gamers = max_gamers;
        self
    }

    /// Slots held back for invited gamers. Must not exceed `max_gamers`.
    pub fn private_gamer_slots(mut self, slots: u32) -> Self {
        self.private_gamer_slots = slots;
        self
    }

    /// LAN or online. Online types need a
    /// [`discovery_endpoint`](Self::discovery_endpoint) when hosting.
    pub fn session_type(mut self, session_type: SessionType) -> Self {
        self.config.session_type = session_type;
        self
    }

    /// Lets machines join while the game is being played.
    pub fn allow_join_in_progress(mut self, allow: bool) -> Self {
        self.config.allow_join_in_progress = allow;
        self
    }

    /// Application-defined properties advertised with the session.
    pub fn properties(mut self, properties: SessionProperties) -> Self {
        self.config.properties = properties;
        self
    }

    /// Sets the discovery service address (`host:port`).
    pub fn discovery_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.discovery_endpoint = Some(endpoint.into());
        self
    }

    /// How often an online host re-registers with the discovery service.
    pub fn registration_interval(mut self, interval: Duration) -> Self {
        self.config.registration_interval = interval;
        self
    }

    /// How long departed machines and gamers are kept for late messages.
    pub fn tombstone_ttl(mut self, ttl: Duration) -> Self {
        self.config.tombstone_ttl = ttl;
        self
    }

    /// Validates the settings and resolves the discovery endpoint.
    fn finish<C: Codec + Clone>(
        mut self,
        hosting: bool,
        codec: &C,
    ) -> Result<(SessionConfig, DiscoveryClient<C>), LobbyError> {
        self.config.slots = SlotConfig::new(self.max_gamers, self.private_gamer_slots)?;
        self.config.validate(hosting)?;
        let endpoint = self
            .config
            .discovery_endpoint
            .as_deref()
            .map(resolve_endpoint)
            .transpose()?;
        let discovery = DiscoveryClient::new(endpoint, codec.clone());
        Ok((self.config, discovery))
    }

    /// Hosts a new session on `transport` with the default JSON codec.
    ///
    /// # Errors
    /// Invalid slot settings, an online session without a discovery
    /// endpoint, or an endpoint that does not resolve.
    pub fn host<T: TransportPeer>(
        self,
        transport: T,
    ) -> Result<(NetworkSession<T>, SessionEvents), LobbyError> {
        self.host_with_codec(transport, JsonCodec)
    }

    /// Hosts a new session with a custom codec.
    pub fn host_with_codec<T: TransportPeer, C: Codec + Clone>(
        self,
        transport: T,
        codec: C,
    ) -> Result<(NetworkSession<T, C>, SessionEvents), LobbyError> {
        let (config, discovery) = self.finish(true, &codec)?;

        let mut registry = Registry::new();
        registry.add_machine(Machine::new(MachineId::HOST, true))?;

        let host_id = generate_host_id();
        let (tx, rx) = mpsc::unbounded_channel();
        let core = SessionCore::new(
            transport,
            codec,
            config,
            registry,
            MachineId::HOST,
            discovery,
            Some(host_id),
            tx,
        );
        info!(
            %host_id,
            session_type = ?core.config.session_type,
            max_gamers = core.config.slots.max_gamers(),
            private_gamer_slots = core.config.slots.private_gamer_slots(),
            "hosting session"
        );
        core.emit(SessionEvent::MachineJoined {
            machine_id: MachineId::HOST,
        });

        Ok((NetworkSession::new(core, Box::new(HostDispatcher)), rx))
    }

    /// Joins a session whose host approved this peer.
    ///
    /// `host_connection` is the connection to the host and `approval` the
    /// payload the host attached to its approval. `request` must be the
    /// hail this peer sent: its gamers are seated with identifiers `0..n`,
    /// mirroring what the host did. The slot settings should match the
    /// host's.
    ///
    /// # Errors
    /// A malformed approval, or one assigning the host identifier.
    pub fn join<T: TransportPeer>(
        self,
        transport: T,
        host_connection: ConnectionId,
        approval: &[u8],
        request: &JoinRequest,
    ) -> Result<(NetworkSession<T>, SessionEvents), LobbyError> {
        self.join_with_codec(transport, JsonCodec, host_connection, approval, request)
    }

    /// Joins a session with a custom codec.
    pub fn join_with_codec<T: TransportPeer, C: Codec + Clone>(
        self,
        transport: T,
        codec: C,
        host_connection: ConnectionId,
        approval: &[u8],
        request: &JoinRequest,
    ) -> Result<(NetworkSession<T, C>, SessionEvents), LobbyError> {
        let local = decode_approval(approval)?;
        if local.is_host() {
            return Err(SessionError::ProtocolViolation(
                "approval assigned the host identifier to a client".into(),
            )
            .into());
        }
        let (config, discovery) = self.finish(false, &codec)?;

        let mut registry = Registry::new();
        registry.add_machine(Machine::new(MachineId::HOST, false))?;
        registry.add_machine(Machine::new(local, true))?;
        let mut seated = Vec::with_capacity(request.gamers.len());
        for (index, profile) in request.gamers.iter().cloned().enumerate() {
            let gamer = Gamer::new(GamerId(index as u8), local, profile, false);
            seated.push(gamer.to_info());
            registry.admit_gamer(gamer)?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut core = SessionCore::new(
            transport, codec, config, registry, local, discovery, None, tx,
        );
        core.associate(host_connection, MachineId::HOST);
        info!(local_machine = %local, %host_connection, gamers = seated.len(), "joined session");

        core.emit(SessionEvent::MachineJoined {
            machine_id: MachineId::HOST,
        });
        core.emit(SessionEvent::MachineJoined { machine_id: local });
        for gamer in seated {
            core.emit(SessionEvent::GamerJoined {
                machine_id: local,
                gamer,
                is_local: true,
            });
        }
        core.publish_snapshot();

        Ok((NetworkSession::new(core, Box::new(ClientDispatcher)), rx))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A hosted or joined session.
///
/// Owned by one thread, which calls [`pump`](Self::pump) every tick. Other
/// threads observe it through [`snapshots`](Self::snapshots).
///
/// Dropping a live session ends it with [`EndReason::Disconnected`].
pub struct NetworkSession<T: TransportPeer, C: Codec + Clone = JsonCodec> {
    core: SessionCore<T, C>,
    role: Box<dyn RoleDispatcher<T, C>>,
}

impl<T: TransportPeer, C: Codec + Clone> NetworkSession<T, C> {
    fn new(core: SessionCore<T, C>, role: Box<dyn RoleDispatcher<T, C>>) -> Self {
        Self { core, role }
    }

    /// Drains every queued transport event, then commits pending gamers,
    /// purges expired tombstones and refreshes the discovery registration
    /// with the membership that results.
    ///
    /// Stops early when an event ends the session.
    ///
    /// # Errors
    /// [`SessionError::Disposed`] once the session has ended. Any other
    /// error is fatal: the session is torn down before it is returned.
    pub fn pump(&mut self) -> Result<(), LobbyError> {
        self.core.ensure_live()?;

        while let Some(event) = self.core.transport.poll() {
            let result = dispatch(&mut self.core, self.role.as_ref(), &event);
            self.core.transport.recycle(event);
            if let Err(e) = result {
                return Err(self.fail(e));
            }
            if self.core.disposed {
                return Ok(());
            }
        }

        if let Err(e) = self.core.maintain() {
            return Err(self.fail(e));
        }
        Ok(())
    }

    fn fail(&mut self, e: LobbyError) -> LobbyError {
        error!(error = %e, local_machine = %self.core.local_machine, "fatal session error");
        self.core.teardown(EndReason::Disconnected);
        e
    }

    // -- Accessors ----------------------------------------------------------

    /// Where the session is in its lifecycle.
    pub fn state(&self) -> SessionState {
        self.core.lifecycle.state()
    }

    /// `true` when the local machine hosts.
    pub fn is_host(&self) -> bool {
        self.core.is_host()
    }

    /// `true` once the session has ended; every further operation fails.
    pub fn is_disposed(&self) -> bool {
        self.core.disposed
    }

    /// The identifier the host assigned to this machine.
    pub fn local_machine_id(&self) -> MachineId {
        self.core.local_machine
    }

    /// The settings the session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    /// A machine that has not been removed.
    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.core.registry.machine(id)
    }

    /// Machines that have not been removed, in identifier order.
    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.core.registry.machines()
    }

    /// Gamers currently in the session, in machine then gamer order.
    pub fn gamers(&self) -> impl Iterator<Item = &Gamer> {
        self.core.registry.gamers()
    }

    /// A gamer currently in the session. Pending and departed gamers are
    /// not returned.
    pub fn gamer(&self, machine_id: MachineId, gamer_id: GamerId) -> Option<&Gamer> {
        self.core
            .registry
            .gamer(machine_id, gamer_id)
            .filter(|g| g.state.is_added())
            .filter(|_| self.core.registry.machine(machine_id).is_some())
    }

    /// Public slots not held by admitted gamers.
    pub fn open_public_slots(&self) -> i32 {
        self.core.usage().open_public
    }

    /// Private slots not held by admitted gamers.
    pub fn open_private_slots(&self) -> i32 {
        self.core.usage().open_private
    }

    /// Open slots available to the gamers of `id`.
    pub fn open_slots_for_machine(&self, id: MachineId) -> Option<i32> {
        let machine = self.core.registry.machine(id)?;
        Some(self.core.usage().open_slots_for(machine))
    }

    /// What the session advertises, computed from admitted membership.
    pub fn public_info(&self) -> PublicInfo {
        self.core.public_info()
    }

    /// Whether the discovery service acknowledged the last registration.
    pub fn is_registered_with_discovery(&self) -> bool {
        self.core.discovery.is_registered()
    }

    /// Set once the discovery service sent something unreadable.
    pub fn has_failed_discovery_validation(&self) -> bool {
        self.core.discovery.has_failed_validation()
    }

    /// The last general information the discovery service returned.
    pub fn discovery_general_info(&self) -> Option<&str> {
        self.core.discovery.general_info()
    }

    /// Point-in-time views of the session, refreshed at the end of every
    /// pump.
    pub fn snapshots(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.core.snapshots.subscribe()
    }

    /// The machine a connection belongs to, tombstoned machines included.
    pub fn machine_for_connection(&self, connection: ConnectionId) -> Option<MachineId> {
        self.core.connections.get(&connection).copied()
    }

    /// The connection of a live machine.
    pub fn connection_for_machine(&self, machine: MachineId) -> Option<ConnectionId> {
        self.core.connection_for(machine)
    }

    // -- Local gamers -------------------------------------------------------

    /// Seats a gamer on the local machine.
    ///
    /// The gamer is pending until the end of the next pump, when it is
    /// announced to the other machines. It takes a private slot when
    /// `prefer_private` is set and one is free; the host also falls back to
    /// a private slot when no public one is left.
    ///
    /// # Errors
    /// [`SessionError::NoOpenSlots`] when the local machine has no slot
    /// left.
    pub fn add_local_gamer(
        &mut self,
        profile: GamerProfile,
        prefer_private: bool,
    ) -> Result<GamerId, LobbyError> {
        self.core.ensure_live()?;
        let local = self.core.local_machine;
        let registry = &self.core.registry;

        let usage = self.core.usage();
        let admissible = SlotUsage {
            open_public: usage.admissible_public(registry),
            open_private: usage.admissible_private(registry),
            ..usage
        };
        let machine = registry
            .machine(local)
            .ok_or(SessionError::Disposed("machine"))?;
        let open = admissible.open_slots_for(machine);
        if open < 1 {
            return Err(SessionError::NoOpenSlots { needed: 1, open }.into());
        }
        let id = machine
            .next_gamer_id()
            .ok_or(SessionError::NoOpenSlots { needed: 1, open: 0 })?;

        let private = (prefer_private && admissible.open_private > 0) || admissible.open_public < 1;
        self.core
            .registry
            .add_gamer(Gamer::new(id, local, profile, private))?;
        info!(machine_id = %local, gamer_id = %id, private, "local gamer added");
        Ok(id)
    }

    /// Removes a local gamer and tells the other machines.
    pub fn remove_local_gamer(&mut self, gamer_id: GamerId) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        let machine_id = self.core.local_machine;
        let before = self
            .core
            .registry
            .remove_gamer(machine_id, gamer_id, Instant::now())?;
        if before.state.is_added() {
            self.core.emit(SessionEvent::GamerLeft {
                machine_id,
                gamer_id,
            });
            self.core.broadcast_system(
                SessionMessage::GamerLeft {
                    machine_id,
                    gamer_id,
                },
                None,
            )?;
        }
        Ok(())
    }

    /// Marks a local gamer ready or not ready.
    pub fn set_ready(&mut self, gamer_id: GamerId, ready: bool) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        let machine_id = self.core.local_machine;
        self.core.registry.set_ready(machine_id, gamer_id, ready)?;

        let announced = self
            .core
            .registry
            .gamer(machine_id, gamer_id)
            .is_some_and(|g| g.state.is_added());
        if announced {
            self.core.emit(SessionEvent::GamerReadyChanged {
                machine_id,
                gamer_id,
                ready,
            });
            self.core.broadcast_system(
                SessionMessage::GamerReady {
                    machine_id,
                    gamer_id,
                    ready,
                },
                None,
            )?;
        }
        Ok(())
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Moves the session from the lobby into gameplay. Host only.
    pub fn start_game(&mut self) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        self.core.ensure_host("start the game")?;
        self.core.lifecycle.start_game()?;
        info!("game started");
        self.core.emit(SessionEvent::StateChanged {
            state: self.core.lifecycle.state(),
        });
        self.core.broadcast_system(SessionMessage::GameStarted, None)
    }

    /// Returns the session to the lobby. Host only.
    pub fn end_game(&mut self) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        self.core.ensure_host("end the game")?;
        self.core.lifecycle.end_game()?;
        info!("game ended");
        self.core.emit(SessionEvent::StateChanged {
            state: self.core.lifecycle.state(),
        });
        self.core.broadcast_system(SessionMessage::GameEnded, None)
    }

    /// Ends the session for this peer.
    ///
    /// A host disconnects everyone with [`EndReason::HostEndedSession`]; a
    /// client leaves the host with `reason`.
    pub fn end(&mut self, reason: EndReason) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        self.core.teardown(reason);
        Ok(())
    }

    // -- Machines -----------------------------------------------------------

    /// Closes a remote machine's connection, telling it `reason`. Host only.
    ///
    /// The machine leaves the registry when the transport reports the
    /// disconnect.
    pub fn disconnect_machine(
        &mut self,
        machine_id: MachineId,
        reason: EndReason,
    ) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        self.core.ensure_host("disconnect machines")?;
        if machine_id == self.core.local_machine {
            return Err(SessionError::RoleViolation(
                "the host cannot disconnect itself; end the session instead".into(),
            )
            .into());
        }
        let connection = self
            .core
            .connection_for(machine_id)
            .ok_or(SessionError::UnknownMachine(machine_id))?;
        info!(%machine_id, %reason, "disconnecting machine");
        self.core.transport.disconnect(connection, reason.as_str())?;
        Ok(())
    }

    /// Removes a machine from the session.
    ///
    /// Removing the local machine ends the session. The host may remove a
    /// remote machine, which is disconnected with
    /// [`EndReason::RemovedByHost`]; clients may only remove themselves.
    ///
    /// # Errors
    /// - [`SessionError::Disposed`] after teardown, or when the machine is
    ///   already being removed
    /// - [`SessionError::RoleViolation`] for a client removing another
    ///   machine
    pub fn remove_machine(&mut self, machine_id: MachineId) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        let machine = self
            .core
            .registry
            .machine_entry(machine_id)
            .ok_or(SessionError::UnknownMachine(machine_id))?;
        if machine.is_removed() || machine.being_removed {
            return Err(SessionError::Disposed("machine").into());
        }
        let is_local = machine.is_local;
        if !is_local && !self.core.is_host() {
            return Err(SessionError::RoleViolation(
                "only the host may remove another machine".into(),
            )
            .into());
        }

        if !is_local {
            self.disconnect_machine(machine_id, EndReason::RemovedByHost)?;
        }
        if let Some(machine) = self.core.registry.machine_mut(machine_id) {
            machine.being_removed = true;
        }
        if is_local {
            self.core.teardown(EndReason::Disconnected);
        }
        Ok(())
    }

    // -- Game data ----------------------------------------------------------

    /// Sends application bytes to the addressed machines.
    ///
    /// Clients are only connected to the host, so a client can address the
    /// host or everyone it can reach.
    pub fn send_to(
        &mut self,
        recipient: Recipient,
        data: &[u8],
        method: DeliveryMethod,
    ) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        if let Recipient::Machine(target) = recipient {
            if !self.core.is_host() && !target.is_host() {
                return Err(SessionError::RoleViolation(format!(
                    "a client can only send directly to the host, not {target}"
                ))
                .into());
            }
            if target != self.core.local_machine && self.core.connection_for(target).is_none() {
                return Err(SessionError::UnknownMachine(target).into());
            }
        }

        let targets: Vec<ConnectionId> = self
            .core
            .live_connections()
            .into_iter()
            .filter(|(_, m)| recipient.includes(*m))
            .map(|(c, _)| c)
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        let bytes = self
            .core
            .encode_envelope(|seq| Envelope::game(seq, data.to_vec()))?;
        for connection in targets {
            self.core.transport.send(connection, &bytes, method)?;
        }
        Ok(())
    }

    /// Sends application bytes to every reachable machine.
    pub fn broadcast(&mut self, data: &[u8], method: DeliveryMethod) -> Result<(), LobbyError> {
        self.send_to(Recipient::All, data, method)
    }

    // -- Discovery ----------------------------------------------------------

    /// Asks the discovery service for its general information. The answer
    /// shows up in [`discovery_general_info`](Self::discovery_general_info)
    /// after a later pump.
    pub fn request_general_info(&mut self) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        self.core
            .discovery
            .request_general_info(&mut self.core.transport)?;
        Ok(())
    }

    /// Asks the discovery service for the hosts it knows.
    pub fn request_hosts(&mut self) -> Result<(), LobbyError> {
        self.core.ensure_live()?;
        self.core.discovery.request_hosts(&mut self.core.transport)?;
        Ok(())
    }
}

impl<T: TransportPeer, C: Codec + Clone> Drop for NetworkSession<T, C> {
    fn drop(&mut self) {
        if !self.core.disposed {
            self.core.teardown(EndReason::Disconnected);
        }
    }
}
