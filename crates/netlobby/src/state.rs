//! State shared by both dispatcher roles.
//!
//! `SessionCore` is everything a session owns: the transport, the
//! registry, the lifecycle, the connection map and the discovery client.
//! It is mutated only from the pump (or from a local operation on the same
//! thread), so nothing here locks.

use std::collections::HashMap;
use std::sync::Arc;

use netlobby_discovery::{DiscoveryClient, RegistrationHeartbeat};
use netlobby_protocol::{
    Codec, EndReason, Envelope, HostAdvert, HostId, MachineId, PublicInfo, SessionMessage,
};
use netlobby_session::{
    Lifecycle, Registry, SessionConfig, SessionError, SessionSnapshot, SlotUsage, public_info,
};
use netlobby_transport::{ConnectionId, DeliveryMethod, TransportPeer};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{LobbyError, SessionEvent};

pub(crate) struct SessionCore<T: TransportPeer, C: Codec + Clone> {
    pub(crate) transport: T,
    pub(crate) codec: C,
    pub(crate) config: SessionConfig,
    pub(crate) registry: Registry,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) local_machine: MachineId,
    /// Which machine each connection belongs to. Entries outlive the
    /// machine until its tombstone is purged.
    pub(crate) connections: HashMap<ConnectionId, MachineId>,
    pub(crate) discovery: DiscoveryClient<C>,
    pub(crate) heartbeat: RegistrationHeartbeat,
    /// Set on hosts only.
    pub(crate) host_id: Option<HostId>,
    pub(crate) events: mpsc::UnboundedSender<SessionEvent>,
    pub(crate) snapshots: watch::Sender<Arc<SessionSnapshot>>,
    pub(crate) disposed: bool,
    seq: u64,
}

impl<T: TransportPeer, C: Codec + Clone> SessionCore<T, C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transport: T,
        codec: C,
        config: SessionConfig,
        registry: Registry,
        local_machine: MachineId,
        discovery: DiscoveryClient<C>,
        host_id: Option<HostId>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let heartbeat = RegistrationHeartbeat::new(config.registration_interval);
        let lifecycle = Lifecycle::new();
        let snapshot = SessionSnapshot::capture(lifecycle.state(), local_machine, &config, &registry);
        let (snapshots, _) = watch::channel(Arc::new(snapshot));
        Self {
            transport,
            codec,
            config,
            registry,
            lifecycle,
            local_machine,
            connections: HashMap::new(),
            discovery,
            heartbeat,
            host_id,
            events,
            snapshots,
            disposed: false,
            seq: 0,
        }
    }

    pub(crate) fn is_host(&self) -> bool {
        self.local_machine.is_host()
    }

    pub(crate) fn ensure_live(&self) -> Result<(), SessionError> {
        if self.disposed {
            Err(SessionError::Disposed("session"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_host(&self, operation: &str) -> Result<(), SessionError> {
        if self.is_host() {
            Ok(())
        } else {
            Err(SessionError::RoleViolation(format!(
                "only the host may {operation}"
            )))
        }
    }

    /// Raises a notification. A dropped receiver is not an error.
    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn usage(&self) -> SlotUsage {
        SlotUsage::count(&self.config.slots, &self.registry)
    }

    pub(crate) fn public_info(&self) -> PublicInfo {
        public_info(&self.config, &self.registry)
    }

    pub(crate) fn publish_snapshot(&self) {
        let snapshot = SessionSnapshot::capture(
            self.lifecycle.state(),
            self.local_machine,
            &self.config,
            &self.registry,
        );
        self.snapshots.send_replace(Arc::new(snapshot));
    }

    // -- Connection map -----------------------------------------------------

    /// Associates a connection with a machine, dropping any stale
    /// association that still points at the same identifier.
    pub(crate) fn associate(&mut self, connection: ConnectionId, machine: MachineId) {
        self.connections.retain(|_, m| *m != machine);
        self.connections.insert(connection, machine);
    }

    /// The machine a connection belongs to.
    ///
    /// # Errors
    /// [`SessionError::ProtocolViolation`] when the connection was never
    /// associated.
    pub(crate) fn machine_for(
        &self,
        connection: ConnectionId,
        event: &str,
    ) -> Result<MachineId, SessionError> {
        self.connections.get(&connection).copied().ok_or_else(|| {
            SessionError::ProtocolViolation(format!(
                "{event} on {connection}, which has no machine"
            ))
        })
    }

    /// The connection of a live machine.
    pub(crate) fn connection_for(&self, machine: MachineId) -> Option<ConnectionId> {
        self.registry.machine(machine)?;
        self.connections
            .iter()
            .find(|(_, m)| **m == machine)
            .map(|(c, _)| *c)
    }

    /// Connections of live machines, in machine order.
    pub(crate) fn live_connections(&self) -> Vec<(ConnectionId, MachineId)> {
        let mut live: Vec<_> = self
            .connections
            .iter()
            .filter(|(_, m)| self.registry.machine(**m).is_some())
            .map(|(c, m)| (*c, *m))
            .collect();
        live.sort_by_key(|(_, m)| *m);
        live
    }

    // -- Sending ------------------------------------------------------------

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn encode_envelope(&mut self, build: impl FnOnce(u64) -> Envelope) -> Result<Vec<u8>, LobbyError> {
        let envelope = build(self.next_seq());
        Ok(self.codec.encode(&envelope)?)
    }

    /// Sends a membership message to one machine.
    pub(crate) fn send_system(
        &mut self,
        to: MachineId,
        message: SessionMessage,
    ) -> Result<(), LobbyError> {
        let connection = self
            .connection_for(to)
            .ok_or(SessionError::UnknownMachine(to))?;
        let bytes = self.encode_envelope(|seq| Envelope::system(seq, message))?;
        self.transport
            .send(connection, &bytes, DeliveryMethod::ReliableOrdered)?;
        Ok(())
    }

    /// Sends a membership message to one remote machine. A failed send is
    /// logged and skipped like a failed broadcast.
    pub(crate) fn notify(&mut self, to: MachineId, message: SessionMessage) {
        if let Err(e) = self.send_system(to, message) {
            warn!(machine_id = %to, error = %e, "send failed");
        }
    }

    /// Sends a membership message to every connected machine except
    /// `except`. A send that fails for one machine is logged and skipped;
    /// that machine's disconnect is already on its way.
    pub(crate) fn broadcast_system(
        &mut self,
        message: SessionMessage,
        except: Option<MachineId>,
    ) -> Result<(), LobbyError> {
        let targets = self.live_connections();
        if targets.iter().all(|(_, m)| Some(*m) == except) {
            return Ok(());
        }
        let bytes = self.encode_envelope(|seq| Envelope::system(seq, message))?;
        for (connection, machine_id) in targets {
            if Some(machine_id) == except {
                continue;
            }
            if let Err(e) = self
                .transport
                .send(connection, &bytes, DeliveryMethod::ReliableOrdered)
            {
                warn!(%machine_id, error = %e, "broadcast send failed");
            }
        }
        Ok(())
    }

    // -- Discovery ----------------------------------------------------------

    fn advertises_online(&self) -> bool {
        self.is_host()
            && self.config.session_type.is_online()
            && self.discovery.endpoint().is_some()
    }

    pub(crate) fn advert(&self) -> Option<HostAdvert> {
        Some(HostAdvert {
            host_id: self.host_id?,
            local: true,
            public_info: self.public_info(),
        })
    }

    /// Re-registers with the discovery service when the interval has
    /// elapsed. Failures wait for the next attempt.
    fn register_if_due(&mut self, now: Instant) {
        if !self.advertises_online() {
            return;
        }
        let Some(host_id) = self.host_id else {
            return;
        };
        if !self.heartbeat.poll(now) {
            return;
        }
        let info = self.public_info();
        let internal = self.transport.local_addr();
        if let Err(e) = self
            .discovery
            .register_host(&mut self.transport, host_id, internal, info)
        {
            warn!(%host_id, error = %e, "registration with discovery service failed");
        }
    }

    fn unregister(&mut self) {
        if !self.advertises_online() || !self.heartbeat.attempted() {
            return;
        }
        if let Some(host_id) = self.host_id {
            if let Err(e) = self.discovery.unregister_host(&mut self.transport, host_id) {
                warn!(%host_id, error = %e, "unregistration failed");
            }
        }
    }

    // -- Pump tail ----------------------------------------------------------

    /// Work done once per pump after the event queue is drained.
    pub(crate) fn maintain(&mut self) -> Result<(), LobbyError> {
        let now = Instant::now();

        for gamer in self.registry.commit_pending() {
            let is_local = gamer.machine_id == self.local_machine;
            self.emit(SessionEvent::GamerJoined {
                machine_id: gamer.machine_id,
                gamer: gamer.to_info(),
                is_local,
            });
            if is_local {
                self.broadcast_system(
                    SessionMessage::GamerJoined {
                        machine_id: gamer.machine_id,
                        gamer: gamer.to_info(),
                    },
                    None,
                )?;
            }
        }

        let purged = self.registry.purge_tombstones(now, self.config.tombstone_ttl);
        if !purged.is_empty() {
            self.connections.retain(|_, m| !purged.contains(m));
        }

        self.register_if_due(now);
        self.publish_snapshot();
        Ok(())
    }

    // -- Teardown -----------------------------------------------------------

    /// Ends the session with `reason` and releases its connections.
    ///
    /// Best-effort throughout: transport and discovery failures are logged.
    /// Hosts tell every peer `HostEndedSession`; clients pass their own
    /// reason to the host.
    pub(crate) fn teardown(&mut self, reason: EndReason) {
        if self.disposed {
            return;
        }
        if let Err(e) = self.lifecycle.end(reason) {
            debug!(error = %e, "lifecycle already ended");
        }

        let remote_reason = if self.is_host() {
            EndReason::HostEndedSession
        } else {
            reason
        };
        for (connection, machine_id) in self.live_connections() {
            if let Err(e) = self.transport.disconnect(connection, remote_reason.as_str()) {
                debug!(%machine_id, error = %e, "disconnect during teardown failed");
            }
        }

        self.unregister();
        self.disposed = true;
        info!(%reason, local_machine = %self.local_machine, "session disposed");
        self.emit(SessionEvent::SessionEnded { reason });
        self.publish_snapshot();
    }
}
