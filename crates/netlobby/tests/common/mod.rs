//! Helpers shared by the session integration tests.
//!
//! Sessions run over a `ChannelPeer`; the test plays the transport through
//! the matching `PeerDriver`, pushing events in and reading the commands the
//! session issued.

#![allow(dead_code)]

use std::net::SocketAddr;

use netlobby::prelude::*;
use netlobby_protocol::{Codec, Envelope, JsonCodec, Payload, SessionMessage, StatusPayload, decode_approval};
use netlobby_transport::ConnectionStatus;

pub const HOST_ADDR: &str = "127.0.0.1:14242";
pub const CLIENT_ADDR: &str = "127.0.0.1:14243";
pub const DISCOVERY_ADDR: &str = "127.0.0.1:14343";

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub fn profile(name: &str) -> GamerProfile {
    GamerProfile::new(name, format!("{name}#1"))
}

// =========================================================================
// Events pushed into a peer
// =========================================================================

pub fn status(connection: ConnectionId, status: ConnectionStatus, reason: Option<&str>) -> TransportEvent {
    TransportEvent::StatusChanged {
        connection: Some(connection),
        payload: StatusPayload::new(status, reason.map(String::from)).encode(),
    }
}

pub fn connected(connection: ConnectionId) -> TransportEvent {
    status(connection, ConnectionStatus::Connected, None)
}

pub fn disconnected(connection: ConnectionId, reason: Option<&str>) -> TransportEvent {
    status(connection, ConnectionStatus::Disconnected, reason)
}

pub fn approval_request(connection: ConnectionId, gamers: &[GamerProfile]) -> TransportEvent {
    TransportEvent::ConnectionApproval {
        connection,
        hail: JsonCodec.encode(&JoinRequest::new(gamers.to_vec())).unwrap(),
    }
}

pub fn system(connection: ConnectionId, message: SessionMessage) -> TransportEvent {
    TransportEvent::Data {
        connection,
        method: DeliveryMethod::ReliableOrdered,
        data: JsonCodec.encode(&Envelope::system(1, message)).unwrap(),
    }
}

pub fn game(connection: ConnectionId, method: DeliveryMethod, data: &[u8]) -> TransportEvent {
    TransportEvent::Data {
        connection,
        method,
        data: JsonCodec.encode(&Envelope::game(1, data.to_vec())).unwrap(),
    }
}

// =========================================================================
// Reading what came out
// =========================================================================

pub fn drain_events(events: &mut SessionEvents) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// System messages among `commands`, with the connection they were sent on.
pub fn sent_system(commands: &[PeerCommand]) -> Vec<(ConnectionId, SessionMessage)> {
    commands
        .iter()
        .filter_map(|cmd| match cmd {
            PeerCommand::Send {
                connection, data, ..
            } => {
                let envelope: Envelope = JsonCodec.decode(data).unwrap();
                match envelope.payload {
                    Payload::System(message) => Some((*connection, message)),
                    Payload::Game(_) => None,
                }
            }
            _ => None,
        })
        .collect()
}

/// System messages sent on one connection.
pub fn sent_to(commands: &[PeerCommand], connection: ConnectionId) -> Vec<SessionMessage> {
    sent_system(commands)
        .into_iter()
        .filter(|(c, _)| *c == connection)
        .map(|(_, m)| m)
        .collect()
}

// =========================================================================
// Sessions
// =========================================================================

pub fn host_with(builder: SessionBuilder) -> (NetworkSession<ChannelPeer>, SessionEvents, PeerDriver) {
    let (peer, driver) = ChannelPeer::pair(addr(HOST_ADDR));
    let (session, events) = builder.host(peer).unwrap();
    (session, events, driver)
}

pub fn host(max_gamers: u32, private_gamer_slots: u32) -> (NetworkSession<ChannelPeer>, SessionEvents, PeerDriver) {
    host_with(
        SessionBuilder::new()
            .max_gamers(max_gamers)
            .private_gamer_slots(private_gamer_slots)
            .session_type(SessionType::SystemLink),
    )
}

/// Asks the host to admit a machine with `gamers` and pumps once.
///
/// Returns the new connection with the assigned id, or the denial text.
pub fn request_join(
    session: &mut NetworkSession<ChannelPeer>,
    driver: &mut PeerDriver,
    gamers: &[GamerProfile],
) -> Result<(ConnectionId, MachineId), String> {
    let connection = driver.next_connection_id();
    driver.push(approval_request(connection, gamers)).unwrap();
    session.pump().unwrap();

    for cmd in driver.drain_commands() {
        match cmd {
            PeerCommand::Approve {
                connection: c,
                payload,
            } if c == connection => return Ok((connection, decode_approval(&payload).unwrap())),
            PeerCommand::Deny {
                connection: c,
                reason,
            } if c == connection => return Err(reason),
            _ => {}
        }
    }
    panic!("join request was neither approved nor denied");
}

/// Joins a machine and completes its connection.
pub fn join_connected(
    session: &mut NetworkSession<ChannelPeer>,
    driver: &mut PeerDriver,
    name: &str,
) -> (ConnectionId, MachineId) {
    let (connection, machine_id) = request_join(session, driver, &[profile(name)]).unwrap();
    driver.push(connected(connection)).unwrap();
    session.pump().unwrap();
    (connection, machine_id)
}

/// A client session approved as `machine_id` with one gamer.
pub fn client(machine_id: MachineId) -> (NetworkSession<ChannelPeer>, SessionEvents, PeerDriver, ConnectionId) {
    let (peer, driver) = ChannelPeer::pair(addr(CLIENT_ADDR));
    let host_connection = driver.next_connection_id();
    let request = JoinRequest::new(vec![profile("client")]);
    let (session, events) = SessionBuilder::new()
        .max_gamers(4)
        .session_type(SessionType::SystemLink)
        .join(
            peer,
            host_connection,
            &netlobby_protocol::encode_approval(machine_id),
            &request,
        )
        .unwrap();
    (session, events, driver, host_connection)
}
