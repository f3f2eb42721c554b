//! A host and two clients in one process.
//!
//! Every session runs over a `ChannelPeer`. The `Lan` below plays the
//! network: it carries each command a session issues to the peer on the
//! other end of the link.
//!
//! Run with `RUST_LOG=debug cargo run -p lobby-demo` for the full trace.

use std::net::SocketAddr;

use netlobby::prelude::*;
use netlobby_protocol::{Codec, JsonCodec, StatusPayload};
use netlobby_transport::ConnectionStatus;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// The in-process network
// ---------------------------------------------------------------------------

struct Client {
    name: String,
    session: NetworkSession<ChannelPeer>,
    events: SessionEvents,
    driver: PeerDriver,
    /// The host's connection id for this client.
    host_side: ConnectionId,
    /// This client's connection id for the host.
    client_side: ConnectionId,
}

struct Lan {
    host: NetworkSession<ChannelPeer>,
    host_events: SessionEvents,
    host_driver: PeerDriver,
    clients: Vec<Client>,
}

fn status(connection: ConnectionId, status: ConnectionStatus, reason: Option<String>) -> TransportEvent {
    TransportEvent::StatusChanged {
        connection: Some(connection),
        payload: StatusPayload::new(status, reason).encode(),
    }
}

impl Lan {
    fn new(max_gamers: u32) -> Result<Self, LobbyError> {
        let (peer, host_driver) = ChannelPeer::pair(SocketAddr::from(([127, 0, 0, 1], 14242)));
        let (host, host_events) = SessionBuilder::new()
            .max_gamers(max_gamers)
            .session_type(SessionType::SystemLink)
            .host(peer)?;
        Ok(Self {
            host,
            host_events,
            host_driver,
            clients: Vec::new(),
        })
    }

    /// Asks the host to admit `name`. Returns `false` when it was denied.
    fn join(&mut self, name: &str, port: u16) -> Result<bool, LobbyError> {
        let request = JoinRequest::new(vec![GamerProfile::new(name, format!("{name}#{port}"))]);
        let host_side = self.host_driver.next_connection_id();
        self.host_driver.push(TransportEvent::ConnectionApproval {
            connection: host_side,
            hail: JsonCodec.encode(&request)?,
        })?;
        self.host.pump()?;

        let mut approval = None;
        for command in self.host_driver.drain_commands() {
            match command {
                PeerCommand::Approve { connection, payload } if connection == host_side => {
                    approval = Some(payload);
                }
                PeerCommand::Deny { connection, reason } if connection == host_side => {
                    info!(%name, %reason, "join denied");
                }
                other => self.route_from_host(other)?,
            }
        }
        let Some(approval) = approval else {
            return Ok(false);
        };

        let (peer, driver) = ChannelPeer::pair(SocketAddr::from(([127, 0, 0, 1], port)));
        let client_side = driver.next_connection_id();
        let (session, events) = SessionBuilder::new()
            .max_gamers(self.host.config().slots.max_gamers())
            .session_type(SessionType::SystemLink)
            .join(peer, client_side, &approval, &request)?;
        self.clients.push(Client {
            name: name.to_owned(),
            session,
            events,
            driver,
            host_side,
            client_side,
        });

        self.host_driver
            .push(status(host_side, ConnectionStatus::Connected, None))?;
        Ok(true)
    }

    fn route_from_host(&self, command: PeerCommand) -> Result<(), LobbyError> {
        let connection = match &command {
            PeerCommand::Send { connection, .. } | PeerCommand::Disconnect { connection, .. } => {
                *connection
            }
            _ => return Ok(()),
        };
        let Some(client) = self.clients.iter().find(|c| c.host_side == connection) else {
            return Ok(());
        };
        let event = match command {
            PeerCommand::Send { data, method, .. } => TransportEvent::Data {
                connection: client.client_side,
                method,
                data,
            },
            PeerCommand::Disconnect { reason, .. } => {
                status(client.client_side, ConnectionStatus::Disconnected, Some(reason))
            }
            _ => return Ok(()),
        };
        // A client that already left has dropped its driver.
        let _ = client.driver.push(event);
        Ok(())
    }

    /// Pumps every session once and carries the traffic they produced.
    fn tick(&mut self) -> Result<(), LobbyError> {
        if !self.host.is_disposed() {
            self.host.pump()?;
        }
        for client in &mut self.clients {
            if !client.session.is_disposed() {
                client.session.pump()?;
            }
        }

        for command in self.host_driver.drain_commands() {
            self.route_from_host(command)?;
        }
        for client in &mut self.clients {
            for command in client.driver.drain_commands() {
                let event = match command {
                    PeerCommand::Send {
                        data, method, ..
                    } => TransportEvent::Data {
                        connection: client.host_side,
                        method,
                        data,
                    },
                    PeerCommand::Disconnect { reason, .. } => {
                        status(client.host_side, ConnectionStatus::Disconnected, Some(reason))
                    }
                    _ => continue,
                };
                self.host_driver.push(event)?;
            }
        }
        Ok(())
    }

    fn settle(&mut self) -> Result<(), LobbyError> {
        for _ in 0..4 {
            self.tick()?;
        }
        Ok(())
    }

    fn log_events(&mut self) {
        while let Ok(event) = self.host_events.try_recv() {
            info!(peer = "host", ?event);
        }
        for client in &mut self.clients {
            while let Ok(event) = client.events.try_recv() {
                info!(peer = %client.name, ?event);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// What each peer saw, for the summary and the tests.
#[derive(Debug)]
struct Outcome {
    host_gamers_in_lobby: usize,
    client_views: Vec<usize>,
    denied: bool,
    host_state: SessionState,
    client_states: Vec<SessionState>,
}

fn run() -> Result<Outcome, LobbyError> {
    let mut lan = Lan::new(4)?;

    lan.host
        .add_local_gamer(GamerProfile::new("Hostess", "hostess#14242"), false)?;
    lan.settle()?;

    lan.join("alice", 15001)?;
    lan.settle()?;
    lan.join("bob", 15002)?;
    lan.settle()?;

    // Alice brings a guest on her machine: the last free slot.
    lan.clients[0]
        .session
        .add_local_gamer(GamerProfile::new("alice's friend", "guest#15001"), false)?;
    lan.settle()?;
    let denied = !lan.join("carol", 15003)?;
    lan.log_events();

    let host_gamers_in_lobby = lan.host.gamers().count();
    let client_views = lan
        .clients
        .iter()
        .map(|c| c.session.gamers().count())
        .collect();

    for client in &mut lan.clients {
        client.session.set_ready(GamerId(0), true)?;
    }
    lan.settle()?;
    lan.host.start_game()?;
    lan.host.broadcast(b"round 1", DeliveryMethod::ReliableOrdered)?;
    lan.settle()?;
    lan.log_events();

    lan.clients[1].session.end(EndReason::ClientSignedOut)?;
    lan.settle()?;
    lan.host.end(EndReason::HostEndedSession)?;
    lan.settle()?;
    lan.log_events();

    Ok(Outcome {
        host_gamers_in_lobby,
        client_views,
        denied,
        host_state: lan.host.state(),
        client_states: lan.clients.iter().map(|c| c.session.state()).collect(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let outcome = run()?;
    info!(?outcome, "demo finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_everyone_converges_then_ends() {
        let outcome = run().unwrap();

        assert_eq!(outcome.host_gamers_in_lobby, 4);
        assert_eq!(outcome.client_views, vec![4, 4]);
        assert!(outcome.denied);
        assert_eq!(
            outcome.host_state,
            SessionState::Ended(EndReason::HostEndedSession)
        );
        assert_eq!(
            outcome.client_states,
            vec![
                SessionState::Ended(EndReason::HostEndedSession),
                SessionState::Ended(EndReason::ClientSignedOut),
            ]
        );
    }
}
