//! Online hosts and the discovery service.

mod common;

use std::time::Duration;

use common::*;
use netlobby::prelude::*;
use netlobby_protocol::{Codec, DiscoveryRequest, DiscoveryResponse, JsonCodec, ResponseKind};
use netlobby_session::SessionError;
use tokio::time::advance;

const INTERVAL: Duration = Duration::from_secs(30);

fn online_host() -> (NetworkSession<ChannelPeer>, SessionEvents, PeerDriver) {
    host_with(
        SessionBuilder::new()
            .max_gamers(4)
            .session_type(SessionType::PlayerMatch)
            .discovery_endpoint(DISCOVERY_ADDR)
            .registration_interval(INTERVAL),
    )
}

/// Discovery requests sent to the service since the last call.
fn discovery_requests(driver: &mut PeerDriver) -> Vec<DiscoveryRequest> {
    driver
        .drain_commands()
        .into_iter()
        .filter_map(|cmd| match cmd {
            PeerCommand::SendUnconnected { to, data } if to == addr(DISCOVERY_ADDR) => {
                Some(JsonCodec.decode(&data).unwrap())
            }
            _ => None,
        })
        .collect()
}

fn registrations(driver: &mut PeerDriver) -> usize {
    discovery_requests(driver)
        .iter()
        .filter(|r| matches!(r, DiscoveryRequest::RegisterHost { .. }))
        .count()
}

fn response_from(from: &str, response: &DiscoveryResponse) -> TransportEvent {
    TransportEvent::UnconnectedData {
        from: addr(from),
        data: JsonCodec.encode(response).unwrap(),
    }
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn test_online_host_without_endpoint_is_config_error() {
    let (peer, _driver) = ChannelPeer::pair(addr(HOST_ADDR));
    let result = SessionBuilder::new()
        .session_type(SessionType::Ranked)
        .host(peer);
    assert!(matches!(
        result,
        Err(LobbyError::Session(SessionError::InvalidConfig(_)))
    ));
}

#[test]
fn test_unresolvable_endpoint_is_error() {
    let (peer, _driver) = ChannelPeer::pair(addr(HOST_ADDR));
    let result = SessionBuilder::new()
        .session_type(SessionType::PlayerMatch)
        .discovery_endpoint("no port here")
        .host(peer);
    assert!(matches!(result, Err(LobbyError::Discovery(_))));
}

#[test]
fn test_invalid_slots_rejected_by_builder() {
    let (peer, _driver) = ChannelPeer::pair(addr(HOST_ADDR));
    let result = SessionBuilder::new()
        .max_gamers(2)
        .private_gamer_slots(3)
        .host(peer);
    assert!(matches!(
        result,
        Err(LobbyError::Session(SessionError::InvalidConfig(_)))
    ));
}

#[test]
fn test_system_link_host_never_registers() {
    let (mut host, _events, mut driver) = host(4, 0);
    host.pump().unwrap();
    assert!(discovery_requests(&mut driver).is_empty());
}

// =========================================================================
// Heartbeat
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pump_registers_once_per_interval() {
    let (mut host, _events, mut driver) = online_host();

    host.pump().unwrap();
    assert_eq!(registrations(&mut driver), 1);

    advance(INTERVAL - Duration::from_millis(1)).await;
    host.pump().unwrap();
    assert_eq!(registrations(&mut driver), 0);

    advance(Duration::from_millis(2)).await;
    host.pump().unwrap();
    host.pump().unwrap();
    assert_eq!(registrations(&mut driver), 1);
}

#[tokio::test(start_paused = true)]
async fn test_registration_carries_current_public_info() {
    let (mut host, _events, mut driver) = online_host();
    host.add_local_gamer(profile("hostess"), false).unwrap();
    host.pump().unwrap();

    let request = discovery_requests(&mut driver).pop().unwrap();
    let DiscoveryRequest::RegisterHost {
        internal_address,
        public_info,
        ..
    } = request
    else {
        panic!("expected a registration, got {request:?}");
    };
    assert_eq!(internal_address, addr(HOST_ADDR));
    assert_eq!(public_info.session_type, SessionType::PlayerMatch);
    assert_eq!(public_info.current_gamer_count, 1);
    assert_eq!(public_info.host_display_name, "hostess#1");
}

// =========================================================================
// Responses
// =========================================================================

#[test]
fn test_registered_flag_follows_service_responses() {
    let (mut host, _events, driver) = online_host();
    assert!(!host.is_registered_with_discovery());

    driver
        .push(response_from(DISCOVERY_ADDR, &DiscoveryResponse::ok(ResponseKind::RegisterHost)))
        .unwrap();
    host.pump().unwrap();
    assert!(host.is_registered_with_discovery());

    driver
        .push(response_from(DISCOVERY_ADDR, &DiscoveryResponse::ok(ResponseKind::UnregisterHost)))
        .unwrap();
    host.pump().unwrap();
    assert!(!host.is_registered_with_discovery());
}

#[test]
fn test_foreign_sender_changes_no_flags() {
    let (mut host, _events, driver) = online_host();

    driver
        .push(response_from("10.9.9.9:14343", &DiscoveryResponse::ok(ResponseKind::RegisterHost)))
        .unwrap();
    driver
        .push(TransportEvent::UnconnectedData {
            from: addr("10.9.9.9:14343"),
            data: b"junk".to_vec(),
        })
        .unwrap();
    host.pump().unwrap();

    assert!(!host.is_registered_with_discovery());
    assert!(!host.has_failed_discovery_validation());
}

#[test]
fn test_malformed_response_sets_validation_flag() {
    let (mut host, _events, driver) = online_host();
    driver
        .push(TransportEvent::UnconnectedData {
            from: addr(DISCOVERY_ADDR),
            data: b"junk".to_vec(),
        })
        .unwrap();

    host.pump().unwrap();

    assert!(host.has_failed_discovery_validation());
    assert!(!host.is_disposed());
}

#[test]
fn test_general_info_request_and_response() {
    let (mut host, _events, mut driver) = online_host();

    host.request_general_info().unwrap();
    assert_eq!(
        discovery_requests(&mut driver),
        vec![DiscoveryRequest::RequestGeneralInfo]
    );

    driver
        .push(response_from(DISCOVERY_ADDR, &DiscoveryResponse::general_info("welcome")))
        .unwrap();
    host.pump().unwrap();
    assert_eq!(host.discovery_general_info(), Some("welcome"));
}

#[test]
fn test_request_hosts_without_endpoint_is_error() {
    let (mut host, _events, _driver) = host(4, 0);
    assert!(matches!(
        host.request_hosts(),
        Err(LobbyError::Discovery(_))
    ));
}

// =========================================================================
// Teardown
// =========================================================================

#[test]
fn test_end_unregisters_after_registration_attempt() {
    let (mut host, _events, mut driver) = online_host();
    host.pump().unwrap();
    discovery_requests(&mut driver);

    host.end(EndReason::HostEndedSession).unwrap();

    assert!(matches!(
        discovery_requests(&mut driver).as_slice(),
        [DiscoveryRequest::UnregisterHost { .. }]
    ));
}

#[test]
fn test_end_before_any_registration_skips_unregister() {
    let (mut host, _events, mut driver) = online_host();
    host.end(EndReason::HostEndedSession).unwrap();
    assert!(discovery_requests(&mut driver).is_empty());
}

#[test]
fn test_fatal_error_still_unregisters() {
    let (mut host, _events, mut driver) = online_host();
    host.pump().unwrap();
    discovery_requests(&mut driver);

    driver.push(connected(driver.next_connection_id())).unwrap();
    assert!(host.pump().is_err());

    assert!(matches!(
        discovery_requests(&mut driver).as_slice(),
        [DiscoveryRequest::UnregisterHost { .. }]
    ));
}
