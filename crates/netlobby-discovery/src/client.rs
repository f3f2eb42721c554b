//! Client side of the discovery/registration contract.
//!
//! Calls go out as unconnected datagrams to one resolved endpoint.
//! Responses come back through the transport's unconnected-data events
//! and are fed to [`DiscoveryClient::handle_unconnected`]; nothing here
//! waits for a reply.
//!
//! Responses are untrusted input. A datagram from any address other than
//! the endpoint is ignored outright. A response from the endpoint that
//! does not validate sets a flag instead of failing.

use std::net::SocketAddr;

use netlobby_protocol::{
    Codec, DiscoveryRequest, DiscoveryResponse, HostAdvert, HostId, PublicInfo, ResponseKind,
    ResponseResult,
};
use netlobby_transport::TransportPeer;
use tracing::{debug, info, warn};

use crate::DiscoveryError;

pub struct DiscoveryClient<C: Codec> {
    endpoint: Option<SocketAddr>,
    codec: C,
    registered: bool,
    validation_failed: bool,
    general_info: Option<String>,
}

impl<C: Codec> DiscoveryClient<C> {
    pub fn new(endpoint: Option<SocketAddr>, codec: C) -> Self {
        Self {
            endpoint,
            codec,
            registered: false,
            validation_failed: false,
            general_info: None,
        }
    }

    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    /// Confirmed by the service, not merely requested.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn has_failed_validation(&self) -> bool {
        self.validation_failed
    }

    pub fn general_info(&self) -> Option<&str> {
        self.general_info.as_deref()
    }

    // -- Calls --------------------------------------------------------------

    pub fn request_hosts<T: TransportPeer>(&self, peer: &mut T) -> Result<(), DiscoveryError> {
        self.call(peer, &DiscoveryRequest::RequestHosts)
    }

    pub fn register_host<T: TransportPeer>(
        &self,
        peer: &mut T,
        host_id: HostId,
        internal_address: SocketAddr,
        public_info: PublicInfo,
    ) -> Result<(), DiscoveryError> {
        debug!(%host_id, %internal_address, "registering host");
        self.call(
            peer,
            &DiscoveryRequest::RegisterHost {
                host_id,
                internal_address,
                public_info,
            },
        )
    }

    pub fn unregister_host<T: TransportPeer>(
        &self,
        peer: &mut T,
        host_id: HostId,
    ) -> Result<(), DiscoveryError> {
        debug!(%host_id, "unregistering host");
        self.call(peer, &DiscoveryRequest::UnregisterHost { host_id })
    }

    pub fn request_general_info<T: TransportPeer>(
        &self,
        peer: &mut T,
    ) -> Result<(), DiscoveryError> {
        self.call(peer, &DiscoveryRequest::RequestGeneralInfo)
    }

    /// Answers a LAN discovery probe directly to the prober.
    pub fn reply_probe<T: TransportPeer>(
        &self,
        peer: &mut T,
        to: SocketAddr,
        advert: &HostAdvert,
    ) -> Result<(), DiscoveryError> {
        let bytes = self.codec.encode(advert)?;
        peer.send_unconnected(to, &bytes)?;
        Ok(())
    }

    fn call<T: TransportPeer>(
        &self,
        peer: &mut T,
        request: &DiscoveryRequest,
    ) -> Result<(), DiscoveryError> {
        let endpoint = self.endpoint.ok_or(DiscoveryError::NoEndpoint)?;
        let bytes = self.codec.encode(request)?;
        peer.send_unconnected(endpoint, &bytes)?;
        Ok(())
    }

    // -- Responses ----------------------------------------------------------

    /// Processes an unconnected datagram. Returns the response when it
    /// came from the endpoint and validated.
    pub fn handle_unconnected(
        &mut self,
        from: SocketAddr,
        data: &[u8],
    ) -> Option<DiscoveryResponse> {
        if self.endpoint != Some(from) {
            debug!(%from, "unconnected data not from discovery service, ignoring");
            return None;
        }

        let response: DiscoveryResponse = match self.codec.decode(data) {
            Ok(response) => response,
            Err(e) => {
                warn!(%from, error = %e, "discovery response failed validation");
                self.validation_failed = true;
                return None;
            }
        };

        if response.result == ResponseResult::Fail {
            warn!(kind = ?response.kind, "discovery service reported failure");
            self.validation_failed = true;
            return None;
        }

        match response.kind {
            ResponseKind::GeneralInfo => match &response.general_info {
                Some(text) => self.general_info = Some(text.clone()),
                None => {
                    warn!("general info response without info");
                    self.validation_failed = true;
                    return None;
                }
            },
            ResponseKind::RegisterHost => {
                if !self.registered {
                    info!("registered with discovery service");
                }
                self.registered = true;
            }
            ResponseKind::UnregisterHost => {
                info!("unregistered from discovery service");
                self.registered = false;
            }
        }
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlobby_protocol::JsonCodec;
    use netlobby_transport::{ChannelPeer, PeerCommand};

    fn service() -> SocketAddr {
        "10.0.0.1:14343".parse().unwrap()
    }

    fn client() -> DiscoveryClient<JsonCodec> {
        DiscoveryClient::new(Some(service()), JsonCodec)
    }

    fn encode(resp: &DiscoveryResponse) -> Vec<u8> {
        JsonCodec.encode(resp).unwrap()
    }

    #[test]
    fn test_handle_unconnected_register_ok_sets_flag() {
        let mut c = client();
        let resp = c.handle_unconnected(service(), &encode(&DiscoveryResponse::ok(ResponseKind::RegisterHost)));
        assert!(resp.is_some());
        assert!(c.is_registered());

        c.handle_unconnected(service(), &encode(&DiscoveryResponse::ok(ResponseKind::UnregisterHost)));
        assert!(!c.is_registered());
        assert!(!c.has_failed_validation());
    }

    #[test]
    fn test_handle_unconnected_general_info_cached() {
        let mut c = client();
        c.handle_unconnected(service(), &encode(&DiscoveryResponse::general_info("maintenance at 6")));
        assert_eq!(c.general_info(), Some("maintenance at 6"));
    }

    #[test]
    fn test_handle_unconnected_garbage_sets_validation_failed() {
        let mut c = client();
        assert!(c.handle_unconnected(service(), b"not json").is_none());
        assert!(c.has_failed_validation());
        assert!(!c.is_registered());
    }

    #[test]
    fn test_handle_unconnected_fail_result_sets_validation_failed() {
        let mut c = client();
        c.handle_unconnected(service(), &encode(&DiscoveryResponse::fail(ResponseKind::RegisterHost)));
        assert!(c.has_failed_validation());
        assert!(!c.is_registered());
    }

    #[test]
    fn test_handle_unconnected_general_info_missing_text_fails_validation() {
        let mut c = client();
        c.handle_unconnected(service(), &encode(&DiscoveryResponse::ok(ResponseKind::GeneralInfo)));
        assert!(c.has_failed_validation());
        assert_eq!(c.general_info(), None);
    }

    #[test]
    fn test_handle_unconnected_foreign_sender_changes_nothing() {
        let mut c = client();
        let stranger: SocketAddr = "10.0.0.99:14343".parse().unwrap();
        c.handle_unconnected(stranger, &encode(&DiscoveryResponse::ok(ResponseKind::RegisterHost)));
        c.handle_unconnected(stranger, b"garbage");
        assert!(!c.is_registered());
        assert!(!c.has_failed_validation());
    }

    #[test]
    fn test_call_without_endpoint_is_no_endpoint() {
        let (mut peer, _driver) = ChannelPeer::pair("127.0.0.1:1".parse().unwrap());
        let c = DiscoveryClient::new(None, JsonCodec);
        assert!(matches!(
            c.request_hosts(&mut peer),
            Err(DiscoveryError::NoEndpoint)
        ));
    }

    #[test]
    fn test_register_host_sends_to_endpoint() {
        let local: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let (mut peer, mut driver) = ChannelPeer::pair(local);
        let c = client();
        let info = PublicInfo {
            session_type: netlobby_protocol::SessionType::Ranked,
            properties: Default::default(),
            host_display_name: "h".into(),
            max_gamers: 2,
            private_gamer_slots: 0,
            current_gamer_count: 1,
            open_private_slots: 0,
            open_public_slots: 1,
        };
        c.register_host(&mut peer, HostId(1), local, info.clone()).unwrap();

        match driver.try_command() {
            Some(PeerCommand::SendUnconnected { to, data }) => {
                assert_eq!(to, service());
                let req: DiscoveryRequest = JsonCodec.decode(&data).unwrap();
                assert_eq!(
                    req,
                    DiscoveryRequest::RegisterHost {
                        host_id: HostId(1),
                        internal_address: local,
                        public_info: info,
                    }
                );
            }
            other => panic!("expected unconnected send, got {other:?}"),
        }
    }
}
