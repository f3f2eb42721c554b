//! Call/response contract with the discovery/registration service, plus
//! the advert a host returns to LAN discovery probes.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{HostId, PublicInfo};

/// A call sent out-of-band to the discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryRequest {
    RequestHosts,
    RegisterHost {
        host_id: HostId,
        internal_address: SocketAddr,
        public_info: PublicInfo,
    },
    UnregisterHost {
        host_id: HostId,
    },
    RequestGeneralInfo,
}

/// Which call a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    GeneralInfo,
    RegisterHost,
    UnregisterHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseResult {
    Ok,
    Fail,
}

/// A reply from the discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub kind: ResponseKind,
    pub result: ResponseResult,
    /// Present on `GeneralInfo` responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_info: Option<String>,
}

impl DiscoveryResponse {
    pub fn ok(kind: ResponseKind) -> Self {
        Self {
            kind,
            result: ResponseResult::Ok,
            general_info: None,
        }
    }

    pub fn fail(kind: ResponseKind) -> Self {
        Self {
            kind,
            result: ResponseResult::Fail,
            general_info: None,
        }
    }

    pub fn general_info(info: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::GeneralInfo,
            result: ResponseResult::Ok,
            general_info: Some(info.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == ResponseResult::Ok
    }
}

/// A host's answer to a discovery probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAdvert {
    pub host_id: HostId,
    /// `true` when the answer comes from the local network.
    pub local: bool,
    pub public_info: PublicInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_tagged_by_type() {
        let value =
            serde_json::to_value(DiscoveryRequest::UnregisterHost { host_id: HostId(9) })
                .unwrap();
        assert_eq!(value["type"], "UnregisterHost");
        assert_eq!(value["host_id"], 9);
    }

    #[test]
    fn test_response_general_info_defaults_to_none() {
        let parsed: DiscoveryResponse =
            serde_json::from_str(r#"{"kind":"RegisterHost","result":"Ok"}"#).unwrap();
        assert_eq!(parsed, DiscoveryResponse::ok(ResponseKind::RegisterHost));
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_response_unknown_kind_fails_to_parse() {
        let parsed: Result<DiscoveryResponse, _> =
            serde_json::from_str(r#"{"kind":"Bogus","result":"Ok"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_general_info_constructor() {
        let resp = DiscoveryResponse::general_info("motd");
        assert_eq!(resp.kind, ResponseKind::GeneralInfo);
        assert_eq!(resp.general_info.as_deref(), Some("motd"));
        assert!(!DiscoveryResponse::fail(ResponseKind::GeneralInfo).is_ok());
    }
}
