//! Versioned code tables for end reasons and join errors.
//!
//! Each value has a numeric code (used in serialized messages) and a
//! stable name (used where the transport only carries text: denial
//! reasons and disconnect reasons). Both columns are frozen for
//! [`WIRE_VERSION`](crate::WIRE_VERSION) 1; new values may only be
//! appended.
//!
//! | EndReason          | code |
//! |--------------------|------|
//! | `ClientSignedOut`  | 0    |
//! | `HostEndedSession` | 1    |
//! | `RemovedByHost`    | 2    |
//! | `Disconnected`     | 3    |
//!
//! | JoinError            | code |
//! |----------------------|------|
//! | `SessionNotFound`    | 0    |
//! | `SessionNotJoinable` | 1    |
//! | `SessionFull`        | 2    |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Why a session ended for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EndReason {
    ClientSignedOut,
    HostEndedSession,
    RemovedByHost,
    #[default]
    Disconnected,
}

impl EndReason {
    const TABLE: [(EndReason, u8, &'static str); 4] = [
        (EndReason::ClientSignedOut, 0, "ClientSignedOut"),
        (EndReason::HostEndedSession, 1, "HostEndedSession"),
        (EndReason::RemovedByHost, 2, "RemovedByHost"),
        (EndReason::Disconnected, 3, "Disconnected"),
    ];

    pub fn code(self) -> u8 {
        match self {
            Self::ClientSignedOut => 0,
            Self::HostEndedSession => 1,
            Self::RemovedByHost => 2,
            Self::Disconnected => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(r, _, _)| *r)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientSignedOut => "ClientSignedOut",
            Self::HostEndedSession => "HostEndedSession",
            Self::RemovedByHost => "RemovedByHost",
            Self::Disconnected => "Disconnected",
        }
    }

    /// Parses reason text received from a remote peer.
    ///
    /// Accepts the stable name or the decimal code. Returns `None` for
    /// anything else; callers substitute [`EndReason::Disconnected`].
    pub fn parse_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(reason) = text.parse() {
            return Some(reason);
        }
        text.parse::<u8>().ok().and_then(Self::from_code)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndReason {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::TABLE
            .iter()
            .find(|(_, _, name)| *name == s)
            .map(|(r, _, _)| *r)
            .ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("unknown end reason {s:?}"))
            })
    }
}

impl From<EndReason> for u8 {
    fn from(reason: EndReason) -> u8 {
        reason.code()
    }
}

impl TryFrom<u8> for EndReason {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(ProtocolError::UnknownCode {
            table: "end reason",
            code,
        })
    }
}

/// Why a join attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum JoinError {
    SessionNotFound,
    SessionNotJoinable,
    SessionFull,
}

impl JoinError {
    pub fn code(self) -> u8 {
        match self {
            Self::SessionNotFound => 0,
            Self::SessionNotJoinable => 1,
            Self::SessionFull => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::SessionNotFound),
            1 => Some(Self::SessionNotJoinable),
            2 => Some(Self::SessionFull),
            _ => None,
        }
    }

    /// The literal denial text sent with a refused connection.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionNotFound => "SessionNotFound",
            Self::SessionNotJoinable => "SessionNotJoinable",
            Self::SessionFull => "SessionFull",
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinError {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SessionNotFound" => Ok(Self::SessionNotFound),
            "SessionNotJoinable" => Ok(Self::SessionNotJoinable),
            "SessionFull" => Ok(Self::SessionFull),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown join error {other:?}"
            ))),
        }
    }
}

impl From<JoinError> for u8 {
    fn from(err: JoinError) -> u8 {
        err.code()
    }
}

impl TryFrom<u8> for JoinError {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(ProtocolError::UnknownCode {
            table: "join error",
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_codes_are_frozen() {
        assert_eq!(EndReason::ClientSignedOut.code(), 0);
        assert_eq!(EndReason::HostEndedSession.code(), 1);
        assert_eq!(EndReason::RemovedByHost.code(), 2);
        assert_eq!(EndReason::Disconnected.code(), 3);
    }

    #[test]
    fn test_end_reason_names_match_table() {
        for (reason, code, name) in EndReason::TABLE {
            assert_eq!(reason.as_str(), name);
            assert_eq!(EndReason::from_code(code), Some(reason));
        }
    }

    #[test]
    fn test_parse_wire_accepts_name_and_code() {
        assert_eq!(
            EndReason::parse_wire("HostEndedSession"),
            Some(EndReason::HostEndedSession)
        );
        assert_eq!(EndReason::parse_wire("2"), Some(EndReason::RemovedByHost));
        assert_eq!(
            EndReason::parse_wire(" Disconnected "),
            Some(EndReason::Disconnected)
        );
    }

    #[test]
    fn test_parse_wire_rejects_unknown_text() {
        assert_eq!(EndReason::parse_wire("hostendedsession"), None);
        assert_eq!(EndReason::parse_wire("99"), None);
        assert_eq!(EndReason::parse_wire(""), None);
    }

    #[test]
    fn test_end_reason_serializes_as_code() {
        let json = serde_json::to_string(&EndReason::RemovedByHost).unwrap();
        assert_eq!(json, "2");
        let back: EndReason = serde_json::from_str("1").unwrap();
        assert_eq!(back, EndReason::HostEndedSession);
    }

    #[test]
    fn test_end_reason_unknown_code_fails_to_deserialize() {
        let result: Result<EndReason, _> = serde_json::from_str("42");
        assert!(result.is_err());
    }

    #[test]
    fn test_join_error_denial_text() {
        assert_eq!(JoinError::SessionFull.as_str(), "SessionFull");
        assert_eq!(JoinError::SessionNotJoinable.as_str(), "SessionNotJoinable");
        assert_eq!(
            "SessionFull".parse::<JoinError>().unwrap(),
            JoinError::SessionFull
        );
        assert!("Full".parse::<JoinError>().is_err());
    }

    #[test]
    fn test_join_error_code_round_trip_through_try_from() {
        for code in 0..3u8 {
            let err = JoinError::try_from(code).unwrap();
            assert_eq!(u8::from(err), code);
        }
        assert!(matches!(
            JoinError::try_from(3),
            Err(ProtocolError::UnknownCode { code: 3, .. })
        ));
    }
}
