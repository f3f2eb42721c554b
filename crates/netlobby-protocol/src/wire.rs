//! Hand-encoded sub-protocols with a fixed byte layout.
//!
//! - Approval payload: one byte, the assigned machine identifier.
//! - Denial payload: the literal [`JoinError`](crate::JoinError) name,
//!   carried as text by the transport.
//! - Status payload: one status byte followed by an optional UTF-8
//!   reason string.

use netlobby_transport::ConnectionStatus;

use crate::{EndReason, MachineId, ProtocolError};

/// Encodes the approval payload for an assigned machine identifier.
pub fn encode_approval(machine_id: MachineId) -> Vec<u8> {
    vec![machine_id.0]
}

/// Decodes an approval payload.
///
/// # Errors
/// `InvalidMessage` unless the payload is exactly one byte holding an
/// assignable identifier.
pub fn decode_approval(bytes: &[u8]) -> Result<MachineId, ProtocolError> {
    match bytes {
        [id] if MachineId(*id).is_valid() => Ok(MachineId(*id)),
        [id] => Err(ProtocolError::InvalidMessage(format!(
            "approval carries reserved machine id {id}"
        ))),
        _ => Err(ProtocolError::InvalidMessage(format!(
            "approval payload must be 1 byte, got {}",
            bytes.len()
        ))),
    }
}

/// Payload of a status-changed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPayload {
    pub status: ConnectionStatus,
    pub reason: Option<String>,
}

impl StatusPayload {
    pub fn new(status: ConnectionStatus, reason: Option<String>) -> Self {
        Self { status, reason }
    }

    pub fn encode(&self) -> Vec<u8> {
        let reason = self.reason.as_deref().unwrap_or_default();
        let mut out = Vec::with_capacity(1 + reason.len());
        out.push(self.status.code());
        out.extend_from_slice(reason.as_bytes());
        out
    }

    /// Decodes a status payload.
    ///
    /// The reason is whatever follows the status byte. Empty or non-UTF-8
    /// trailing bytes decode to no reason rather than an error, since the
    /// text comes from a remote peer.
    ///
    /// # Errors
    /// `InvalidMessage` for an empty payload, `UnknownCode` for a status
    /// byte outside the table.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (&code, rest) = bytes.split_first().ok_or_else(|| {
            ProtocolError::InvalidMessage("empty status payload".into())
        })?;
        let status = ConnectionStatus::from_code(code).ok_or(ProtocolError::UnknownCode {
            table: "connection status",
            code,
        })?;
        let reason = match std::str::from_utf8(rest) {
            Ok(text) if !text.is_empty() => Some(text.to_owned()),
            _ => None,
        };
        Ok(Self { status, reason })
    }

    /// The end reason named by the trailing text, or
    /// [`EndReason::Disconnected`] when absent or unrecognized.
    pub fn end_reason(&self) -> EndReason {
        self.reason
            .as_deref()
            .and_then(EndReason::parse_wire)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_approval_is_single_byte() {
        assert_eq!(encode_approval(MachineId(3)), vec![3]);
    }

    #[test]
    fn test_decode_approval_valid_byte() {
        assert_eq!(decode_approval(&[7]).unwrap(), MachineId(7));
    }

    #[test]
    fn test_decode_approval_wrong_length_is_invalid() {
        assert!(decode_approval(&[]).is_err());
        assert!(decode_approval(&[1, 2]).is_err());
    }

    #[test]
    fn test_decode_approval_reserved_id_is_invalid() {
        assert!(matches!(
            decode_approval(&[255]),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_status_payload_layout() {
        let payload = StatusPayload::new(
            ConnectionStatus::Disconnected,
            Some("HostEndedSession".into()),
        );
        let bytes = payload.encode();
        assert_eq!(bytes[0], ConnectionStatus::Disconnected.code());
        assert_eq!(&bytes[1..], b"HostEndedSession");
        assert_eq!(StatusPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_status_payload_without_reason() {
        let bytes = [ConnectionStatus::Connected.code()];
        let decoded = StatusPayload::decode(&bytes).unwrap();
        assert_eq!(decoded.status, ConnectionStatus::Connected);
        assert_eq!(decoded.reason, None);
    }

    #[test]
    fn test_status_payload_empty_is_error() {
        assert!(matches!(
            StatusPayload::decode(&[]),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_status_payload_unknown_status_is_error() {
        assert!(matches!(
            StatusPayload::decode(&[200]),
            Err(ProtocolError::UnknownCode { code: 200, .. })
        ));
    }

    #[test]
    fn test_status_payload_invalid_utf8_reason_is_dropped() {
        let bytes = [ConnectionStatus::Disconnected.code(), 0xff, 0xfe];
        let decoded = StatusPayload::decode(&bytes).unwrap();
        assert_eq!(decoded.reason, None);
        assert_eq!(decoded.end_reason(), EndReason::Disconnected);
    }

    #[test]
    fn test_end_reason_known_name() {
        let payload = StatusPayload::new(
            ConnectionStatus::Disconnected,
            Some("HostEndedSession".into()),
        );
        assert_eq!(payload.end_reason(), EndReason::HostEndedSession);
    }

    #[test]
    fn test_end_reason_unknown_text_defaults_to_disconnected() {
        let payload =
            StatusPayload::new(ConnectionStatus::Disconnected, Some("bye".into()));
        assert_eq!(payload.end_reason(), EndReason::Disconnected);
        let none = StatusPayload::new(ConnectionStatus::Disconnected, None);
        assert_eq!(none.end_reason(), EndReason::Disconnected);
    }
}
