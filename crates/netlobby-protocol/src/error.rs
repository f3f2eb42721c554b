//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means "these bytes are not what the contract
//! says they should be". Whether that is fatal is the caller's decision:
//! bytes from the local transport are trusted, bytes from remote peers
//! are not.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The bytes parsed but violate a fixed layout (wrong length,
    /// reserved value, empty payload).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A numeric code is not in the named code table.
    #[error("unknown {table} code {code}")]
    UnknownCode { table: &'static str, code: u8 },

    /// The envelope was produced by an incompatible wire version.
    #[error("wire version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },
}
