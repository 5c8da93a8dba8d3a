//! Error types for the protocol layer.
//!
//! Each crate in Stakeroom defines its own error enum. A `ProtocolError`
//! means the problem is in the bytes or the shape of a message, never in
//! session state or the ledger.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, unknown
    /// event type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A field failed input validation (name, session id, coordinates).
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Which field was rejected.
        field: &'static str,
        /// Human-readable reason, safe to show to the client.
        reason: String,
    },
}

impl ProtocolError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
