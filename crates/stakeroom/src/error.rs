//! Unified error type for Stakeroom.

use stakeroom_ledger::LedgerError;
use stakeroom_protocol::ProtocolError;
use stakeroom_room::LifecycleError;
use stakeroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Per-request rejections never get here; they travel back to the client
/// as `Reply::Error`. This type is for things that end a connection or
/// stop the server.
#[derive(Debug, thiserror::Error)]
pub enum StakeroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The ledger client could not be set up or reached.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Binding or serving the HTTP status surface failed.
    #[error("http surface: {0}")]
    Io(#[from] std::io::Error),
}
