//! Error types for the session store and lifecycle manager.

use stakeroom_protocol::{SessionId, SessionStatus, Side};
use stakeroom_transport::ConnectionId;

/// Errors returned by [`SessionStore`](crate::SessionStore) operations.
///
/// A failed store operation leaves the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Both seats are taken.
    #[error("session {0} is full")]
    Full(SessionId),

    /// The session's status does not allow this operation.
    #[error("session {id} is {status}")]
    WrongStatus { id: SessionId, status: SessionStatus },

    /// A connection can be bound to at most one session.
    #[error("{conn} is already in session {session_id}")]
    AlreadyInSession {
        conn: ConnectionId,
        session_id: SessionId,
    },

    #[error("session {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
    },

    /// A move's sequence number does not follow the last recorded one.
    #[error("move {sequence} is out of order in session {id}")]
    OutOfOrder { id: SessionId, sequence: u64 },
}

/// Errors returned by [`LifecycleManager`](crate::LifecycleManager)
/// operations.
///
/// Every variant is a rejection of one request; none is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("not a participant of session {0}")]
    NotParticipant(SessionId),

    #[error("not your turn: side {expected} to move")]
    NotYourTurn { expected: Side },

    /// A ledger call for this session is in flight.
    #[error("session {0} busy")]
    SessionBusy(SessionId),

    /// Ending or settling requires a session the ledger activated.
    #[error("session {0} has not been activated")]
    NotActivated(SessionId),

    #[error("session {0} already finished")]
    AlreadyFinished(SessionId),

    /// The ledger refused or failed activation. The reason is the
    /// ledger's, passed through for display.
    #[error("activation failed: {0}")]
    ActivationFailed(String),
}

impl LifecycleError {
    /// HTTP-style status code carried in `Reply::Error`.
    pub fn code(&self) -> u16 {
        match self {
            Self::Store(StoreError::NotFound(_)) => 404,
            Self::Store(_) => 409,
            Self::NotParticipant(_) | Self::NotYourTurn { .. } => 403,
            Self::SessionBusy(_) | Self::NotActivated(_) | Self::AlreadyFinished(_) => 409,
            Self::ActivationFailed(_) => 502,
        }
    }
}
