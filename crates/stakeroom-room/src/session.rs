//! The session model: participants, moves and settlement state.

use chrono::{DateTime, Utc};
use stakeroom_ledger::{Receipt, StakeValidation};
use stakeroom_protocol::{
    MoveView, Outcome, ParticipantView, SessionId, SessionStatus, SessionView, SettlementView,
    Side,
};
use stakeroom_transport::ConnectionId;
use tokio::time::Instant;

/// Someone asking for a seat: the connection and the name it goes by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joiner {
    pub connection_id: ConnectionId,
    pub display_name: String,
}

impl Joiner {
    pub fn new(connection_id: ConnectionId, display_name: impl Into<String>) -> Self {
        Self {
            connection_id,
            display_name: display_name.into(),
        }
    }
}

/// A seated participant.
///
/// Identity is the connection. A participant whose connection closes is
/// gone; there is no rejoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub side: Side,
    pub joined_at: DateTime<Utc>,
    /// Cleared when the connection closes while a ledger call is in flight;
    /// the departure is applied once the call resolves.
    pub active: bool,
}

impl Participant {
    pub fn to_view(&self) -> ParticipantView {
        ParticipantView {
            connection_id: self.connection_id.into_inner(),
            display_name: self.display_name.clone(),
            side: self.side,
            joined_at: self.joined_at,
            active: self.active,
        }
    }
}

/// An accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// 1-based, strictly increasing per session. The ordering authority.
    pub sequence: u64,
    pub side: Side,
    pub from: String,
    pub to: String,
    pub notation: Option<String>,
    pub promotion: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

impl MoveRecord {
    pub fn to_view(&self) -> MoveView {
        MoveView {
            sequence: self.sequence,
            side: self.side,
            from: self.from.clone(),
            to: self.to.clone(),
            notation: self.notation.clone(),
            promotion: self.promotion.clone(),
            accepted_at: self.accepted_at,
        }
    }
}

/// Where a session's payout stands on the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SettlementState {
    /// The session has not finished.
    #[default]
    NotStarted,
    /// Finished; the settle call has not returned.
    Pending,
    Confirmed(Receipt),
    /// Finished but unsettled. Surfaced in stats, never retried here.
    Failed(String),
}

impl SettlementState {
    pub fn to_view(&self) -> SettlementView {
        match self {
            Self::NotStarted | Self::Pending => SettlementView::Pending,
            Self::Confirmed(receipt) => SettlementView::Confirmed {
                tx_hash: receipt.tx_hash.clone(),
            },
            Self::Failed(reason) => SettlementView::Failed {
                reason: reason.clone(),
            },
        }
    }
}

/// Where a session stood when a timer was armed.
///
/// `generation` is unique per store, so a session re-created under the
/// same id never matches a revision taken from its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub generation: u64,
    pub version: u64,
}

/// One paired match between two participants.
///
/// Only [`SessionStore`](crate::SessionStore) hands out sessions, and only
/// by shared reference.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// At most two; the first seated is side A.
    pub participants: Vec<Participant>,
    pub status: SessionStatus,
    /// Append-only.
    pub moves: Vec<MoveRecord>,
    pub current_turn: Side,
    /// Stakes as confirmed at activation.
    pub stake: Option<StakeValidation>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<Outcome>,
    pub settlement: SettlementState,
    /// Reason the last activation attempt failed, if it did.
    pub activation_error: Option<String>,
    pub(crate) generation: u64,
    pub(crate) version: u64,
    pub(crate) last_activity: Instant,
    /// Token of the activation call in flight. `Some` means busy.
    pub(crate) activation: Option<u64>,
}

impl Session {
    pub(crate) fn new(id: SessionId, creator: Joiner, generation: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            participants: vec![Participant {
                connection_id: creator.connection_id,
                display_name: creator.display_name,
                side: Side::A,
                joined_at: now,
                active: true,
            }],
            status: SessionStatus::Waiting,
            moves: Vec::new(),
            current_turn: Side::A,
            stake: None,
            created_at: now,
            ended_at: None,
            outcome: None,
            settlement: SettlementState::NotStarted,
            activation_error: None,
            generation,
            version: 0,
            last_activity: Instant::now(),
            activation: None,
        }
    }

    /// Bumped by every mutation. Timers compare against it.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Fixed at creation; distinguishes this session from any earlier one
    /// that used the same id.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> Revision {
        Revision {
            generation: self.generation,
            version: self.version,
        }
    }

    /// Returns `true` while an activation call is in flight.
    pub fn is_busy(&self) -> bool {
        self.activation.is_some()
    }

    /// Returns `true` once the ledger confirmed the payout.
    pub fn settlement_confirmed(&self) -> bool {
        matches!(self.settlement, SettlementState::Confirmed(_))
    }

    /// Returns `true` for a finished session whose settle call failed.
    pub fn is_unsettled(&self) -> bool {
        self.status == SessionStatus::Finished
            && matches!(self.settlement, SettlementState::Failed(_))
    }

    pub fn participant(&self, conn: ConnectionId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.connection_id == conn)
    }

    pub fn participant_on(&self, side: Side) -> Option<&Participant> {
        self.participants.iter().find(|p| p.side == side)
    }

    /// Connections of participants still present, optionally skipping one.
    pub fn active_connections(&self, except: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.participants
            .iter()
            .filter(|p| p.active && Some(p.connection_id) != except)
            .map(|p| p.connection_id)
            .collect()
    }

    pub fn to_view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            status: self.status,
            participants: self.participants.iter().map(Participant::to_view).collect(),
            moves: self.moves.iter().map(MoveRecord::to_view).collect(),
            current_turn: self.current_turn,
            stake: self.stake.as_ref().map(StakeValidation::to_view),
            created_at: self.created_at,
            ended_at: self.ended_at,
            outcome: self.outcome,
            settlement_confirmed: self.settlement_confirmed(),
        }
    }
}
