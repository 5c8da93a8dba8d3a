//! Core protocol types for Stakeroom's wire format.
//!
//! Everything in this module travels on the wire: clients send
//! [`ClientEvent`]s wrapped in a [`Payload::Request`], and the server
//! answers with a [`Payload::Reply`] for that request plus any number of
//! unsolicited [`ServerEvent`]s.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity and value types
// ---------------------------------------------------------------------------

/// Identifier of a session (a "room").
///
/// Session ids are supplied by the client, because the creator's stake is
/// placed on the ledger under this id *before* the session exists on the
/// server. The server treats the string as opaque; shape checks live in
/// [`SessionId::parse`](crate::SessionId::parse).
///
/// `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a string without validating it.
    ///
    /// Use [`SessionId::parse`](crate::SessionId::parse) for untrusted input.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two seats in a session.
///
/// The creator always sits on side `A` (moves first), the joiner on side
/// `B`. Seats are assigned at join time and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// The declared result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    SideAWins,
    SideBWins,
    /// Draw, or no contest when both participants left.
    Draw,
}

impl Outcome {
    /// The outcome in which `side` wins.
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::A => Self::SideAWins,
            Side::B => Self::SideBWins,
        }
    }

    /// The winning side, or `None` for a draw.
    pub fn winner(self) -> Option<Side> {
        match self {
            Self::SideAWins => Some(Side::A),
            Self::SideBWins => Some(Side::B),
            Self::Draw => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SideAWins => f.write_str("SideAWins"),
            Self::SideBWins => f.write_str("SideBWins"),
            Self::Draw => f.write_str("Draw"),
        }
    }
}

/// Lifecycle status of a session.
///
/// Status only ever moves forward:
///
/// ```text
/// Waiting ──(activation)──→ Active ──(end / disconnect)──→ Finished
///    │
///    └──(timeout / creator leaves)──→ Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// One participant, waiting for an opponent (or for activation to
    /// finish on the ledger).
    Waiting,
    /// Two participants, stakes confirmed, moves flowing.
    Active,
    /// Outcome decided. Terminal until the session is deleted.
    Finished,
    /// Abandoned before a second participant joined.
    Destroyed,
}

impl SessionStatus {
    /// Returns `true` if a second participant may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Destroyed)
    }

    /// Returns `true` if moving from `self` to `target` is an allowed edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Active)
                | (Self::Waiting, Self::Destroyed)
                | (Self::Active, Self::Finished)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("waiting"),
            Self::Active => f.write_str("active"),
            Self::Finished => f.write_str("finished"),
            Self::Destroyed => f.write_str("destroyed"),
        }
    }
}

/// A move as submitted by a client.
///
/// Only the shape is checked on the server (see
/// [`MoveInput::validate`](crate::MoveInput::validate)). Legality is the
/// rule engine's business, which runs on the clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Origin square, e.g. `"e2"`.
    pub from: String,
    /// Destination square, e.g. `"e4"`.
    pub to: String,
    /// Encoded form of the move (SAN or similar), relayed as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notation: Option<String>,
    /// Promotion piece (`q`, `r`, `b` or `n`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

// ---------------------------------------------------------------------------
// Views: read-only snapshots sent to clients
// ---------------------------------------------------------------------------

/// A participant as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub connection_id: u64,
    pub display_name: String,
    pub side: Side,
    pub joined_at: DateTime<Utc>,
    pub active: bool,
}

/// An accepted move, stamped by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveView {
    pub sequence: u64,
    pub side: Side,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

/// Stakes confirmed on the ledger at activation.
///
/// Amounts are decimal strings in token base units; they routinely exceed
/// what a JSON number can carry losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeView {
    pub side_a_stake: String,
    pub side_b_stake: String,
}

/// Where a session's payout stands on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum SettlementView {
    /// Not finished yet, or the settle call has not returned.
    Pending,
    /// The ledger confirmed the payout.
    Confirmed { tx_hash: String },
    /// The settle call failed. The session is finished but unsettled.
    Failed { reason: String },
}

/// A full snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub participants: Vec<ParticipantView>,
    pub moves: Vec<MoveView>,
    pub current_turn: Side,
    pub stake: Option<StakeView>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<Outcome>,
    pub settlement_confirmed: bool,
}

/// Why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// A participant declared the outcome.
    Ended,
    /// A participant disconnected; the remaining one wins.
    Forfeit,
    /// Both participants left; no contest.
    NoContest,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Events a client can send. Each maps to exactly one gateway operation.
///
/// Internally tagged, so on the wire:
/// `{ "type": "JoinSession", "session_id": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Sets the display name used for sessions created/joined afterwards.
    SetIdentity { name: String },

    /// Opens a session under an id whose stake is already on the ledger.
    CreateSession { session_id: SessionId },

    /// Joins a waiting session and triggers activation.
    JoinSession { session_id: SessionId },

    /// Submits a move in an active session.
    SubmitMove {
        session_id: SessionId,
        r#move: MoveInput,
    },

    /// Declares the outcome of an active session and settles it.
    EndSession {
        session_id: SessionId,
        outcome: Outcome,
    },

    /// Keep-alive. Answered with `ReplyData::HeartbeatAck`.
    Heartbeat { client_time: u64 },
}

impl ClientEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetIdentity { .. } => "SetIdentity",
            Self::CreateSession { .. } => "CreateSession",
            Self::JoinSession { .. } => "JoinSession",
            Self::SubmitMove { .. } => "SubmitMove",
            Self::EndSession { .. } => "EndSession",
            Self::Heartbeat { .. } => "Heartbeat",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Unsolicited events pushed to participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Sent to the creator when someone joins their session.
    OpponentJoined { session: SessionView },

    /// Sent to both participants once the ledger confirmed the stakes.
    SessionActivated { session: SessionView },

    /// The ledger refused or failed activation. The session is still
    /// waiting and the joiner was not added.
    ActivationFailed { session_id: SessionId, reason: String },

    /// The opponent's move.
    MoveRelayed {
        session_id: SessionId,
        r#move: MoveView,
    },

    /// A participant's connection went away.
    ParticipantDisconnected {
        session_id: SessionId,
        participant: ParticipantView,
    },

    /// The session finished.
    SessionClosed {
        session_id: SessionId,
        outcome: Outcome,
        reason: CloseReason,
        settlement: SettlementView,
    },

    /// The payout could not be settled on the ledger.
    SettlementFailed { session_id: SessionId, reason: String },
}

/// Successful acknowledgment data, one variant per request type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReplyData {
    Identity { name: String },
    SessionCreated { session_id: SessionId },
    Session { session: SessionView },
    MoveAccepted { sequence: u64 },
    SessionEnded {
        outcome: Outcome,
        settlement: SettlementView,
    },
    HeartbeatAck { client_time: u64, server_time: u64 },
}

/// The acknowledgment for one request.
///
/// `code` follows HTTP conventions (400 bad input, 401 no identity,
/// 403 not allowed, 404 not found, 409 conflict, 502 ledger failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Reply {
    Ok { data: ReplyData },
    Error { code: u16, message: String },
}

impl Reply {
    /// Builds an error reply.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` for `Reply::Ok`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What's inside an envelope.
///
/// Adjacently tagged: `{ "type": "Event", "data": { "type": "MoveRelayed", ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Client → server. `request_id` is echoed in the matching reply.
    Request { request_id: u64, event: ClientEvent },

    /// Server → originating client.
    Reply { request_id: u64, reply: Reply },

    /// Server → client, not tied to a request.
    Event(ServerEvent),
}

/// The top-level wire frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction, per-connection sequence number.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> SessionView {
        SessionView {
            session_id: SessionId::new("room-000001"),
            status: SessionStatus::Active,
            participants: vec![],
            moves: vec![],
            current_turn: Side::A,
            stake: Some(StakeView {
                side_a_stake: "10000000000000000000".into(),
                side_b_stake: "10000000000000000000".into(),
            }),
            created_at: Utc::now(),
            ended_at: None,
            outcome: None,
            settlement_confirmed: false,
        }
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SessionId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::A.opponent(), Side::B);
        assert_eq!(Side::B.opponent(), Side::A);
    }

    #[test]
    fn test_outcome_win_for_and_winner_agree() {
        assert_eq!(Outcome::win_for(Side::A), Outcome::SideAWins);
        assert_eq!(Outcome::win_for(Side::B).winner(), Some(Side::B));
        assert_eq!(Outcome::Draw.winner(), None);
    }

    #[test]
    fn test_session_status_allowed_edges() {
        use SessionStatus::*;
        assert!(Waiting.can_transition_to(Active));
        assert!(Waiting.can_transition_to(Destroyed));
        assert!(Active.can_transition_to(Finished));

        assert!(!Finished.can_transition_to(Active));
        assert!(!Destroyed.can_transition_to(Waiting));
        assert!(!Active.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Finished));
        assert!(!Active.can_transition_to(Destroyed));
    }

    #[test]
    fn test_session_status_terminal_and_joinable() {
        assert!(SessionStatus::Waiting.is_joinable());
        assert!(!SessionStatus::Active.is_joinable());
        assert!(SessionStatus::Finished.is_terminal());
        assert!(SessionStatus::Destroyed.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
    }

    #[test]
    fn test_client_event_json_format() {
        let event = ClientEvent::SubmitMove {
            session_id: SessionId::new("room-000001"),
            r#move: MoveInput {
                from: "e2".into(),
                to: "e4".into(),
                notation: Some("e4".into()),
                promotion: None,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SubmitMove");
        assert_eq!(json["session_id"], "room-000001");
        assert_eq!(json["move"]["from"], "e2");
        assert!(json["move"].get("promotion").is_none());
    }

    #[test]
    fn test_end_session_outcome_names() {
        let raw = r#"{"type":"EndSession","session_id":"room-000001","outcome":"SideBWins"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::EndSession {
                session_id: SessionId::new("room-000001"),
                outcome: Outcome::SideBWins,
            }
        );
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        let raw = r#"{"type":"FlyToMoon","speed":9000}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn test_reply_error_json_format() {
        let reply = Reply::error(409, "session busy");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "Error");
        assert_eq!(json["code"], 409);
        assert_eq!(json["message"], "session busy");
        assert!(!reply.is_ok());
    }

    #[test]
    fn test_server_event_envelope_json_format() {
        let env = Envelope {
            seq: 4,
            timestamp: 100,
            payload: Payload::Event(ServerEvent::SessionActivated {
                session: sample_view(),
            }),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["payload"]["type"], "Event");
        assert_eq!(json["payload"]["data"]["type"], "SessionActivated");
        assert_eq!(json["payload"]["data"]["session"]["status"], "Active");
        assert_eq!(
            json["payload"]["data"]["session"]["stake"]["side_a_stake"],
            "10000000000000000000"
        );
    }

    #[test]
    fn test_settlement_view_is_tagged_by_state() {
        let json = serde_json::to_value(SettlementView::Failed {
            reason: "reverted".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "Failed");
        assert_eq!(json["reason"], "reverted");
    }
}
