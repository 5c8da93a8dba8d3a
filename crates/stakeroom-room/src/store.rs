//! The in-memory session registry.

use std::collections::HashMap;

use chrono::Utc;
use stakeroom_protocol::{SessionId, SessionStatus};
use stakeroom_transport::ConnectionId;
use tokio::time::Instant;

use crate::{Joiner, MoveRecord, Participant, Session, StoreError};

/// What [`SessionStore::remove_participant`] took out.
#[derive(Debug)]
pub struct Removal<'a> {
    /// The session after the removal.
    pub session: &'a Session,
    pub participant: Participant,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionStats {
    pub waiting: usize,
    pub active: usize,
    pub finished: usize,
    pub total: usize,
    /// Connections bound to a session.
    pub participants: usize,
    /// Finished sessions whose settlement failed.
    pub unsettled: usize,
}

/// Owns every [`Session`] and the `connection → session` index.
///
/// All operations are synchronous. Each either applies fully or fails
/// without changing anything, and every successful mutation bumps the
/// session's version and last-activity time. The index is kept in step
/// with every add and remove, so a closing connection resolves to its
/// session in O(1).
///
/// The store is not `Sync` by itself; the lifecycle manager keeps it
/// behind a lock that is never held across an `.await`.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    bindings: HashMap<ConnectionId, SessionId>,
    last_generation: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a waiting session with `creator` on side A.
    pub fn create(&mut self, id: SessionId, creator: Joiner) -> Result<&Session, StoreError> {
        if self.sessions.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        self.ensure_unbound(creator.connection_id)?;

        self.bindings.insert(creator.connection_id, id.clone());
        self.last_generation += 1;
        let generation = self.last_generation;
        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id, creator, generation));
        Ok(session)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// The session `conn` is bound to, if any.
    pub fn session_of(&self, conn: ConnectionId) -> Option<&SessionId> {
        self.bindings.get(&conn)
    }

    /// Seats `joiner` in a waiting session, on the side opposite the
    /// participant already there.
    pub fn add_participant(
        &mut self,
        id: &SessionId,
        joiner: Joiner,
    ) -> Result<&Session, StoreError> {
        self.ensure_unbound(joiner.connection_id)?;
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !session.status.is_joinable() {
            return Err(StoreError::WrongStatus {
                id: id.clone(),
                status: session.status,
            });
        }
        if session.participants.len() >= 2 {
            return Err(StoreError::Full(id.clone()));
        }

        let side = match session.participants.first() {
            Some(existing) => existing.side.opponent(),
            None => stakeroom_protocol::Side::A,
        };
        session.participants.push(Participant {
            connection_id: joiner.connection_id,
            display_name: joiner.display_name,
            side,
            joined_at: Utc::now(),
            active: true,
        });
        touch(session);
        self.bindings.insert(joiner.connection_id, id.clone());
        Ok(session)
    }

    /// Unseats whoever is bound to `conn`.
    ///
    /// Returns `None` if `conn` is not in any session.
    pub fn remove_participant(&mut self, conn: ConnectionId) -> Option<Removal<'_>> {
        let id = self.bindings.remove(&conn)?;
        let session = self.sessions.get_mut(&id)?;
        let index = session
            .participants
            .iter()
            .position(|p| p.connection_id == conn)?;
        let participant = session.participants.remove(index);
        touch(session);
        Some(Removal {
            session,
            participant,
        })
    }

    /// Appends a move and passes the turn.
    ///
    /// `record.sequence` must be exactly one past the last recorded move.
    pub fn record_move(
        &mut self,
        id: &SessionId,
        record: MoveRecord,
    ) -> Result<&Session, StoreError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let expected = session.moves.last().map_or(1, |m| m.sequence + 1);
        if record.sequence != expected {
            return Err(StoreError::OutOfOrder {
                id: id.clone(),
                sequence: record.sequence,
            });
        }
        session.current_turn = record.side.opponent();
        session.moves.push(record);
        touch(session);
        Ok(session)
    }

    /// Moves a session along one allowed edge of the status graph.
    ///
    /// Entering `Finished` stamps `ended_at`.
    pub fn set_status(
        &mut self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<&Session, StoreError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !session.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: session.status,
                to: status,
            });
        }
        session.status = status;
        if status == SessionStatus::Finished {
            session.ended_at = Some(Utc::now());
        }
        touch(session);
        Ok(session)
    }

    /// Removes a session and unbinds all its participants.
    pub fn delete(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        for participant in &session.participants {
            self.bindings.remove(&participant.connection_id);
        }
        Some(session)
    }

    /// Applies a change to fields outside the status graph and the seat
    /// list (stake, settlement, activation token, presence flags).
    pub(crate) fn update(
        &mut self,
        id: &SessionId,
        change: impl FnOnce(&mut Session),
    ) -> Option<&Session> {
        let session = self.sessions.get_mut(id)?;
        change(session);
        touch(session);
        Some(session)
    }

    /// Ids of sessions with no activity since `cutoff`.
    pub fn idle_since(&self, cutoff: Instant) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.last_activity < cutoff)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of finished sessions whose settlement failed.
    pub fn unsettled(&self) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.is_unsettled())
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            total: self.sessions.len(),
            participants: self.bindings.len(),
            ..SessionStats::default()
        };
        for session in self.sessions.values() {
            match session.status {
                SessionStatus::Waiting => stats.waiting += 1,
                SessionStatus::Active => stats.active += 1,
                SessionStatus::Finished => stats.finished += 1,
                SessionStatus::Destroyed => {}
            }
            if session.is_unsettled() {
                stats.unsettled += 1;
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn ensure_unbound(&self, conn: ConnectionId) -> Result<(), StoreError> {
        match self.bindings.get(&conn) {
            Some(session_id) => Err(StoreError::AlreadyInSession {
                conn,
                session_id: session_id.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn touch(session: &mut Session) {
    session.version += 1;
    session.last_activity = Instant::now();
}
