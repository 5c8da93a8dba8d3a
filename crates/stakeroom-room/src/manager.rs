//! Session lifecycle manager: the business rules around the store.
//!
//! The manager is the only writer of the [`SessionStore`]. It keeps the
//! store behind a plain mutex that is never held across an `.await`, so
//! operations on different sessions interleave freely while each store
//! mutation is atomic.
//!
//! Ledger calls happen outside the lock. While an activation call is in
//! flight the session carries an activation token and counts as busy:
//! joins, moves and end requests on it are rejected, and a disconnect is
//! recorded and applied once the call resolves. A response that arrives
//! after its session was deleted, or whose token was replaced, is logged
//! and dropped.
//!
//! Timers capture the session's [`Revision`] and do nothing if the
//! session has moved on in the meantime. Settlement and reaping capture
//! its generation, so neither can touch a newer session that reuses the
//! id.
//!
//! A disconnect from an active session is settled after a short
//! departure window. If the other participant leaves within it too, the
//! session ends in a draw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use stakeroom_ledger::{LedgerClient, StakeValidation};
use stakeroom_protocol::{
    CloseReason, MoveInput, MoveView, Outcome, ParticipantView, ServerEvent, SessionId,
    SessionStatus, SessionView, SettlementView,
};
use stakeroom_transport::ConnectionId;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{
    EventSink, Joiner, LifecycleConfig, LifecycleError, MoveRecord, Revision, Session,
    SessionStats, SessionStore, SettlementState, StoreError,
};

struct Inner<L> {
    store: Mutex<SessionStore>,
    ledger: L,
    sink: Arc<dyn EventSink>,
    config: LifecycleConfig,
    next_token: AtomicU64,
}

/// Creates, joins, activates, relays for, ends and expires sessions.
///
/// Cheap to clone; clones share the same store. Operations return the
/// acknowledgment for the calling connection and push events for everyone
/// else through the [`EventSink`].
pub struct LifecycleManager<L: LedgerClient> {
    inner: Arc<Inner<L>>,
}

impl<L: LedgerClient> Clone for LifecycleManager<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// How an activation call resolved, decided under the lock and acted on
/// after it.
enum Resolution {
    Activated {
        view: SessionView,
        notify: Vec<ConnectionId>,
    },
    Failed {
        reason: String,
        notify: Vec<ConnectionId>,
        revision: Revision,
    },
    /// Activation failed and the creator had already left.
    Abandoned { reason: String },
    /// Activation succeeded but someone left during the call.
    Finished {
        view: SessionView,
        outcome: Outcome,
        departed: Vec<ParticipantView>,
        notify: Vec<ConnectionId>,
        generation: u64,
    },
}

/// What a disconnect did, decided under the lock.
enum Departure {
    Deferred(SessionId),
    Left(SessionId),
    Destroyed(SessionId),
    /// First to leave an active session; settled once the window closes.
    Leaving { id: SessionId, generation: u64 },
    /// Left while the other side's departure window was open.
    AlsoLeaving(SessionId),
}

/// An active session finished by departures, ready to settle.
struct Forfeit {
    outcome: Outcome,
    departed: Vec<ParticipantView>,
    notify: Vec<ConnectionId>,
}

impl<L: LedgerClient> LifecycleManager<L> {
    pub fn new(ledger: L, sink: Arc<dyn EventSink>, config: LifecycleConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(SessionStore::new()),
                ledger,
                sink,
                config,
                next_token: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// Whether the ledger client can currently reach the ledger.
    pub fn ledger_ready(&self) -> bool {
        self.inner.ledger.is_ready()
    }

    pub fn stats(&self) -> SessionStats {
        self.store().stats()
    }

    /// Finished sessions whose settlement failed.
    pub fn unsettled_sessions(&self) -> Vec<SessionId> {
        self.store().unsettled()
    }

    pub fn session(&self, id: &SessionId) -> Option<SessionView> {
        self.store().get(id).map(Session::to_view)
    }

    /// The session `conn` is bound to, if any.
    pub fn session_of(&self, conn: ConnectionId) -> Option<SessionId> {
        self.store().session_of(conn).cloned()
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Opens a waiting session with `creator` on side A.
    ///
    /// The creator's stake is already on the ledger under `id`, so this
    /// makes no ledger call.
    pub fn create_session(
        &self,
        id: SessionId,
        creator: Joiner,
    ) -> Result<SessionView, LifecycleError> {
        let conn = creator.connection_id;
        let (view, revision) = {
            let mut store = self.store();
            let session = store.create(id.clone(), creator)?;
            (session.to_view(), session.revision())
        };
        tracing::info!(session_id = %id, %conn, "session created");
        self.arm_waiting_timer(id, revision);
        Ok(view)
    }

    /// Seats `joiner` and activates the session on the ledger.
    ///
    /// The joiner is added tentatively and the creator is told at once.
    /// Stakes are then validated and, only if they match, locked. On
    /// success both participants receive `SessionActivated`. On failure
    /// the joiner is unseated, both sides receive `ActivationFailed`, and
    /// the session keeps waiting for another opponent.
    pub async fn join_session(
        &self,
        id: SessionId,
        joiner: Joiner,
    ) -> Result<SessionView, LifecycleError> {
        let conn = joiner.connection_id;
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (view, creator) = {
            let mut store = self.store();
            let session = store
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if session.is_busy() {
                return Err(LifecycleError::SessionBusy(id));
            }
            store.add_participant(&id, joiner)?;
            let session = store
                .update(&id, |s| s.activation = Some(token))
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            (session.to_view(), session.active_connections(Some(conn)))
        };
        tracing::info!(session_id = %id, %conn, "participant joined, activating");
        self.deliver(&creator, ServerEvent::OpponentJoined { session: view });

        let result = self.activate(&id).await;
        self.resolve_activation(&id, token, conn, result).await
    }

    /// Records a move from the side whose turn it is and relays it to the
    /// opponent.
    ///
    /// Legality is not checked here; the shape was checked by the caller.
    pub fn submit_move(
        &self,
        id: &SessionId,
        conn: ConnectionId,
        input: MoveInput,
    ) -> Result<MoveView, LifecycleError> {
        let (view, notify) = {
            let mut store = self.store();
            let session = store
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let side = session
                .participant(conn)
                .ok_or_else(|| LifecycleError::NotParticipant(id.clone()))?
                .side;
            require_active(session)?;
            if side != session.current_turn {
                return Err(LifecycleError::NotYourTurn {
                    expected: session.current_turn,
                });
            }

            let record = MoveRecord {
                sequence: session.moves.last().map_or(1, |m| m.sequence + 1),
                side,
                from: input.from,
                to: input.to,
                notation: input.notation,
                promotion: input.promotion,
                accepted_at: Utc::now(),
            };
            let view = record.to_view();
            let session = store.record_move(id, record)?;
            (view, session.active_connections(Some(conn)))
        };
        tracing::debug!(
            session_id = %id,
            sequence = view.sequence,
            side = %view.side,
            "move relayed"
        );
        self.deliver(
            &notify,
            ServerEvent::MoveRelayed {
                session_id: id.clone(),
                r#move: view.clone(),
            },
        );
        Ok(view)
    }

    /// Finishes an active session with the declared outcome and settles it.
    ///
    /// The session is marked finished before the ledger is called, so a
    /// repeated request is rejected and settlement is attempted once.
    pub async fn end_session(
        &self,
        id: SessionId,
        conn: ConnectionId,
        outcome: Outcome,
    ) -> Result<SettlementView, LifecycleError> {
        let generation = {
            let mut store = self.store();
            let session = store
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if session.participant(conn).is_none() {
                return Err(LifecycleError::NotParticipant(id));
            }
            require_active(session)?;
            let generation = session.generation();
            store.set_status(&id, SessionStatus::Finished)?;
            store.update(&id, |s| {
                s.outcome = Some(outcome);
                s.settlement = SettlementState::Pending;
            });
            generation
        };
        tracing::info!(session_id = %id, %conn, %outcome, "session ended");
        Ok(self
            .settle(&id, generation, outcome, CloseReason::Ended, Some(conn))
            .await)
    }

    /// Handles a closed connection.
    ///
    /// - busy: the participant is marked inactive; the activation
    ///   resolution applies the departure.
    /// - waiting: the creator leaving destroys the session. No ledger call.
    /// - active: the participant is marked inactive and, after the
    ///   departure window, the remaining side wins. If nobody remains the
    ///   outcome is a draw. Either way the session is settled once.
    /// - finished: the participant is just unseated.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let departure = {
            let mut store = self.store();
            let Some(id) = store.session_of(conn).cloned() else {
                tracing::debug!(%conn, "disconnect outside any session");
                return;
            };
            let Some(session) = store.get(&id) else {
                return;
            };
            let busy = session.is_busy();
            let status = session.status;
            let generation = session.generation();
            let others_leaving = session
                .participants
                .iter()
                .any(|p| !p.active && p.connection_id != conn);

            if busy {
                store.update(&id, |s| mark_inactive(s, conn));
                Departure::Deferred(id)
            } else {
                match status {
                    SessionStatus::Waiting => {
                        store.remove_participant(conn);
                        let empty = store.get(&id).is_some_and(|s| s.participants.is_empty());
                        if empty {
                            destroy(&mut store, &id);
                            Departure::Destroyed(id)
                        } else {
                            Departure::Left(id)
                        }
                    }
                    SessionStatus::Active => {
                        store.update(&id, |s| mark_inactive(s, conn));
                        if others_leaving {
                            Departure::AlsoLeaving(id)
                        } else {
                            Departure::Leaving { id, generation }
                        }
                    }
                    SessionStatus::Finished | SessionStatus::Destroyed => {
                        store.remove_participant(conn);
                        Departure::Left(id)
                    }
                }
            }
        };

        match departure {
            Departure::Deferred(id) => {
                tracing::info!(session_id = %id, %conn, "participant left during activation, deferring");
            }
            Departure::Left(id) => {
                tracing::debug!(session_id = %id, %conn, "participant left");
            }
            Departure::Destroyed(id) => {
                tracing::info!(session_id = %id, %conn, "creator left, waiting session destroyed");
            }
            Departure::AlsoLeaving(id) => {
                tracing::info!(session_id = %id, %conn, "second participant left within the departure window");
            }
            Departure::Leaving { id, generation } => {
                tracing::info!(session_id = %id, %conn, "participant left active session");
                tokio::time::sleep(self.inner.config.departure_window).await;
                self.settle_departures(&id, generation).await;
            }
        }
    }

    /// Unseats everyone who left an active session and settles it for
    /// whoever remains.
    async fn settle_departures(&self, id: &SessionId, generation: u64) {
        let forfeit = {
            let mut store = self.store();
            let Some(status) = store
                .get(id)
                .filter(|s| s.generation() == generation)
                .map(|s| s.status)
            else {
                tracing::debug!(session_id = %id, "session removed before departure was settled");
                return;
            };
            let leaving: Vec<ConnectionId> = store
                .get(id)
                .map(|s| {
                    s.participants
                        .iter()
                        .filter(|p| !p.active)
                        .map(|p| p.connection_id)
                        .collect()
                })
                .unwrap_or_default();
            let mut departed = Vec::with_capacity(leaving.len());
            for conn in leaving {
                if let Some(removal) = store.remove_participant(conn) {
                    departed.push(removal.participant.to_view());
                }
            }

            if status == SessionStatus::Active {
                let notify = store
                    .get(id)
                    .map(|s| s.active_connections(None))
                    .unwrap_or_default();
                let outcome = forfeit_outcome(&notify, &departed);
                finish(&mut store, id, outcome).map(|_| Forfeit {
                    outcome,
                    departed,
                    notify,
                })
            } else {
                None
            }
        };

        let Some(Forfeit {
            outcome,
            departed,
            notify,
        }) = forfeit
        else {
            tracing::debug!(session_id = %id, "session ended within the departure window");
            return;
        };
        tracing::info!(session_id = %id, %outcome, "session forfeited");
        for participant in departed {
            self.deliver(
                &notify,
                ServerEvent::ParticipantDisconnected {
                    session_id: id.clone(),
                    participant,
                },
            );
        }
        self.settle(id, generation, outcome, close_reason(outcome), None)
            .await;
    }

    // -----------------------------------------------------------------
    // Ledger coordination
    // -----------------------------------------------------------------

    async fn activate(&self, id: &SessionId) -> Result<StakeValidation, String> {
        let stakes = self
            .inner
            .ledger
            .validate_stakes(id)
            .await
            .map_err(|e| e.to_string())?;
        if !stakes.is_matched() {
            return Err("stakes not matched".to_string());
        }
        let receipt = self
            .inner
            .ledger
            .start_session(id)
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(session_id = %id, tx_hash = %receipt.tx_hash, "stakes locked");
        Ok(stakes)
    }

    async fn resolve_activation(
        &self,
        id: &SessionId,
        token: u64,
        joiner: ConnectionId,
        result: Result<StakeValidation, String>,
    ) -> Result<SessionView, LifecycleError> {
        let resolution = {
            let mut store = self.store();
            let Some(generation) = store
                .get(id)
                .filter(|s| s.activation == Some(token))
                .map(Session::generation)
            else {
                tracing::warn!(session_id = %id, "late activation response ignored");
                return Err(StoreError::NotFound(id.clone()).into());
            };
            store.update(id, |s| s.activation = None);

            match result {
                Err(reason) => {
                    store.remove_participant(joiner);
                    let creator_present = store
                        .update(id, |s| s.activation_error = Some(reason.clone()))
                        .is_some_and(|s| s.participants.iter().any(|p| p.active));
                    match store.get(id).filter(|_| creator_present) {
                        Some(s) => Resolution::Failed {
                            reason,
                            notify: s.active_connections(None),
                            revision: s.revision(),
                        },
                        None => {
                            destroy(&mut store, id);
                            Resolution::Abandoned { reason }
                        }
                    }
                }
                Ok(stakes) => {
                    store.set_status(id, SessionStatus::Active)?;
                    let departed: Vec<ConnectionId> = store
                        .update(id, |s| {
                            s.stake = Some(stakes);
                            s.activation_error = None;
                        })
                        .map(|s| {
                            s.participants
                                .iter()
                                .filter(|p| !p.active)
                                .map(|p| p.connection_id)
                                .collect()
                        })
                        .unwrap_or_default();

                    if departed.is_empty() {
                        let session = store
                            .get(id)
                            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                        Resolution::Activated {
                            view: session.to_view(),
                            notify: session.active_connections(None),
                        }
                    } else {
                        let mut gone = Vec::with_capacity(departed.len());
                        for conn in departed {
                            if let Some(removal) = store.remove_participant(conn) {
                                gone.push(removal.participant.to_view());
                            }
                        }
                        let departed = gone;
                        let notify = store
                            .get(id)
                            .map(|s| s.active_connections(None))
                            .unwrap_or_default();
                        let outcome = forfeit_outcome(&notify, &departed);
                        let view = finish(&mut store, id, outcome)
                            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                        Resolution::Finished {
                            view,
                            outcome,
                            departed,
                            notify,
                            generation,
                        }
                    }
                }
            }
        };

        match resolution {
            Resolution::Activated { view, notify } => {
                tracing::info!(session_id = %id, "session activated");
                self.deliver(
                    &notify,
                    ServerEvent::SessionActivated {
                        session: view.clone(),
                    },
                );
                Ok(view)
            }
            Resolution::Failed {
                reason,
                notify,
                revision,
            } => {
                tracing::warn!(session_id = %id, %reason, "activation failed, session back to waiting");
                let event = ServerEvent::ActivationFailed {
                    session_id: id.clone(),
                    reason: reason.clone(),
                };
                self.deliver(&[joiner], event.clone());
                self.deliver(&notify, event);
                self.arm_waiting_timer(id.clone(), revision);
                Err(LifecycleError::ActivationFailed(reason))
            }
            Resolution::Abandoned { reason } => {
                tracing::warn!(session_id = %id, %reason, "activation failed after creator left, session destroyed");
                self.deliver(
                    &[joiner],
                    ServerEvent::ActivationFailed {
                        session_id: id.clone(),
                        reason: reason.clone(),
                    },
                );
                Err(LifecycleError::ActivationFailed(reason))
            }
            Resolution::Finished {
                view,
                outcome,
                departed,
                notify,
                generation,
            } => {
                tracing::info!(session_id = %id, %outcome, "activated after a departure, finishing");
                for participant in departed {
                    self.deliver(
                        &notify,
                        ServerEvent::ParticipantDisconnected {
                            session_id: id.clone(),
                            participant,
                        },
                    );
                }
                self.settle(id, generation, outcome, close_reason(outcome), None)
                    .await;
                Ok(view)
            }
        }
    }

    /// Makes the one settle call for a finished session and tells the
    /// remaining participants, except `except`, how it went.
    ///
    /// The result is only recorded on the session of `generation`.
    async fn settle(
        &self,
        id: &SessionId,
        generation: u64,
        outcome: Outcome,
        reason: CloseReason,
        except: Option<ConnectionId>,
    ) -> SettlementView {
        let state = match self.inner.ledger.settle_session(id, outcome).await {
            Ok(receipt) => {
                tracing::info!(session_id = %id, %outcome, tx_hash = %receipt.tx_hash, "session settled");
                SettlementState::Confirmed(receipt)
            }
            Err(e) => {
                tracing::warn!(session_id = %id, %outcome, error = %e, "settlement failed, session unsettled");
                SettlementState::Failed(e.to_string())
            }
        };
        let view = state.to_view();

        let notify = {
            let mut store = self.store();
            let current = store.get(id).is_some_and(|s| s.generation() == generation);
            let session = if current {
                store.update(id, |s| s.settlement = state)
            } else {
                None
            };
            match session {
                Some(session) => session.active_connections(except),
                None => {
                    tracing::warn!(session_id = %id, "late settlement response for a removed session");
                    return view;
                }
            }
        };

        self.deliver(
            &notify,
            ServerEvent::SessionClosed {
                session_id: id.clone(),
                outcome,
                reason,
                settlement: view.clone(),
            },
        );
        if let SettlementView::Failed { reason: why } = &view {
            self.deliver(
                &notify,
                ServerEvent::SettlementFailed {
                    session_id: id.clone(),
                    reason: why.clone(),
                },
            );
        }

        let grace = match reason {
            CloseReason::Ended => self.inner.config.finished_grace,
            CloseReason::Forfeit | CloseReason::NoContest => self.inner.config.forfeit_grace,
        };
        self.schedule_reap(id.clone(), generation, grace);
        view
    }

    // -----------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------

    fn arm_waiting_timer(&self, id: SessionId, revision: Revision) {
        let manager = self.clone();
        let timeout = self.inner.config.waiting_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.expire_waiting(&id, revision);
        });
    }

    /// Destroys a session still waiting at `revision`.
    ///
    /// Returns `false` (and does nothing) if the session is gone, busy,
    /// no longer waiting, was mutated since the timer was armed, or is a
    /// newer session under the same id.
    pub fn expire_waiting(&self, id: &SessionId, revision: Revision) -> bool {
        let mut store = self.store();
        let live = store.get(id).is_some_and(|s| {
            s.revision() == revision && s.status == SessionStatus::Waiting && !s.is_busy()
        });
        if !live {
            tracing::debug!(
                session_id = %id,
                generation = revision.generation,
                version = revision.version,
                "stale waiting timer"
            );
            return false;
        }
        destroy(&mut store, id);
        tracing::info!(session_id = %id, "waiting session expired");
        true
    }

    fn schedule_reap(&self, id: SessionId, generation: u64, grace: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            manager.reap_finished(&id, generation);
        });
    }

    /// Deletes the finished session of `generation`.
    ///
    /// Finished is terminal, so participants leaving in the meantime do
    /// not cancel this.
    pub fn reap_finished(&self, id: &SessionId, generation: u64) -> bool {
        let mut store = self.store();
        if !store
            .get(id)
            .is_some_and(|s| s.generation() == generation && s.status == SessionStatus::Finished)
        {
            return false;
        }
        if let Some(session) = store.delete(id) {
            if session.is_unsettled() {
                tracing::warn!(session_id = %id, "removing unsettled session");
            } else {
                tracing::info!(session_id = %id, "finished session removed");
            }
        }
        true
    }

    /// Deletes every session idle for longer than the inactivity limit,
    /// whatever its status. Returns how many were deleted.
    pub fn sweep(&self) -> usize {
        let mut store = self.store();
        let Some(cutoff) = Instant::now().checked_sub(self.inner.config.inactivity_limit) else {
            return 0;
        };
        let idle = store.idle_since(cutoff);
        for id in &idle {
            let Some(session) = store.delete(id) else {
                continue;
            };
            if session.status == SessionStatus::Active {
                tracing::warn!(session_id = %id, "abandoned active session reclaimed without settlement");
            } else {
                tracing::info!(session_id = %id, status = %session.status, "idle session reclaimed");
            }
        }
        idle.len()
    }

    /// Runs [`sweep`](Self::sweep) every `sweep_interval`.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let period = self.inner.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let reclaimed = manager.sweep();
                if reclaimed > 0 {
                    tracing::debug!(reclaimed, "inactivity sweep");
                }
            }
        })
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, to: &[ConnectionId], event: ServerEvent) {
        for conn in to {
            self.inner.sink.deliver(*conn, event.clone());
        }
    }
}

/// Moves and end requests need an active session with no ledger call in
/// flight.
fn require_active(session: &Session) -> Result<(), LifecycleError> {
    if session.is_busy() {
        return Err(LifecycleError::SessionBusy(session.id.clone()));
    }
    match session.status {
        SessionStatus::Active => Ok(()),
        SessionStatus::Waiting => Err(LifecycleError::NotActivated(session.id.clone())),
        SessionStatus::Finished => Err(LifecycleError::AlreadyFinished(session.id.clone())),
        SessionStatus::Destroyed => Err(StoreError::WrongStatus {
            id: session.id.clone(),
            status: session.status,
        }
        .into()),
    }
}

/// The remaining side wins; with nobody left it is a draw.
fn forfeit_outcome(remaining: &[ConnectionId], departed: &[ParticipantView]) -> Outcome {
    match (remaining, departed.first()) {
        ([_], Some(left)) => Outcome::win_for(left.side.opponent()),
        _ => Outcome::Draw,
    }
}

fn mark_inactive(session: &mut Session, conn: ConnectionId) {
    if let Some(p) = session
        .participants
        .iter_mut()
        .find(|p| p.connection_id == conn)
    {
        p.active = false;
    }
}

fn close_reason(outcome: Outcome) -> CloseReason {
    match outcome {
        Outcome::Draw => CloseReason::NoContest,
        Outcome::SideAWins | Outcome::SideBWins => CloseReason::Forfeit,
    }
}

/// Active → finished with `outcome`, settlement pending.
fn finish(store: &mut SessionStore, id: &SessionId, outcome: Outcome) -> Option<SessionView> {
    store.set_status(id, SessionStatus::Finished).ok()?;
    store
        .update(id, |s| {
            s.outcome = Some(outcome);
            s.settlement = SettlementState::Pending;
        })
        .map(Session::to_view)
}

/// Waiting → destroyed, then gone.
fn destroy(store: &mut SessionStore, id: &SessionId) {
    let _ = store.set_status(id, SessionStatus::Destroyed);
    store.delete(id);
}
