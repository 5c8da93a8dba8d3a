//! Per-connection gateway: request dispatch and event fan-out.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register an outbound queue in the directory
//!   2. Loop: receive requests → validate → call the lifecycle manager →
//!      reply to the sender; drain queued events to the socket
//!   3. On close or idle timeout, the guard hands the connection to the
//!      manager's disconnect handling exactly once
//!
//! Requests on one connection are handled one at a time, and the reply
//! to a request is written before any event it caused.

use std::sync::Arc;

use stakeroom_ledger::LedgerClient;
use stakeroom_protocol::{
    ClientEvent, Codec, Envelope, Payload, ProtocolError, Reply, ReplyData, validate_display_name,
};
use stakeroom_room::{Joiner, LifecycleError};
use stakeroom_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::time::Instant;

use crate::StakeroomError;
use crate::limit::{RateLimit, RequestWindow};
use crate::server::ServerState;

/// Drop guard that releases a connection when its handler exits.
///
/// Unregisters the outbound queue and runs the manager's disconnect
/// handling. Since `Drop` is synchronous, the async part is spawned.
struct DisconnectGuard<L: LedgerClient, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<L, C>>,
}

impl<L: LedgerClient, C: Codec> Drop for DisconnectGuard<L, C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        self.state.directory.unregister(conn_id);
        let manager = self.state.manager.clone();
        tokio::spawn(async move {
            manager.disconnect(conn_id).await;
        });
    }
}

/// Per-connection state the gateway keeps between requests.
struct ConnectionContext {
    conn_id: ConnectionId,
    /// Set by `SetIdentity`; required to create or join.
    name: Option<String>,
    seq: u64,
    start: Instant,
    /// Create and join requests in the current window.
    session_ops: RequestWindow,
}

impl ConnectionContext {
    fn new(conn_id: ConnectionId, session_ops: RateLimit) -> Self {
        Self {
            conn_id,
            name: None,
            seq: 1,
            start: Instant::now(),
            session_ops: RequestWindow::new(session_ops),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn envelope(&mut self, payload: Payload) -> Envelope {
        let seq = self.seq;
        self.seq += 1;
        Envelope {
            seq,
            timestamp: self.elapsed_ms(),
            payload,
        }
    }

    fn joiner(&self) -> Result<Joiner, Rejection> {
        self.name
            .as_ref()
            .map(|name| Joiner::new(self.conn_id, name.clone()))
            .ok_or_else(|| Rejection(Reply::error(401, "identity required")))
    }

    fn admit_session_op(&mut self) -> Result<(), Rejection> {
        if self.session_ops.admit(Instant::now()) {
            Ok(())
        } else {
            Err(Rejection(Reply::error(
                429,
                "too many session operations, slow down",
            )))
        }
    }
}

/// A request rejected before or by the lifecycle manager.
struct Rejection(Reply);

impl From<ProtocolError> for Rejection {
    fn from(e: ProtocolError) -> Self {
        Self(Reply::error(400, e.to_string()))
    }
}

impl From<LifecycleError> for Rejection {
    fn from(e: LifecycleError) -> Self {
        Self(Reply::error(e.code(), e.to_string()))
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<L, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<L, C>>,
) -> Result<(), StakeroomError>
where
    L: LedgerClient,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut events = state.directory.register(conn_id);
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let mut ctx = ConnectionContext::new(conn_id, state.session_ops);
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            biased;

            Some(event) = events.recv() => {
                let envelope = ctx.envelope(Payload::Event(event));
                send(&conn, &state.codec, &envelope).await?;
            }

            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => {
                    idle.as_mut().reset(Instant::now() + state.idle_timeout);
                    handle_frame(&conn, &state, &mut ctx, &data).await?;
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },

            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                let _ = conn.close().await;
                break;
            }
        }
    }

    // _guard drops here → directory entry removed, disconnect fires.
    Ok(())
}

/// Decodes one inbound frame, dispatches it and writes the reply.
async fn handle_frame<L, C>(
    conn: &WebSocketConnection,
    state: &ServerState<L, C>,
    ctx: &mut ConnectionContext,
    data: &[u8],
) -> Result<(), StakeroomError>
where
    L: LedgerClient,
    C: Codec,
{
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(conn_id = %ctx.conn_id, error = %e, "failed to decode envelope");
            return reply(conn, state, ctx, 0, Reply::error(400, e.to_string())).await;
        }
    };

    let Payload::Request { request_id, event } = envelope.payload else {
        return reply(conn, state, ctx, 0, Reply::error(400, "expected a request")).await;
    };

    let request = event.name();
    let outcome = match dispatch(state, ctx, event).await {
        Ok(data) => Reply::Ok { data },
        Err(Rejection(error)) => error,
    };
    if let Reply::Error { code, message } = &outcome {
        tracing::debug!(conn_id = %ctx.conn_id, request, code, %message, "request rejected");
    }
    reply(conn, state, ctx, request_id, outcome).await
}

/// Maps one client event to one lifecycle manager call.
async fn dispatch<L, C>(
    state: &ServerState<L, C>,
    ctx: &mut ConnectionContext,
    event: ClientEvent,
) -> Result<ReplyData, Rejection>
where
    L: LedgerClient,
    C: Codec,
{
    match event {
        ClientEvent::SetIdentity { name } => {
            let name = validate_display_name(&name)?;
            tracing::debug!(conn_id = %ctx.conn_id, %name, "identity set");
            ctx.name = Some(name.clone());
            Ok(ReplyData::Identity { name })
        }

        ClientEvent::CreateSession { session_id } => {
            ctx.admit_session_op()?;
            let creator = ctx.joiner()?;
            session_id.validate()?;
            state.manager.create_session(session_id.clone(), creator)?;
            Ok(ReplyData::SessionCreated { session_id })
        }

        ClientEvent::JoinSession { session_id } => {
            ctx.admit_session_op()?;
            let joiner = ctx.joiner()?;
            session_id.validate()?;
            let session = state.manager.join_session(session_id, joiner).await?;
            Ok(ReplyData::Session { session })
        }

        ClientEvent::SubmitMove { session_id, r#move } => {
            session_id.validate()?;
            r#move.validate()?;
            let accepted = state.manager.submit_move(&session_id, ctx.conn_id, r#move)?;
            Ok(ReplyData::MoveAccepted {
                sequence: accepted.sequence,
            })
        }

        ClientEvent::EndSession {
            session_id,
            outcome,
        } => {
            session_id.validate()?;
            let settlement = state
                .manager
                .end_session(session_id, ctx.conn_id, outcome)
                .await?;
            Ok(ReplyData::SessionEnded {
                outcome,
                settlement,
            })
        }

        ClientEvent::Heartbeat { client_time } => Ok(ReplyData::HeartbeatAck {
            client_time,
            server_time: ctx.elapsed_ms(),
        }),
    }
}

/// Sends a `Payload::Reply` for `request_id`.
async fn reply<L, C>(
    conn: &WebSocketConnection,
    state: &ServerState<L, C>,
    ctx: &mut ConnectionContext,
    request_id: u64,
    reply: Reply,
) -> Result<(), StakeroomError>
where
    L: LedgerClient,
    C: Codec,
{
    let envelope = ctx.envelope(Payload::Reply { request_id, reply });
    send(conn, &state.codec, &envelope).await
}

async fn send(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    envelope: &Envelope,
) -> Result<(), StakeroomError> {
    let bytes = codec.encode(envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}
