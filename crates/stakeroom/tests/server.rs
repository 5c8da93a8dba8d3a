//! Integration tests for the Stakeroom server: gateway, fan-out and the
//! HTTP status surface, over real sockets.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use stakeroom::prelude::*;
use stakeroom::{HealthResponse, StatsResponse};
use stakeroom_ledger::{LedgerCall, MockLedger};
use stakeroom_protocol::CloseReason;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    ws_addr: String,
    http_addr: String,
}

async fn start_server(ledger: MockLedger) -> TestServer {
    start_server_with(StakeroomServerBuilder::new(), ledger).await
}

/// Starts a server on random ports.
async fn start_server_with(builder: StakeroomServerBuilder, ledger: MockLedger) -> TestServer {
    let server = builder
        .bind("127.0.0.1:0")
        .http_bind("127.0.0.1:0")
        .build(ledger)
        .await
        .expect("server should build");

    let ws_addr = server.local_addr().expect("ws addr").to_string();
    let http_addr = server.http_local_addr().expect("http addr").to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer { ws_addr, http_addr }
}

fn sid(name: &str) -> SessionId {
    SessionId::new(format!("session-{name}"))
}

fn mv(from: &str, to: &str) -> MoveInput {
    MoveInput {
        from: from.into(),
        to: to.into(),
        notation: None,
        promotion: None,
    }
}

struct Client {
    ws: ClientWs,
    seq: u64,
    next_request: u64,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        Self {
            ws,
            seq: 1,
            next_request: 1,
        }
    }

    /// Connects and sets a display name.
    async fn named(addr: &str, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        let reply = client
            .call(ClientEvent::SetIdentity { name: name.into() })
            .await;
        assert!(reply.is_ok(), "identity rejected: {reply:?}");
        client
    }

    async fn send_raw(&mut self, msg: Message) {
        self.ws.send(msg).await.expect("send");
    }

    async fn request(&mut self, event: ClientEvent) -> u64 {
        let request_id = self.next_request;
        self.next_request += 1;
        let envelope = Envelope {
            seq: self.seq,
            timestamp: 0,
            payload: Payload::Request { request_id, event },
        };
        self.seq += 1;
        let bytes = serde_json::to_vec(&envelope).expect("encode");
        self.send_raw(Message::Binary(bytes.into())).await;
        request_id
    }

    async fn recv(&mut self) -> Envelope {
        let msg = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("recv");
        serde_json::from_slice(&msg.into_data()).expect("decode")
    }

    /// Sends a request and returns its reply, which must be the next frame.
    async fn call(&mut self, event: ClientEvent) -> Reply {
        let expected = self.request(event).await;
        match self.recv().await.payload {
            Payload::Reply { request_id, reply } => {
                assert_eq!(request_id, expected);
                reply
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    async fn call_ok(&mut self, event: ClientEvent) -> ReplyData {
        match self.call(event).await {
            Reply::Ok { data } => data,
            Reply::Error { code, message } => panic!("request failed: {code} {message}"),
        }
    }

    async fn event(&mut self) -> ServerEvent {
        match self.recv().await.payload {
            Payload::Event(event) => event,
            other => panic!("expected Event, got {other:?}"),
        }
    }

    /// Returns `true` if nothing arrives within a short window.
    async fn is_quiet(&mut self) -> bool {
        tokio::time::timeout(Duration::from_millis(100), self.ws.next())
            .await
            .is_err()
    }
}

fn error_code(reply: &Reply) -> u16 {
    match reply {
        Reply::Error { code, .. } => *code,
        Reply::Ok { data } => panic!("expected an error, got {data:?}"),
    }
}

/// Alice creates `id`, Bob joins it; both have drained the activation events.
async fn active_pair(server: &TestServer, id: &SessionId) -> (Client, Client) {
    let mut alice = Client::named(&server.ws_addr, "alice").await;
    let mut bob = Client::named(&server.ws_addr, "bob").await;

    alice
        .call_ok(ClientEvent::CreateSession {
            session_id: id.clone(),
        })
        .await;
    bob.call_ok(ClientEvent::JoinSession {
        session_id: id.clone(),
    })
    .await;

    assert!(matches!(bob.event().await, ServerEvent::SessionActivated { .. }));
    assert!(matches!(alice.event().await, ServerEvent::OpponentJoined { .. }));
    assert!(matches!(alice.event().await, ServerEvent::SessionActivated { .. }));
    (alice, bob)
}

// =========================================================================
// Requests and validation
// =========================================================================

#[tokio::test]
async fn test_heartbeat_response() {
    let server = start_server(MockLedger::new()).await;
    let mut client = Client::connect(&server.ws_addr).await;

    match client
        .call_ok(ClientEvent::Heartbeat { client_time: 12345 })
        .await
    {
        ReplyData::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 12345),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_set_identity_trims_and_validates() {
    let server = start_server(MockLedger::new()).await;
    let mut client = Client::connect(&server.ws_addr).await;

    let data = client
        .call_ok(ClientEvent::SetIdentity {
            name: "  alice  ".into(),
        })
        .await;
    assert_eq!(
        data,
        ReplyData::Identity {
            name: "alice".into()
        }
    );

    let reply = client
        .call(ClientEvent::SetIdentity {
            name: "<b>x</b>".into(),
        })
        .await;
    assert_eq!(error_code(&reply), 400);
}

#[tokio::test]
async fn test_create_requires_identity() {
    let server = start_server(MockLedger::new()).await;
    let mut client = Client::connect(&server.ws_addr).await;

    let reply = client
        .call(ClientEvent::CreateSession {
            session_id: sid("anonymous"),
        })
        .await;
    assert_eq!(
        reply,
        Reply::Error {
            code: 401,
            message: "identity required".into()
        }
    );
}

#[tokio::test]
async fn test_malformed_session_id_rejected() {
    let server = start_server(MockLedger::new()).await;
    let mut client = Client::named(&server.ws_addr, "alice").await;

    let reply = client
        .call(ClientEvent::CreateSession {
            session_id: SessionId::new("short"),
        })
        .await;
    assert_eq!(error_code(&reply), 400);

    let reply = client
        .call(ClientEvent::JoinSession {
            session_id: SessionId::new("../../etc/passwd"),
        })
        .await;
    assert_eq!(error_code(&reply), 400);
}

#[tokio::test]
async fn test_undecodable_frame_gets_error_reply() {
    let server = start_server(MockLedger::new()).await;
    let mut client = Client::connect(&server.ws_addr).await;

    client.send_raw(Message::Binary(b"not json".to_vec().into())).await;

    match client.recv().await.payload {
        Payload::Reply { request_id, reply } => {
            assert_eq!(request_id, 0);
            assert_eq!(error_code(&reply), 400);
        }
        other => panic!("expected Reply, got {other:?}"),
    }

    // The connection stays usable.
    let data = client
        .call_ok(ClientEvent::Heartbeat { client_time: 1 })
        .await;
    assert!(matches!(data, ReplyData::HeartbeatAck { .. }));
}

#[tokio::test]
async fn test_join_missing_session_is_not_found() {
    let server = start_server(MockLedger::new()).await;
    let mut client = Client::named(&server.ws_addr, "bob").await;

    let reply = client
        .call(ClientEvent::JoinSession {
            session_id: sid("nowhere"),
        })
        .await;
    assert_eq!(error_code(&reply), 404);
}

// =========================================================================
// Session flow
// =========================================================================

#[tokio::test]
async fn test_create_join_activate() {
    let ledger = MockLedger::new();
    let server = start_server(ledger.clone()).await;
    let id = sid("activate");

    let mut alice = Client::named(&server.ws_addr, "alice").await;
    let mut bob = Client::named(&server.ws_addr, "bob").await;

    let data = alice
        .call_ok(ClientEvent::CreateSession {
            session_id: id.clone(),
        })
        .await;
    assert_eq!(
        data,
        ReplyData::SessionCreated {
            session_id: id.clone()
        }
    );

    let session = match bob
        .call_ok(ClientEvent::JoinSession {
            session_id: id.clone(),
        })
        .await
    {
        ReplyData::Session { session } => session,
        other => panic!("expected Session, got {other:?}"),
    };
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.participants.len(), 2);
    assert_eq!(session.participants[1].display_name, "bob");
    assert_eq!(session.participants[1].side, Side::B);
    assert!(session.stake.is_some());

    // Reply first, then the fan-out.
    assert!(matches!(bob.event().await, ServerEvent::SessionActivated { .. }));

    match alice.event().await {
        ServerEvent::OpponentJoined { session } => {
            assert_eq!(session.status, SessionStatus::Waiting);
            assert_eq!(session.participants.len(), 2);
        }
        other => panic!("expected OpponentJoined, got {other:?}"),
    }
    match alice.event().await {
        ServerEvent::SessionActivated { session } => {
            assert_eq!(session.status, SessionStatus::Active)
        }
        other => panic!("expected SessionActivated, got {other:?}"),
    }

    assert_eq!(
        ledger.calls(),
        vec![
            LedgerCall::ValidateStakes(id.clone()),
            LedgerCall::StartSession(id),
        ]
    );
}

#[tokio::test]
async fn test_moves_relay_between_participants() {
    let server = start_server(MockLedger::new()).await;
    let id = sid("moves");
    let (mut alice, mut bob) = active_pair(&server, &id).await;

    let data = alice
        .call_ok(ClientEvent::SubmitMove {
            session_id: id.clone(),
            r#move: MoveInput {
                notation: Some("e4".into()),
                ..mv("e2", "e4")
            },
        })
        .await;
    assert_eq!(data, ReplyData::MoveAccepted { sequence: 1 });

    match bob.event().await {
        ServerEvent::MoveRelayed { session_id, r#move } => {
            assert_eq!(session_id, id);
            assert_eq!(r#move.sequence, 1);
            assert_eq!(r#move.side, Side::A);
            assert_eq!(r#move.notation.as_deref(), Some("e4"));
        }
        other => panic!("expected MoveRelayed, got {other:?}"),
    }

    let data = bob
        .call_ok(ClientEvent::SubmitMove {
            session_id: id.clone(),
            r#move: mv("e7", "e5"),
        })
        .await;
    assert_eq!(data, ReplyData::MoveAccepted { sequence: 2 });
    assert!(matches!(alice.event().await, ServerEvent::MoveRelayed { .. }));

    // The sender never gets its own move back.
    assert!(bob.is_quiet().await);
}

#[tokio::test]
async fn test_move_out_of_turn_and_malformed_move() {
    let server = start_server(MockLedger::new()).await;
    let id = sid("turns");
    let (mut alice, mut bob) = active_pair(&server, &id).await;

    let reply = bob
        .call(ClientEvent::SubmitMove {
            session_id: id.clone(),
            r#move: mv("e7", "e5"),
        })
        .await;
    assert_eq!(error_code(&reply), 403);

    let reply = alice
        .call(ClientEvent::SubmitMove {
            session_id: id.clone(),
            r#move: mv("z9", "e4"),
        })
        .await;
    assert_eq!(error_code(&reply), 400);

    assert!(alice.is_quiet().await);
}

#[tokio::test]
async fn test_end_session_settles_and_closes() {
    let ledger = MockLedger::new();
    let server = start_server(ledger.clone()).await;
    let id = sid("ending");
    let (mut alice, mut bob) = active_pair(&server, &id).await;

    let data = bob
        .call_ok(ClientEvent::EndSession {
            session_id: id.clone(),
            outcome: Outcome::SideBWins,
        })
        .await;
    assert_eq!(
        data,
        ReplyData::SessionEnded {
            outcome: Outcome::SideBWins,
            settlement: SettlementView::Confirmed {
                tx_hash: format!("0xsettle-{id}"),
            },
        }
    );

    match alice.event().await {
        ServerEvent::SessionClosed {
            outcome, reason, ..
        } => {
            assert_eq!(outcome, Outcome::SideBWins);
            assert_eq!(reason, CloseReason::Ended);
        }
        other => panic!("expected SessionClosed, got {other:?}"),
    }

    // A second end is rejected without another ledger call.
    let reply = alice
        .call(ClientEvent::EndSession {
            session_id: id.clone(),
            outcome: Outcome::SideAWins,
        })
        .await;
    assert_eq!(error_code(&reply), 409);
    assert_eq!(ledger.settle_count(&id), 1);
}

#[tokio::test]
async fn test_disconnect_forfeits_to_remaining_participant() {
    let ledger = MockLedger::new();
    let server = start_server(ledger.clone()).await;
    let id = sid("forfeit");
    let (mut alice, bob) = active_pair(&server, &id).await;

    drop(bob);

    match alice.event().await {
        ServerEvent::ParticipantDisconnected { participant, .. } => {
            assert_eq!(participant.display_name, "bob");
            assert_eq!(participant.side, Side::B);
        }
        other => panic!("expected ParticipantDisconnected, got {other:?}"),
    }
    match alice.event().await {
        ServerEvent::SessionClosed {
            outcome,
            reason,
            settlement,
            ..
        } => {
            assert_eq!(outcome, Outcome::SideAWins);
            assert_eq!(reason, CloseReason::Forfeit);
            assert!(matches!(settlement, SettlementView::Confirmed { .. }));
        }
        other => panic!("expected SessionClosed, got {other:?}"),
    }
    assert_eq!(ledger.settle_count(&id), 1);
}

#[tokio::test]
async fn test_both_disconnecting_is_a_draw() {
    let ledger = MockLedger::new();
    let builder = StakeroomServerBuilder::new().lifecycle(LifecycleConfig {
        departure_window: Duration::from_millis(200),
        ..LifecycleConfig::default()
    });
    let server = start_server_with(builder, ledger.clone()).await;
    let id = sid("walkout");
    let (alice, bob) = active_pair(&server, &id).await;

    drop(alice);
    drop(bob);

    let draw = LedgerCall::SettleSession(id.clone(), Outcome::Draw);
    tokio::time::timeout(Duration::from_secs(2), async {
        while !ledger.calls().contains(&draw) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session should settle as a draw");
    assert_eq!(ledger.settle_count(&id), 1);
}

#[tokio::test]
async fn test_failed_activation_keeps_session_waiting() {
    let ledger = MockLedger::new();
    ledger.fail_validate(Some("no stake found"));
    let server = start_server(ledger.clone()).await;
    let id = sid("refused");

    let mut alice = Client::named(&server.ws_addr, "alice").await;
    let mut bob = Client::named(&server.ws_addr, "bob").await;
    alice
        .call_ok(ClientEvent::CreateSession {
            session_id: id.clone(),
        })
        .await;

    let reply = bob
        .call(ClientEvent::JoinSession {
            session_id: id.clone(),
        })
        .await;
    assert_eq!(error_code(&reply), 502);
    assert!(matches!(bob.event().await, ServerEvent::ActivationFailed { .. }));

    assert!(matches!(alice.event().await, ServerEvent::OpponentJoined { .. }));
    match alice.event().await {
        ServerEvent::ActivationFailed { session_id, reason } => {
            assert_eq!(session_id, id);
            assert!(reason.contains("no stake found"));
        }
        other => panic!("expected ActivationFailed, got {other:?}"),
    }

    // Nothing was locked; a later join can still succeed.
    assert!(!ledger.calls().contains(&LedgerCall::StartSession(id.clone())));
    ledger.fail_validate(None);
    let data = bob
        .call_ok(ClientEvent::JoinSession {
            session_id: id.clone(),
        })
        .await;
    assert!(matches!(data, ReplyData::Session { .. }));
}

#[tokio::test]
async fn test_join_during_activation_is_busy() {
    let ledger = MockLedger::new();
    let server = start_server(ledger.clone()).await;
    let id = sid("busy");

    let mut alice = Client::named(&server.ws_addr, "alice").await;
    let mut bob = Client::named(&server.ws_addr, "bob").await;
    let mut carol = Client::named(&server.ws_addr, "carol").await;
    alice
        .call_ok(ClientEvent::CreateSession {
            session_id: id.clone(),
        })
        .await;

    ledger.hold();
    let pending = bob
        .request(ClientEvent::JoinSession {
            session_id: id.clone(),
        })
        .await;
    ledger.wait_for_calls(1).await;

    let reply = carol
        .call(ClientEvent::JoinSession {
            session_id: id.clone(),
        })
        .await;
    assert_eq!(
        reply,
        Reply::Error {
            code: 409,
            message: format!("session {id} busy"),
        }
    );

    ledger.release();
    match bob.recv().await.payload {
        Payload::Reply { request_id, reply } => {
            assert_eq!(request_id, pending);
            assert!(reply.is_ok());
        }
        other => panic!("expected Reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_session_operations_are_rate_limited() {
    let builder = StakeroomServerBuilder::new()
        .session_rate_limit(RateLimit::new(2, Duration::from_secs(60)));
    let server = start_server_with(builder, MockLedger::new()).await;
    let mut alice = Client::named(&server.ws_addr, "alice").await;

    for _ in 0..2 {
        let reply = alice
            .call(ClientEvent::JoinSession {
                session_id: sid("nowhere"),
            })
            .await;
        assert_eq!(error_code(&reply), 404);
    }
    let reply = alice
        .call(ClientEvent::CreateSession {
            session_id: sid("later"),
        })
        .await;
    assert_eq!(error_code(&reply), 429);

    // Other requests are not limited.
    let data = alice.call_ok(ClientEvent::Heartbeat { client_time: 7 }).await;
    assert!(matches!(data, ReplyData::HeartbeatAck { client_time: 7, .. }));

    // The limit is per connection.
    let mut bob = Client::named(&server.ws_addr, "bob").await;
    bob.call_ok(ClientEvent::CreateSession {
        session_id: sid("later"),
    })
    .await;
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let builder = StakeroomServerBuilder::new().idle_timeout(Duration::from_millis(100));
    let server = start_server_with(builder, MockLedger::new()).await;
    let mut client = Client::connect(&server.ws_addr).await;

    let next = tokio::time::timeout(Duration::from_secs(2), client.ws.next())
        .await
        .expect("server should close the idle connection");
    match next {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_waiting_creator_disconnect_destroys_session() {
    let ledger = MockLedger::new();
    let server = start_server(ledger.clone()).await;
    let id = sid("abandoned");

    let mut alice = Client::named(&server.ws_addr, "alice").await;
    alice
        .call_ok(ClientEvent::CreateSession {
            session_id: id.clone(),
        })
        .await;
    drop(alice);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut bob = Client::named(&server.ws_addr, "bob").await;
    let reply = bob
        .call(ClientEvent::JoinSession {
            session_id: id.clone(),
        })
        .await;
    assert_eq!(error_code(&reply), 404);
    assert!(ledger.calls().is_empty());
}

// =========================================================================
// HTTP surface
// =========================================================================

#[tokio::test]
async fn test_health_reports_ledger_readiness() {
    let ledger = MockLedger::new();
    let server = start_server(ledger.clone()).await;
    let url = format!("http://{}/health", server.http_addr);

    let health: HealthResponse = reqwest::get(&url)
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(health.status, "healthy");
    assert!(health.ledger_ready);

    ledger.set_ready(false);
    let health: HealthResponse = reqwest::get(&url)
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(health.status, "degraded");
}

#[tokio::test]
async fn test_stats_counts_sessions_and_connections() {
    let server = start_server(MockLedger::new()).await;
    let id = sid("stats");
    let (_alice, _bob) = active_pair(&server, &id).await;
    let _idle = Client::connect(&server.ws_addr).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stats: StatsResponse = reqwest::get(format!("http://{}/stats", server.http_addr))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(stats.sessions.active, 1);
    assert_eq!(stats.sessions.total, 1);
    assert_eq!(stats.sessions.participants, 2);
    assert_eq!(stats.connections, 3);
}
