//! Read-only HTTP status surface.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use stakeroom_ledger::LedgerClient;
use stakeroom_protocol::Codec;
use stakeroom_room::SessionStats;

use crate::server::ServerState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when the ledger client is ready, else `degraded`.
    pub status: String,
    pub ledger_ready: bool,
    pub sessions: SessionStats,
    /// RFC 3339.
    pub timestamp: String,
}

/// Statistics response: session counts plus open connections.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub sessions: SessionStats,
    pub connections: usize,
}

pub(crate) fn router<L: LedgerClient, C: Codec>(state: Arc<ServerState<L, C>>) -> Router {
    Router::new()
        .route("/health", get(health::<L, C>))
        .route("/stats", get(stats::<L, C>))
        .with_state(state)
}

async fn health<L: LedgerClient, C: Codec>(
    State(state): State<Arc<ServerState<L, C>>>,
) -> Json<HealthResponse> {
    let ledger_ready = state.manager.ledger_ready();
    Json(HealthResponse {
        status: if ledger_ready { "healthy" } else { "degraded" }.to_string(),
        ledger_ready,
        sessions: state.manager.stats(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn stats<L: LedgerClient, C: Codec>(
    State(state): State<Arc<ServerState<L, C>>>,
) -> Json<StatsResponse> {
    Json(StatsResponse {
        sessions: state.manager.stats(),
        connections: state.directory.len(),
    })
}
