//! # Stakeroom
//!
//! Real-time server for two-party wagered sessions.
//!
//! Two participants meet in a session, exchange moves over WebSocket, and
//! the stakes both placed on an external ledger are locked when the
//! session starts and paid out when it ends. This crate wires the layers
//! together:
//!
//! ```text
//! WebSocket → Envelope → gateway handler → LifecycleManager → LedgerClient
//!                             ↑                   │
//!                             └──── Directory ←───┘ (events)
//! ```
//!
//! plus a small HTTP surface (`/health`, `/stats`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stakeroom::prelude::*;
//!
//! # async fn run() -> Result<(), StakeroomError> {
//! let ledger = HttpLedgerClient::new(LedgerConfig {
//!     contract: "0xabc".into(),
//!     ..LedgerConfig::default()
//! })?;
//! ledger.initialize().await?;
//!
//! let server = StakeroomServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .http_bind("0.0.0.0:8081")
//!     .build(ledger)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod directory;
mod error;
mod handler;
mod http;
mod limit;
mod server;

pub use directory::{Directory, EventSender};
pub use error::StakeroomError;
pub use http::{HealthResponse, StatsResponse};
pub use limit::RateLimit;
pub use server::{StakeroomServer, StakeroomServerBuilder};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{RateLimit, StakeroomError, StakeroomServer, StakeroomServerBuilder};
    pub use stakeroom_ledger::{HttpLedgerClient, LedgerClient, LedgerConfig};
    pub use stakeroom_protocol::{
        ClientEvent, Envelope, MoveInput, MoveView, Outcome, Payload, Reply, ReplyData,
        ServerEvent, SessionId, SessionStatus, SessionView, SettlementView, Side,
    };
    pub use stakeroom_room::{LifecycleConfig, LifecycleManager};
}
