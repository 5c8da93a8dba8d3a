//! `StakeroomServer` builder and server loop.
//!
//! This is the entry point for running a Stakeroom server. It ties
//! together all the layers: transport → protocol → gateway → lifecycle
//! manager → ledger, plus the HTTP status surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stakeroom_ledger::LedgerClient;
use stakeroom_protocol::{Codec, JsonCodec};
use stakeroom_room::{LifecycleConfig, LifecycleManager};
use stakeroom_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::{Directory, RateLimit, StakeroomError};

/// Shared server state passed to each connection task and HTTP handler.
pub(crate) struct ServerState<L: LedgerClient, C: Codec> {
    pub(crate) manager: LifecycleManager<L>,
    pub(crate) directory: Arc<Directory>,
    pub(crate) codec: C,
    /// A connection silent for this long is closed.
    pub(crate) idle_timeout: Duration,
    /// Cap on create and join requests per connection.
    pub(crate) session_ops: RateLimit,
}

impl<L: LedgerClient, C: Codec> ServerState<L, C> {
    pub(crate) fn new(ledger: L, codec: C, lifecycle: LifecycleConfig, idle_timeout: Duration) -> Self {
        let directory = Arc::new(Directory::new());
        let manager = LifecycleManager::new(ledger, directory.clone(), lifecycle);
        Self {
            manager,
            directory,
            codec,
            idle_timeout,
            session_ops: RateLimit::default(),
        }
    }
}

/// Builder for configuring and starting a Stakeroom server.
///
/// # Example
///
/// ```rust,ignore
/// use stakeroom::prelude::*;
///
/// let server = StakeroomServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .http_bind("0.0.0.0:8081")
///     .build(ledger)
///     .await?;
/// server.run().await
/// ```
pub struct StakeroomServerBuilder {
    bind_addr: String,
    http_addr: String,
    idle_timeout: Duration,
    session_ops: RateLimit,
    lifecycle: LifecycleConfig,
}

impl StakeroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            http_addr: "127.0.0.1:8081".to_string(),
            idle_timeout: Duration::from_secs(60),
            session_ops: RateLimit::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }

    /// Sets the address the WebSocket gateway listens on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the address of the HTTP status surface.
    pub fn http_bind(mut self, addr: &str) -> Self {
        self.http_addr = addr.to_string();
        self
    }

    /// Closes connections that send nothing for this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Limits how often one connection may create or join sessions.
    pub fn session_rate_limit(mut self, limit: RateLimit) -> Self {
        self.session_ops = limit;
        self
    }

    pub fn lifecycle(mut self, config: LifecycleConfig) -> Self {
        self.lifecycle = config;
        self
    }

    /// Binds both listeners and wires the layers together.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<L: LedgerClient>(
        self,
        ledger: L,
    ) -> Result<StakeroomServer<L, JsonCodec>, StakeroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let http = TcpListener::bind(self.http_addr.as_str()).await?;

        let mut state = ServerState::new(ledger, JsonCodec, self.lifecycle, self.idle_timeout);
        state.session_ops = self.session_ops;
        let state = Arc::new(state);

        Ok(StakeroomServer {
            transport,
            http,
            state,
        })
    }
}

impl Default for StakeroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Stakeroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct StakeroomServer<L: LedgerClient, C: Codec> {
    transport: WebSocketTransport,
    http: TcpListener,
    state: Arc<ServerState<L, C>>,
}

impl<L, C> StakeroomServer<L, C>
where
    L: LedgerClient,
    C: Codec,
{
    /// Returns the address the WebSocket gateway is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the address the HTTP status surface is bound to.
    pub fn http_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// The lifecycle manager behind this server.
    pub fn manager(&self) -> &LifecycleManager<L> {
        &self.state.manager
    }

    /// Runs the server.
    ///
    /// Starts the inactivity sweep and the HTTP surface, then accepts
    /// connections and spawns a handler task for each. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), StakeroomError> {
        let _sweeper = self.state.manager.spawn_sweeper();

        let app = crate::http::router(Arc::clone(&self.state));
        let http = self.http;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http, app).await {
                tracing::error!(error = %e, "http surface stopped");
            }
        });

        tracing::info!(
            ledger_ready = self.state.manager.ledger_ready(),
            "Stakeroom server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
