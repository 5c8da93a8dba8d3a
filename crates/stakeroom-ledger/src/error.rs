//! Error types for the ledger client.

/// Errors returned by a [`LedgerClient`](crate::LedgerClient).
///
/// Callers in the lifecycle layer only ever ask "did it succeed"; the
/// variants exist for logs and for the client's own tests.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A call was made before [`initialize`](crate::HttpLedgerClient::initialize)
    /// succeeded.
    #[error("ledger client not initialized")]
    NotInitialized,

    /// The client configuration is unusable.
    #[error("invalid ledger configuration: {0}")]
    Config(String),

    /// The HTTP request failed (connect, timeout, non-2xx status).
    #[error("ledger transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The ledger answered with a JSON-RPC error object, e.g. a contract
    /// revert or insufficient funds.
    #[error("ledger rejected {method}: {message} (code {code})")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },

    /// The response had neither a result nor an error, or the result did
    /// not have the expected shape.
    #[error("invalid ledger response to {method}: {reason}")]
    InvalidResponse {
        method: &'static str,
        reason: String,
    },

    /// A scripted failure from the mock ledger.
    #[cfg(feature = "mock")]
    #[error("mock ledger failure: {0}")]
    Mock(String),
}
