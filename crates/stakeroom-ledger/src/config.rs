//! Ledger client configuration.

use std::time::Duration;

/// Configuration for [`HttpLedgerClient`](crate::HttpLedgerClient).
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger gateway.
    pub endpoint: String,

    /// Address of the escrow contract holding the stakes.
    pub contract: String,

    /// Upper bound on a single call, including waiting for the
    /// transaction receipt.
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            contract: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
