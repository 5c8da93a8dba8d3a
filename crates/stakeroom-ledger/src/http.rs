//! JSON-RPC over HTTP implementation of [`LedgerClient`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stakeroom_protocol::{Outcome, SessionId};

use crate::{LedgerClient, LedgerConfig, LedgerError, Receipt, StakeValidation};

/// Network information returned by the `ledger_status` probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkInfo {
    pub chain_id: u64,
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: &'a P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Serialize)]
struct SessionParams<'a> {
    contract: &'a str,
    session_id: &'a SessionId,
}

#[derive(Serialize)]
struct SettleParams<'a> {
    contract: &'a str,
    session_id: &'a SessionId,
    outcome: Outcome,
}

/// Talks to the ledger gateway over JSON-RPC.
///
/// The client starts out not ready. [`initialize`](Self::initialize) probes
/// the endpoint; until that succeeds every call fails with
/// [`LedgerError::NotInitialized`].
pub struct HttpLedgerClient {
    config: LedgerConfig,
    http: reqwest::Client,
    ready: AtomicBool,
    next_id: AtomicU64,
}

impl HttpLedgerClient {
    /// Builds a client. Does not touch the network.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        if config.contract.trim().is_empty() {
            return Err(LedgerError::Config("contract address is required".into()));
        }
        if reqwest::Url::parse(&config.endpoint).is_err() {
            return Err(LedgerError::Config(format!(
                "endpoint is not a URL: {}",
                config.endpoint
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            ready: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    /// Probes the ledger and marks the client ready on success.
    pub async fn initialize(&self) -> Result<NetworkInfo, LedgerError> {
        let info: NetworkInfo = self.call("ledger_status", &()).await?;
        self.ready.store(true, Ordering::Release);
        tracing::info!(
            endpoint = %self.config.endpoint,
            chain_id = info.chain_id,
            "ledger client initialized"
        );
        Ok(info)
    }

    fn ensure_ready(&self) -> Result<(), LedgerError> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(LedgerError::NotInitialized)
        }
    }

    async fn call<P, R>(&self, method: &'static str, params: &P) -> Result<R, LedgerError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse<R> = self
            .http
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (response.result, response.error) {
            (_, Some(err)) => Err(LedgerError::Rpc {
                method,
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(LedgerError::InvalidResponse {
                method,
                reason: "neither result nor error present".into(),
            }),
        }
    }
}

impl LedgerClient for HttpLedgerClient {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn validate_stakes(
        &self,
        session_id: &SessionId,
    ) -> Result<StakeValidation, LedgerError> {
        self.ensure_ready()?;
        let params = SessionParams {
            contract: &self.config.contract,
            session_id,
        };
        self.call("ledger_validateStakes", &params).await
    }

    async fn start_session(&self, session_id: &SessionId) -> Result<Receipt, LedgerError> {
        self.ensure_ready()?;
        tracing::debug!(%session_id, "starting session on ledger");
        let params = SessionParams {
            contract: &self.config.contract,
            session_id,
        };
        let receipt: Receipt = self.call("ledger_startSession", &params).await?;
        tracing::info!(%session_id, tx_hash = %receipt.tx_hash, gas_used = receipt.gas_used, "ledger session started");
        Ok(receipt)
    }

    async fn settle_session(
        &self,
        session_id: &SessionId,
        outcome: Outcome,
    ) -> Result<Receipt, LedgerError> {
        self.ensure_ready()?;
        tracing::debug!(%session_id, %outcome, "settling session on ledger");
        let params = SettleParams {
            contract: &self.config.contract,
            session_id,
            outcome,
        };
        let receipt: Receipt = self.call("ledger_settleSession", &params).await?;
        tracing::info!(%session_id, tx_hash = %receipt.tx_hash, gas_used = receipt.gas_used, "ledger session settled");
        Ok(receipt)
    }
}
