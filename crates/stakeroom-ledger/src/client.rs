//! The [`LedgerClient`] trait and the values it returns.

use std::future::Future;

use serde::{Deserialize, Serialize};
use stakeroom_protocol::{Outcome, SessionId, StakeView};

use crate::LedgerError;

/// Proof that a ledger transaction went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    #[serde(default)]
    pub gas_used: u64,
}

/// Whether both stakes for a session are in escrow and equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeStatus {
    /// Both sides staked the same amount. Activation may proceed.
    Matched,
    /// At least one side is missing or the amounts differ.
    Unmatched,
    /// Anything else the ledger reports.
    #[serde(other)]
    Unknown,
}

/// Result of checking a session's stakes on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeValidation {
    /// Side A's stake, decimal string in token base units.
    pub side_a_stake: String,
    /// Side B's stake, decimal string in token base units.
    pub side_b_stake: String,
    pub status: StakeStatus,
}

impl StakeValidation {
    /// Returns `true` if activation may proceed.
    pub fn is_matched(&self) -> bool {
        self.status == StakeStatus::Matched
    }

    /// The amounts, as shown to clients.
    pub fn to_view(&self) -> StakeView {
        StakeView {
            side_a_stake: self.side_a_stake.clone(),
            side_b_stake: self.side_b_stake.clone(),
        }
    }
}

/// The narrow boundary to the external, authoritative ledger.
///
/// Every call may take seconds and may fail for reasons this system
/// cannot see into (network, gas, contract revert). Implementations must
/// not retry on their own: the lifecycle manager attempts each transition
/// at most once and surfaces failures to clients.
///
/// The futures are `Send` so calls can run inside spawned tasks.
pub trait LedgerClient: Send + Sync + 'static {
    /// Returns `true` once the client can reach the ledger.
    fn is_ready(&self) -> bool;

    /// Reads both stakes placed under `session_id`.
    fn validate_stakes(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<StakeValidation, LedgerError>> + Send;

    /// Locks the stakes and marks the session started on the ledger.
    fn start_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send;

    /// Pays out according to `outcome`.
    fn settle_session(
        &self,
        session_id: &SessionId,
        outcome: Outcome,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send;
}

impl<L: LedgerClient> LedgerClient for std::sync::Arc<L> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn validate_stakes(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<StakeValidation, LedgerError>> + Send {
        (**self).validate_stakes(session_id)
    }

    fn start_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send {
        (**self).start_session(session_id)
    }

    fn settle_session(
        &self,
        session_id: &SessionId,
        outcome: Outcome,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send {
        (**self).settle_session(session_id, outcome)
    }
}
