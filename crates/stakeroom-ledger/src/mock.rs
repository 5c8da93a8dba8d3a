//! A scriptable in-memory ledger for tests.
//!
//! Every call is recorded. Failures can be scripted per operation, and
//! [`MockLedger::hold`] parks calls until [`MockLedger::release`] so a test
//! can act on a session while a ledger call is in flight.

use std::sync::{Arc, Mutex, PoisonError};

use stakeroom_protocol::{Outcome, SessionId};
use tokio::sync::watch;

use crate::{LedgerClient, LedgerError, Receipt, StakeStatus, StakeValidation};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    ValidateStakes(SessionId),
    StartSession(SessionId),
    SettleSession(SessionId, Outcome),
}

#[derive(Default)]
struct Script {
    ready: bool,
    fail_validate: Option<String>,
    fail_start: Option<String>,
    fail_settle: Option<String>,
    stake_status: Option<StakeStatus>,
    calls: Vec<LedgerCall>,
}

struct Shared {
    script: Mutex<Script>,
    gate: watch::Sender<bool>,
    started: watch::Sender<usize>,
}

/// In-memory [`LedgerClient`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MockLedger {
    shared: Arc<Shared>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// A ready ledger on which every call succeeds with matched stakes.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Script {
                    ready: true,
                    ..Script::default()
                }),
                gate: watch::Sender::new(true),
                started: watch::Sender::new(0),
            }),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.shared
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets what `is_ready` reports.
    pub fn set_ready(&self, ready: bool) {
        self.script().ready = ready;
    }

    /// Makes `validate_stakes` fail (`Some`) or succeed (`None`).
    pub fn fail_validate(&self, reason: Option<&str>) {
        self.script().fail_validate = reason.map(str::to_owned);
    }

    /// Makes `start_session` fail (`Some`) or succeed (`None`).
    pub fn fail_start(&self, reason: Option<&str>) {
        self.script().fail_start = reason.map(str::to_owned);
    }

    /// Makes `settle_session` fail (`Some`) or succeed (`None`).
    pub fn fail_settle(&self, reason: Option<&str>) {
        self.script().fail_settle = reason.map(str::to_owned);
    }

    /// Overrides the status `validate_stakes` reports on success.
    pub fn set_stake_status(&self, status: StakeStatus) {
        self.script().stake_status = Some(status);
    }

    /// Parks every subsequent call until [`release`](Self::release).
    pub fn hold(&self) {
        self.shared.gate.send_replace(false);
    }

    /// Lets parked and future calls through.
    pub fn release(&self) {
        self.shared.gate.send_replace(true);
    }

    /// Waits until at least `n` calls have been made (held or not).
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.shared.started.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|started| *started >= n).await;
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.script().calls.clone()
    }

    /// How many settle calls were made for `session_id`.
    pub fn settle_count(&self, session_id: &SessionId) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| matches!(c, LedgerCall::SettleSession(id, _) if id == session_id))
            .count()
    }

    /// Records the call, waits at the gate, then returns the scripted
    /// failure for it, if any.
    async fn enter(&self, call: LedgerCall) -> Option<String> {
        let failure = {
            let mut script = self.script();
            let failure = match &call {
                LedgerCall::ValidateStakes(_) => script.fail_validate.clone(),
                LedgerCall::StartSession(_) => script.fail_start.clone(),
                LedgerCall::SettleSession(..) => script.fail_settle.clone(),
            };
            script.calls.push(call);
            failure
        };
        self.shared.started.send_modify(|n| *n += 1);

        let mut gate = self.shared.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        failure
    }
}

impl LedgerClient for MockLedger {
    fn is_ready(&self) -> bool {
        self.script().ready
    }

    async fn validate_stakes(
        &self,
        session_id: &SessionId,
    ) -> Result<StakeValidation, LedgerError> {
        if let Some(reason) = self.enter(LedgerCall::ValidateStakes(session_id.clone())).await {
            return Err(LedgerError::Mock(reason));
        }
        let status = self.script().stake_status.unwrap_or(StakeStatus::Matched);
        Ok(StakeValidation {
            side_a_stake: "1000".into(),
            side_b_stake: "1000".into(),
            status,
        })
    }

    async fn start_session(&self, session_id: &SessionId) -> Result<Receipt, LedgerError> {
        if let Some(reason) = self.enter(LedgerCall::StartSession(session_id.clone())).await {
            return Err(LedgerError::Mock(reason));
        }
        Ok(Receipt {
            tx_hash: format!("0xstart-{session_id}"),
            gas_used: 21_000,
        })
    }

    async fn settle_session(
        &self,
        session_id: &SessionId,
        outcome: Outcome,
    ) -> Result<Receipt, LedgerError> {
        if let Some(reason) = self
            .enter(LedgerCall::SettleSession(session_id.clone(), outcome))
            .await
        {
            return Err(LedgerError::Mock(reason));
        }
        Ok(Receipt {
            tx_hash: format!("0xsettle-{session_id}"),
            gas_used: 42_000,
        })
    }
}
