//! Client side of the external stake/settlement ledger.
//!
//! The ledger (a smart-contract escrow behind a JSON-RPC gateway) is the
//! authority on stakes and payouts. This crate exposes it as three slow,
//! fallible calls behind the [`LedgerClient`] trait:
//!
//! - [`validate_stakes`](LedgerClient::validate_stakes): are both stakes in?
//! - [`start_session`](LedgerClient::start_session): lock them.
//! - [`settle_session`](LedgerClient::settle_session): pay out.
//!
//! [`HttpLedgerClient`] is the production implementation. With the `mock`
//! feature, [`MockLedger`] provides a scriptable stand-in for tests.

mod client;
mod config;
mod error;
mod http;
#[cfg(feature = "mock")]
mod mock;

pub use client::{LedgerClient, Receipt, StakeStatus, StakeValidation};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use http::{HttpLedgerClient, NetworkInfo};
#[cfg(feature = "mock")]
pub use mock::{LedgerCall, MockLedger};
