//! Session store and lifecycle manager for Stakeroom.
//!
//! A session pairs two participants, relays their moves, and is settled
//! against the external ledger when it finishes. All state lives in memory
//! in one [`SessionStore`]; the [`LifecycleManager`] is its only writer and
//! the only caller of the ledger.
//!
//! # Key types
//!
//! - [`LifecycleManager`]: create / join / move / end / disconnect, timers
//! - [`SessionStore`]: sessions plus the `connection → session` index
//! - [`Session`], [`Participant`], [`MoveRecord`]: the model
//! - [`EventSink`]: where events for other participants go
//! - [`LifecycleConfig`]: timeouts and grace periods

mod config;
mod error;
mod manager;
mod session;
mod sink;
mod store;

pub use config::LifecycleConfig;
pub use error::{LifecycleError, StoreError};
pub use manager::LifecycleManager;
pub use session::{Joiner, MoveRecord, Participant, Revision, Session, SettlementState};
pub use sink::EventSink;
pub use store::{Removal, SessionStats, SessionStore};
