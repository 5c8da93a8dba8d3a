//! Wire protocol for Stakeroom.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Envelope`], [`ClientEvent`], [`ServerEvent`], [`Reply`]):
//!   the message structures that travel on the wire, plus the shared value
//!   types ([`SessionId`], [`Side`], [`Outcome`], [`SessionStatus`]).
//! - **Validation**: shape checks for names, session ids and moves.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Gateway → Lifecycle manager
//! ```

mod codec;
mod error;
mod types;
mod validate;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, CloseReason, Envelope, MoveInput, MoveView, Outcome, ParticipantView, Payload,
    Reply, ReplyData, ServerEvent, SessionId, SessionStatus, SessionView, SettlementView, Side,
    StakeView,
};
pub use validate::validate_display_name;
