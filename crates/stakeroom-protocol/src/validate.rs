//! Input validation for client-supplied values.
//!
//! The gateway runs these checks before anything reaches the lifecycle
//! manager, so a rejected input never mutates session state.

use crate::{MoveInput, ProtocolError, SessionId};

/// Minimum display name length, after trimming.
pub const NAME_MIN_LEN: usize = 2;
/// Maximum display name length, after trimming.
pub const NAME_MAX_LEN: usize = 20;
/// Minimum session id length.
pub const SESSION_ID_MIN_LEN: usize = 10;
/// Maximum session id length.
pub const SESSION_ID_MAX_LEN: usize = 100;
/// Maximum length of a move's encoded form.
pub const NOTATION_MAX_LEN: usize = 16;

/// Checks a display name and returns it trimmed.
///
/// Names are 2–20 characters of ASCII letters, digits, spaces, `-`, `_`
/// and `.`.
pub fn validate_display_name(name: &str) -> Result<String, ProtocolError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(ProtocolError::field(
            "name",
            format!("must be {NAME_MIN_LEN}-{NAME_MAX_LEN} characters"),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.');
    if !trimmed.chars().all(allowed) {
        return Err(ProtocolError::field("name", "contains invalid characters"));
    }
    Ok(trimmed.to_owned())
}

impl SessionId {
    /// Validates untrusted input and wraps it.
    ///
    /// Accepts 10–100 characters of ASCII letters, digits, `-` and `_`.
    /// UUIDs qualify; nothing else about the format is assumed.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if !(SESSION_ID_MIN_LEN..=SESSION_ID_MAX_LEN).contains(&raw.len()) {
            return Err(ProtocolError::field(
                "session_id",
                format!("must be {SESSION_ID_MIN_LEN}-{SESSION_ID_MAX_LEN} characters"),
            ));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ProtocolError::field(
                "session_id",
                "contains invalid characters",
            ));
        }
        Ok(Self::new(raw))
    }

    /// Re-checks an already-wrapped id (e.g. one that came off the wire).
    pub fn validate(&self) -> Result<(), ProtocolError> {
        Self::parse(self.as_str()).map(|_| ())
    }
}

/// Returns `true` for a board coordinate `a1`..`h8`.
fn is_square(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 2 && (b'a'..=b'h').contains(&bytes[0]) && (b'1'..=b'8').contains(&bytes[1])
}

impl MoveInput {
    /// Checks the structural shape of a move. Does not check legality.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !is_square(&self.from) || !is_square(&self.to) {
            return Err(ProtocolError::field("move", "coordinates must be a1-h8"));
        }
        if self.from == self.to {
            return Err(ProtocolError::field("move", "from and to are the same square"));
        }
        if let Some(notation) = &self.notation {
            if notation.is_empty() || notation.len() > NOTATION_MAX_LEN {
                return Err(ProtocolError::field(
                    "move",
                    format!("notation must be 1-{NOTATION_MAX_LEN} characters"),
                ));
            }
        }
        if let Some(piece) = &self.promotion {
            if !matches!(piece.as_str(), "q" | "r" | "b" | "n") {
                return Err(ProtocolError::field(
                    "move",
                    "promotion must be one of q, r, b, n",
                ));
            }
        }
        Ok(())
    }
}
