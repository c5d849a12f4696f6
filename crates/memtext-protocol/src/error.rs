//! Protocol-level errors.

use std::fmt;

/// A malformed or unrecognized command header. Always recoverable: the
/// connection state machine (in the `connection` crate) turns this
/// into an `ERROR\r\n` reply and keeps the socket open (spec §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The header's first token isn't a command this server knows.
    UnknownCommand(String),
    /// The header doesn't have as many fields as its verb requires, or
    /// a numeric field failed to parse.
    MalformedHeader(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(verb) => write!(f, "unknown command {verb:?}"),
            Self::MalformedHeader(reason) => write!(f, "malformed header: {reason}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

pub type Result<T> = std::result::Result<T, ProtocolError>;
