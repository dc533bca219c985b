//! Error types for Brook.
//!
//! One crate-wide error enum, rendered onto the wire via
//! [`BrookError::to_resp_error`]. Client-driven failures never terminate the
//! process; only I/O-level errors close a connection.

use std::io;
use thiserror::Error;

/// Main error type for Brook operations
#[derive(Error, Debug)]
pub enum BrookError {
    /// Protocol parsing or framing error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unknown or unimplemented command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments for a command
    #[error("Wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// Command syntax error
    #[error("ERR syntax error")]
    Syntax,

    /// Argument value rejected with a specific reason
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stream ID text that is not `<ms>-<seq>` or an accepted token
    #[error("ERR Invalid stream ID specified as stream command argument")]
    InvalidStreamId,

    /// XADD ID not strictly greater than the stream's last ID
    #[error("ERR Stream ID must be greater than last ID")]
    IdTooSmall,

    /// XGROUP CREATE on a group that already exists
    #[error("BUSYGROUP Consumer Group name already exists")]
    GroupExists,

    /// Group-addressed command against a missing group
    #[error("NOGROUP No such consumer group for key")]
    NoSuchGroup,

    /// Value cannot be parsed as integer
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection was closed mid-frame
    #[error("Connection closed")]
    ConnectionClosed,

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Brook operations
pub type Result<T> = std::result::Result<T, BrookError>;

impl BrookError {
    /// Returns true if this error should close the connection
    #[cold]
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrookError::Io(_) | BrookError::ConnectionClosed)
    }

    /// Convert error to a RESP error string (without the leading `-`)
    #[cold]
    pub fn to_resp_error(&self) -> String {
        match self {
            BrookError::Protocol(msg) => format!("ERR {msg}"),
            BrookError::UnknownCommand(cmd) => format!("ERR unknown command '{cmd}'"),
            BrookError::WrongArity(cmd) => {
                format!("ERR wrong number of arguments for '{cmd}' command")
            }
            BrookError::Syntax => "ERR syntax error".to_string(),
            BrookError::InvalidArgument(msg) => format!("ERR {msg}"),
            BrookError::InvalidStreamId => {
                "ERR Invalid stream ID specified as stream command argument".to_string()
            }
            BrookError::IdTooSmall => "ERR Stream ID must be greater than last ID".to_string(),
            BrookError::GroupExists => "BUSYGROUP Consumer Group name already exists".to_string(),
            BrookError::NoSuchGroup => "NOGROUP No such consumer group for key".to_string(),
            BrookError::NotInteger => "ERR value is not an integer or out of range".to_string(),
            _ => format!("ERR {self}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_fatal() {
        assert!(BrookError::ConnectionClosed.is_fatal());
        assert!(BrookError::Io(io::Error::new(io::ErrorKind::Other, "boom")).is_fatal());
        assert!(!BrookError::IdTooSmall.is_fatal());
        assert!(!BrookError::Protocol("bad frame".to_string()).is_fatal());
    }

    #[test]
    fn test_error_to_resp() {
        assert_eq!(
            BrookError::WrongArity("xadd".to_string()).to_resp_error(),
            "ERR wrong number of arguments for 'xadd' command"
        );
        assert_eq!(
            BrookError::UnknownCommand("FOO".to_string()).to_resp_error(),
            "ERR unknown command 'FOO'"
        );
        assert_eq!(
            BrookError::GroupExists.to_resp_error(),
            "BUSYGROUP Consumer Group name already exists"
        );
        assert!(BrookError::IdTooSmall.to_resp_error().starts_with("ERR "));
    }
}
