//! Error types for gateway-client.

use thiserror::Error;

use crate::protocol::Command;
use crate::state::ConnectionState;

/// Main error type for all gateway client operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error during transport operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while encoding or decoding a frame body.
    #[error("JSON body error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed frame, missing mandatory header/field, or a wire value
    /// that cannot be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Not enough bytes for a complete value. Kept distinct from
    /// [`GatewayError::Protocol`]: the BLE reassembly layer uses it to tell
    /// "wait for another fragment" apart from "the frame is garbage".
    #[error("truncated frame")]
    Truncated,

    /// The command has no representation in the encoding in use.
    #[error("command {0:?} is not supported by this encoding")]
    UnsupportedCommand(Command),

    /// The gateway speaks a protocol version this client does not.
    #[error("unsupported protocol version: {0:?}")]
    VersionMismatch(String),

    /// Operation invoked outside its legal connection state. Never touches
    /// the transport.
    #[error("invalid state: operation requires {expected}, connection is {actual}")]
    State {
        /// State the operation requires.
        expected: ConnectionState,
        /// State the connection was actually in.
        actual: ConnectionState,
    },

    /// The gateway itself reported a failure frame. Not a client defect.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Transport closed mid-exchange.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Protocol error for a missing mandatory header or field.
    pub(crate) fn missing(command: Command, key: &str) -> Self {
        GatewayError::Protocol(format!(
            "missing mandatory field {key:?} in {} frame",
            command.keyword()
        ))
    }
}
