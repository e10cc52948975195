//! Connection state machine shared by all three client variants.
//!
//! ```text
//! Disconnected --connect()--> Connecting --transport ready--> Authorizing
//! Authorizing --AUTHORIZED--> Connected
//! Authorizing --ERROR | malformed frame | transport close--> Disconnected
//! Connected --disconnect() | transport close--> Disconnected
//! ```
//!
//! Every public client operation other than connect/disconnect asserts
//! `Connected` before touching the transport; a violation is a local
//! [`GatewayError::State`], never a silent no-op, because a request issued
//! before authorization completes would desynchronize response matching.

use std::fmt;

use crate::error::{GatewayError, Result};
use crate::protocol::SessionInfo;

/// Lifecycle state of one client connection. Exactly one is active at a
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authorizing,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Authorizing => "Authorizing",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(name)
    }
}

/// Tracks the connection lifecycle and owns the session granted at
/// authorization. The session is captured exactly once and cleared on
/// disconnect.
#[derive(Debug)]
pub struct StateMachine {
    state: ConnectionState,
    session: Option<SessionInfo>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session granted by the gateway, present only while `Connected`.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// `Disconnected -> Connecting`; the transport handshake begins.
    pub fn begin_connect(&mut self) -> Result<()> {
        self.require(ConnectionState::Disconnected)?;
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// `Connecting -> Authorizing`; the authorization frame is on the wire.
    pub fn transport_ready(&mut self) -> Result<()> {
        self.require(ConnectionState::Connecting)?;
        self.state = ConnectionState::Authorizing;
        Ok(())
    }

    /// `Authorizing -> Connected`, capturing the granted session.
    pub fn authorized(&mut self, session: SessionInfo) -> Result<()> {
        self.require(ConnectionState::Authorizing)?;
        self.state = ConnectionState::Connected;
        self.session = Some(session);
        Ok(())
    }

    /// Any state `-> Disconnected`. Used for explicit disconnects,
    /// authorization failures, and transport closes alike.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.session = None;
    }

    /// Assert the connection is `Connected`.
    pub fn require_connected(&self) -> Result<()> {
        self.require(ConnectionState::Connected)
    }

    fn require(&self, expected: ConnectionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GatewayError::State {
                expected,
                actual: self.state,
            })
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
