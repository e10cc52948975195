//! Blocking request/response client over the text encoding.
//!
//! One request is in flight at a time; after sending, the client reads
//! frames until one carries the expected response command. Frames of any
//! other kind (including pushes, which this variant has no way to observe)
//! are logged and skipped. An ERROR frame ends the exchange as
//! [`GatewayError::Gateway`].

use tracing::{debug, info, warn};

use crate::codec::TextCodec;
use crate::error::{GatewayError, Result};
use crate::protocol::{
    AccessLevel, Command, Credentials, DatalogReadResult, DeviceInfo, ExtensionCallResult,
    Message, MessagesReadResult, PropertyDescription, PropertyReadResult, PropertySelector,
    PropertyValue, PropertyWriteResult, SessionInfo, WriteFlags,
};
use crate::state::StateMachine;
use crate::transport::Transport;

/// Blocking client for command-line tools and scripts.
#[derive(Debug)]
pub struct SyncClient<T: Transport> {
    transport: T,
    state: StateMachine,
}

impl<T: Transport> SyncClient<T> {
    /// Connect over an already established transport and authorize.
    ///
    /// Blocks until AUTHORIZED arrives. Any ERROR frame or malformed frame
    /// during authorization fails the connect and closes the transport.
    pub fn connect(transport: T, credentials: Option<Credentials>) -> Result<Self> {
        let mut client = Self {
            transport,
            state: StateMachine::new(),
        };
        match client.authorize(credentials) {
            Ok(()) => Ok(client),
            Err(err) => {
                // Best effort teardown; the authorization error is the one
                // worth reporting.
                if let Err(close_err) = client.transport.close() {
                    debug!(error = %close_err, "transport close failed after failed connect");
                }
                Err(err)
            }
        }
    }

    fn authorize(&mut self, credentials: Option<Credentials>) -> Result<()> {
        self.state.begin_connect()?;
        self.state.transport_ready()?;
        let request = TextCodec::encode(&Message::Authorize { credentials })?;
        self.transport.send_frame(&request)?;
        loop {
            let frame = self.transport.recv_frame()?;
            match TextCodec::decode(&frame)? {
                Message::Authorized { session } => {
                    info!(
                        access_level = session.access_level.as_wire_str(),
                        gateway_version = %session.gateway_version,
                        "authorized"
                    );
                    self.state.authorized(session)?;
                    return Ok(());
                }
                Message::Error { reason } => return Err(GatewayError::Gateway(reason)),
                other => {
                    debug!(command = ?other.command(), "skipping frame during authorization");
                }
            }
        }
    }

    /// Send one request and block until the frame with the expected response
    /// command arrives.
    fn call(&mut self, request: Message, expect: Command) -> Result<Message> {
        self.state.require_connected()?;
        let encoded = TextCodec::encode(&request)?;
        if let Err(err) = self.transport.send_frame(&encoded) {
            self.state.disconnect();
            return Err(err);
        }
        loop {
            let frame = match self.transport.recv_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    self.state.disconnect();
                    return Err(err);
                }
            };
            let message = TextCodec::decode(&frame)?;
            if message.command() == expect {
                return Ok(message);
            }
            match message {
                Message::Error { reason } => return Err(GatewayError::Gateway(reason)),
                other => {
                    debug!(
                        command = ?other.command(),
                        expected = ?expect,
                        "skipping non-matching frame"
                    );
                }
            }
        }
    }

    /// List devices behind the gateway.
    pub fn enumerate(&mut self) -> Result<Vec<DeviceInfo>> {
        match self.call(Message::Enumerate, Command::Enumerated)? {
            Message::Enumerated { devices } => Ok(devices),
            other => Err(unexpected(other)),
        }
    }

    /// Describe the properties matched by a selector.
    pub fn describe(&mut self, selector: PropertySelector) -> Result<Vec<PropertyDescription>> {
        match self.call(Message::Describe { selector }, Command::Description)? {
            Message::Description { properties } => Ok(properties),
            other => Err(unexpected(other)),
        }
    }

    /// List the property ids matched by a selector.
    pub fn find_properties(&mut self, selector: PropertySelector) -> Result<Vec<String>> {
        match self.call(Message::FindProperties { selector }, Command::PropertiesFound)? {
            Message::PropertiesFound { ids } => Ok(ids),
            other => Err(unexpected(other)),
        }
    }

    /// Read one property.
    pub fn read_property(&mut self, id: impl Into<String>) -> Result<PropertyReadResult> {
        let request = Message::ReadProperty { id: id.into() };
        match self.call(request, Command::PropertyRead)? {
            Message::PropertyRead { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Read several properties in one exchange.
    pub fn read_properties(&mut self, ids: Vec<String>) -> Result<Vec<PropertyReadResult>> {
        match self.call(Message::ReadProperties { ids }, Command::PropertiesRead)? {
            Message::PropertiesRead { results } => Ok(results),
            other => Err(unexpected(other)),
        }
    }

    /// Write one property.
    pub fn write_property(
        &mut self,
        id: impl Into<String>,
        value: PropertyValue,
        flags: WriteFlags,
    ) -> Result<PropertyWriteResult> {
        let request = Message::WriteProperty {
            id: id.into(),
            value,
            flags,
        };
        match self.call(request, Command::PropertyWritten)? {
            Message::PropertyWritten { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// List the property ids with datalog history.
    pub fn read_datalog_properties(&mut self) -> Result<Vec<String>> {
        match self.call(
            Message::ReadDatalogProperties,
            Command::DatalogPropertiesRead,
        )? {
            Message::DatalogPropertiesRead { ids } => Ok(ids),
            other => Err(unexpected(other)),
        }
    }

    /// Retrieve logged samples of one property over a time window.
    pub fn read_datalog(
        &mut self,
        id: impl Into<String>,
        start: u64,
        end: u64,
    ) -> Result<DatalogReadResult> {
        let request = Message::ReadDatalog {
            id: id.into(),
            start,
            end,
        };
        match self.call(request, Command::DatalogRead)? {
            Message::DatalogRead { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Retrieve historical device messages over a time window.
    pub fn read_messages(&mut self, start: u64, end: u64) -> Result<MessagesReadResult> {
        match self.call(Message::ReadMessages { start, end }, Command::MessagesRead)? {
            Message::MessagesRead { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Invoke a gateway extension function.
    pub fn call_extension(
        &mut self,
        extension: impl Into<String>,
        function: impl Into<String>,
        parameters: Vec<String>,
    ) -> Result<ExtensionCallResult> {
        let request = Message::CallExtension {
            extension: extension.into(),
            function: function.into(),
            parameters,
        };
        match self.call(request, Command::ExtensionCalled)? {
            Message::ExtensionCalled { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Session granted at authorization.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.state.session()
    }

    /// Granted access level, present while connected.
    pub fn access_level(&self) -> Option<AccessLevel> {
        self.state.session().map(|s| s.access_level)
    }

    /// Close the connection.
    pub fn disconnect(mut self) -> Result<()> {
        self.state.disconnect();
        self.transport.close()
    }
}

fn unexpected(message: Message) -> GatewayError {
    // call() only returns a message whose command matched, so reaching here
    // means the command table and the message model disagree.
    warn!(command = ?message.command(), "response variant mismatch");
    GatewayError::Protocol(format!(
        "unexpected response variant for {}",
        message.command().keyword()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TextCodec;
    use crate::protocol::Status;
    use crate::transport::{blocking_pair, BlockingChannelTransport};
    use std::thread;

    fn gateway_respond(
        mut side: BlockingChannelTransport,
        mut script: impl FnMut(Message) -> Vec<Message> + Send + 'static,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while let Ok(frame) = side.recv_frame() {
                let request = TextCodec::decode(&frame).unwrap();
                for response in script(request) {
                    let encoded = TextCodec::encode(&response).unwrap();
                    if side.send_frame(&encoded).is_err() {
                        return;
                    }
                }
            }
        })
    }

    fn granted_session() -> SessionInfo {
        SessionInfo {
            access_level: AccessLevel::Installer,
            gateway_version: "2.4.0".to_string(),
            extensions: vec![],
        }
    }

    #[test]
    fn test_connect_and_read_property() {
        let (local, remote) = blocking_pair();
        let gateway = gateway_respond(remote, |request| match request {
            Message::Authorize { credentials } => {
                assert!(credentials.is_none());
                vec![Message::Authorized {
                    session: granted_session(),
                }]
            }
            Message::ReadProperty { id } => vec![Message::PropertyRead {
                result: PropertyReadResult {
                    status: Status::Success,
                    id,
                    value: Some(PropertyValue::Number(42.0)),
                },
            }],
            other => panic!("unexpected request {other:?}"),
        });

        let mut client = SyncClient::connect(local, None).unwrap();
        assert_eq!(client.access_level(), Some(AccessLevel::Installer));

        let result = client.read_property("acc.dev.temp").unwrap();
        assert_eq!(result.value, Some(PropertyValue::Number(42.0)));

        client.disconnect().unwrap();
        gateway.join().unwrap();
    }

    #[test]
    fn test_gateway_error_during_authorization() {
        let (local, remote) = blocking_pair();
        let gateway = gateway_respond(remote, |_| {
            vec![Message::Error {
                reason: "bad credentials".to_string(),
            }]
        });

        let err = SyncClient::connect(local, Some(Credentials::new("svc", "wrong"))).unwrap_err();
        assert!(matches!(err, GatewayError::Gateway(r) if r == "bad credentials"));
        gateway.join().unwrap();
    }

    #[test]
    fn test_push_frames_skipped_while_waiting() {
        let (local, remote) = blocking_pair();
        let gateway = gateway_respond(remote, |request| match request {
            Message::Authorize { .. } => vec![Message::Authorized {
                session: granted_session(),
            }],
            Message::Enumerate => vec![
                // A push arriving before the awaited response is dropped.
                Message::PropertyUpdate {
                    id: "acc.dev.temp".to_string(),
                    value: PropertyValue::Number(3.0),
                },
                Message::Enumerated { devices: vec![] },
            ],
            other => panic!("unexpected request {other:?}"),
        });

        let mut client = SyncClient::connect(local, None).unwrap();
        assert_eq!(client.enumerate().unwrap(), vec![]);
        client.disconnect().unwrap();
        gateway.join().unwrap();
    }

    #[test]
    fn test_malformed_frame_during_authorization_fails_connect() {
        let (local, mut remote) = blocking_pair();
        let gateway = thread::spawn(move || {
            remote.recv_frame().unwrap();
            remote.send_frame(b"not a frame").unwrap();
        });

        assert!(SyncClient::connect(local, None).is_err());
        gateway.join().unwrap();
    }

    #[test]
    fn test_transport_close_mid_call_disconnects() {
        let (local, mut remote) = blocking_pair();
        let gateway = thread::spawn(move || {
            let frame = remote.recv_frame().unwrap();
            assert!(matches!(
                TextCodec::decode(&frame).unwrap(),
                Message::Authorize { .. }
            ));
            let granted = TextCodec::encode(&Message::Authorized {
                session: granted_session(),
            })
            .unwrap();
            remote.send_frame(&granted).unwrap();
            // Swallow the next request and close without answering.
            remote.recv_frame().unwrap();
        });

        let mut client = SyncClient::connect(local, None).unwrap();
        assert!(matches!(
            client.enumerate().unwrap_err(),
            GatewayError::ConnectionClosed
        ));
        // The failed exchange tore the connection down; further calls fail
        // locally without touching the transport.
        assert!(matches!(
            client.enumerate().unwrap_err(),
            GatewayError::State { .. }
        ));
        gateway.join().unwrap();
    }
}
