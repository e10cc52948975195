//! Event-driven client over the text encoding.
//!
//! Operations are fire-and-forget sends; every gateway-to-client frame,
//! solicited or pushed, is routed through [`EventHandlers`] by a dedicated
//! receive task. Outgoing frames go through the shared writer task.
//!
//! Error handling is asymmetric around authorization: a malformed frame
//! during the handshake fails `connect`, while after authorization it only
//! reaches the error callback and the loop keeps running.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::lock_state;
use crate::codec::TextCodec;
use crate::error::{GatewayError, Result};
use crate::handler::EventHandlers;
use crate::protocol::{
    AccessLevel, Credentials, Message, PropertySelector, PropertyValue, SessionInfo, WriteFlags,
};
use crate::state::{ConnectionState, StateMachine};
use crate::transport::{FrameReader, FrameTransport};
use crate::writer::{spawn_writer_task, WriterHandle};

const WRITER_QUEUE_CAPACITY: usize = 32;

/// Async client whose responses and pushes arrive through callbacks.
pub struct EventClient {
    writer: WriterHandle,
    shared: Arc<Mutex<StateMachine>>,
    receiver_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl EventClient {
    /// Connect over an already established transport and authorize.
    ///
    /// Resolves once AUTHORIZED arrives; only then does the receive task
    /// start and the handlers become reachable.
    pub async fn connect<T: FrameTransport>(
        transport: T,
        credentials: Option<Credentials>,
        handlers: EventHandlers,
    ) -> Result<Self> {
        let (mut reader, writer_half) = transport.split();
        let mut state = StateMachine::new();
        state.begin_connect()?;
        state.transport_ready()?;

        let (writer, writer_task) = spawn_writer_task(writer_half, WRITER_QUEUE_CAPACITY);
        let request = TextCodec::encode(&Message::Authorize { credentials })?;
        writer.send(request).await?;

        loop {
            let frame = reader
                .recv()
                .await?
                .ok_or(GatewayError::ConnectionClosed)?;
            // A frame that fails to decode here is fatal: nothing is
            // authorized yet and there is no error callback contract.
            match TextCodec::decode(&frame)? {
                Message::Authorized { session } => {
                    info!(
                        access_level = session.access_level.as_wire_str(),
                        gateway_version = %session.gateway_version,
                        "authorized"
                    );
                    state.authorized(session)?;
                    break;
                }
                Message::Error { reason } => return Err(GatewayError::Gateway(reason)),
                other => {
                    debug!(command = ?other.command(), "skipping frame during authorization");
                }
            }
        }

        let shared = Arc::new(Mutex::new(state));
        let receiver_task = tokio::spawn(receive_loop(reader, handlers, shared.clone()));
        Ok(Self {
            writer,
            shared,
            receiver_task,
            writer_task,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        lock_state(&self.shared).state()
    }

    /// Session granted at authorization.
    pub fn session(&self) -> Option<SessionInfo> {
        lock_state(&self.shared).session().cloned()
    }

    /// Granted access level, present while connected.
    pub fn access_level(&self) -> Option<AccessLevel> {
        lock_state(&self.shared).session().map(|s| s.access_level)
    }

    pub async fn enumerate(&self) -> Result<()> {
        self.send(Message::Enumerate).await
    }

    pub async fn describe(&self, selector: PropertySelector) -> Result<()> {
        self.send(Message::Describe { selector }).await
    }

    pub async fn find_properties(&self, selector: PropertySelector) -> Result<()> {
        self.send(Message::FindProperties { selector }).await
    }

    pub async fn read_property(&self, id: impl Into<String>) -> Result<()> {
        self.send(Message::ReadProperty { id: id.into() }).await
    }

    pub async fn read_properties(&self, ids: Vec<String>) -> Result<()> {
        self.send(Message::ReadProperties { ids }).await
    }

    pub async fn write_property(
        &self,
        id: impl Into<String>,
        value: PropertyValue,
        flags: WriteFlags,
    ) -> Result<()> {
        self.send(Message::WriteProperty {
            id: id.into(),
            value,
            flags,
        })
        .await
    }

    pub async fn subscribe_property(&self, id: impl Into<String>) -> Result<()> {
        self.send(Message::SubscribeProperty { id: id.into() }).await
    }

    pub async fn subscribe_properties(&self, ids: Vec<String>) -> Result<()> {
        self.send(Message::SubscribeProperties { ids }).await
    }

    pub async fn unsubscribe_property(&self, id: impl Into<String>) -> Result<()> {
        self.send(Message::UnsubscribeProperty { id: id.into() })
            .await
    }

    pub async fn unsubscribe_properties(&self, ids: Vec<String>) -> Result<()> {
        self.send(Message::UnsubscribeProperties { ids }).await
    }

    pub async fn read_datalog_properties(&self) -> Result<()> {
        self.send(Message::ReadDatalogProperties).await
    }

    pub async fn read_datalog(&self, id: impl Into<String>, start: u64, end: u64) -> Result<()> {
        self.send(Message::ReadDatalog {
            id: id.into(),
            start,
            end,
        })
        .await
    }

    pub async fn read_messages(&self, start: u64, end: u64) -> Result<()> {
        self.send(Message::ReadMessages { start, end }).await
    }

    pub async fn call_extension(
        &self,
        extension: impl Into<String>,
        function: impl Into<String>,
        parameters: Vec<String>,
    ) -> Result<()> {
        self.send(Message::CallExtension {
            extension: extension.into(),
            function: function.into(),
            parameters,
        })
        .await
    }

    async fn send(&self, message: Message) -> Result<()> {
        lock_state(&self.shared).require_connected()?;
        let frame = TextCodec::encode(&message)?;
        self.writer.send(frame).await
    }

    /// Close the connection and stop both background tasks.
    pub async fn disconnect(self) -> Result<()> {
        lock_state(&self.shared).disconnect();
        // Dropping the last writer handle lets the writer task close the
        // transport's write half.
        drop(self.writer);
        self.receiver_task.abort();
        let _ = self.receiver_task.await;
        match self.writer_task.await {
            Ok(result) => result,
            Err(join_err) => {
                debug!(error = %join_err, "writer task did not finish cleanly");
                Ok(())
            }
        }
    }
}

async fn receive_loop<R: FrameReader>(
    mut reader: R,
    handlers: EventHandlers,
    shared: Arc<Mutex<StateMachine>>,
) {
    loop {
        match reader.recv().await {
            Ok(Some(frame)) => match TextCodec::decode(&frame) {
                Ok(message) => handlers.dispatch(message),
                // Post-authorization decode failures are survivable: report
                // and keep the connection.
                Err(err) => handlers.error(&err),
            },
            Ok(None) => {
                info!("transport closed by gateway");
                break;
            }
            Err(err) => {
                handlers.error(&err);
                break;
            }
        }
    }
    lock_state(&shared).disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DeviceInfo, PropertyReadResult, Status};
    use crate::transport::{async_pair, ChannelTransport, FrameWriter};
    use std::sync::mpsc;
    use std::time::Duration;

    const TICK: Duration = Duration::from_secs(2);

    fn granted_session() -> SessionInfo {
        SessionInfo {
            access_level: AccessLevel::Basic,
            gateway_version: "2.4.0".to_string(),
            extensions: vec!["billing".to_string()],
        }
    }

    /// Gateway double: answers AUTHORIZE, then runs the given script per
    /// request.
    fn spawn_gateway(
        transport: ChannelTransport,
        mut script: impl FnMut(Message) -> Vec<Message> + Send + 'static,
    ) {
        tokio::spawn(async move {
            let (mut rx, mut tx) = transport.split();
            while let Ok(Some(frame)) = rx.recv().await {
                let request = TextCodec::decode(&frame).unwrap();
                let responses = match request {
                    Message::Authorize { .. } => vec![Message::Authorized {
                        session: granted_session(),
                    }],
                    other => script(other),
                };
                for response in responses {
                    let encoded = TextCodec::encode(&response).unwrap();
                    if tx.send(encoded).await.is_err() {
                        return;
                    }
                }
            }
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enumerate_reaches_callback() {
        let (local, remote) = async_pair(8);
        spawn_gateway(remote, |request| match request {
            Message::Enumerate => vec![Message::Enumerated {
                devices: vec![DeviceInfo {
                    id: "dev".to_string(),
                    name: "Heat pump".to_string(),
                    functions: Default::default(),
                }],
            }],
            other => panic!("unexpected request {other:?}"),
        });

        let (seen_tx, seen_rx) = mpsc::channel();
        let handlers = EventHandlers::new().on_enumerated(move |devices| {
            seen_tx.send(devices.to_vec()).unwrap();
        });

        let client = EventClient::connect(local, None, handlers).await.unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.access_level(), Some(AccessLevel::Basic));

        client.enumerate().await.unwrap();
        let devices = seen_rx.recv_timeout(TICK).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "dev");

        client.disconnect().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsolicited_push_reaches_callback() {
        let (local, remote) = async_pair(8);
        let (mut remote_rx, mut remote_tx) = remote.split();

        let (update_tx, update_rx) = mpsc::channel();
        let handlers = EventHandlers::new().on_property_updated(move |id, value| {
            update_tx.send((id.to_string(), value.clone())).unwrap();
        });

        let gateway = tokio::spawn(async move {
            remote_rx.recv().await.unwrap();
            let granted = TextCodec::encode(&Message::Authorized {
                session: granted_session(),
            })
            .unwrap();
            remote_tx.send(granted).await.unwrap();

            // Push without any request in flight.
            let push = TextCodec::encode(&Message::PropertyUpdate {
                id: "acc.dev.temp".to_string(),
                value: PropertyValue::Number(21.5),
            })
            .unwrap();
            remote_tx.send(push).await.unwrap();
            (remote_rx, remote_tx)
        });

        let client = EventClient::connect(local, None, handlers).await.unwrap();

        let (id, value) = update_rx.recv_timeout(TICK).unwrap();
        assert_eq!(id, "acc.dev.temp");
        assert_eq!(value, PropertyValue::Number(21.5));

        client.disconnect().await.unwrap();
        gateway.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_decode_error_after_auth_hits_error_callback() {
        let (local, remote) = async_pair(8);
        let (mut remote_rx, mut remote_tx) = remote.split();

        let (err_tx, err_rx) = mpsc::channel();
        let (read_tx, read_rx) = mpsc::channel();
        let handlers = EventHandlers::new()
            .on_error(move |err| {
                err_tx.send(err.to_string()).unwrap();
            })
            .on_property_read(move |result| {
                read_tx.send(result.clone()).unwrap();
            });

        let gateway = tokio::spawn(async move {
            // Handshake.
            let frame = remote_rx.recv().await.unwrap().unwrap();
            assert!(matches!(
                TextCodec::decode(&frame).unwrap(),
                Message::Authorize { .. }
            ));
            let granted = TextCodec::encode(&Message::Authorized {
                session: granted_session(),
            })
            .unwrap();
            remote_tx.send(granted).await.unwrap();

            // One garbage frame, then a valid response.
            remote_tx
                .send(bytes::Bytes::from_static(b"garbage"))
                .await
                .unwrap();
            let valid = TextCodec::encode(&Message::PropertyRead {
                result: PropertyReadResult {
                    status: Status::Success,
                    id: "a.b.c".to_string(),
                    value: Some(PropertyValue::Number(1.0)),
                },
            })
            .unwrap();
            remote_tx.send(valid).await.unwrap();
            // Keep the halves alive until the client saw both frames.
            (remote_rx, remote_tx)
        });

        let client = EventClient::connect(local, None, handlers).await.unwrap();

        // The malformed frame surfaced as an error...
        err_rx.recv_timeout(TICK).unwrap();
        // ...and the loop survived to deliver the next frame.
        let result = read_rx.recv_timeout(TICK).unwrap();
        assert_eq!(result.id, "a.b.c");
        assert_eq!(client.state(), ConnectionState::Connected);

        client.disconnect().await.unwrap();
        gateway.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_malformed_frame_during_handshake_is_fatal() {
        let (local, remote) = async_pair(8);
        let (mut remote_rx, mut remote_tx) = remote.split();
        tokio::spawn(async move {
            remote_rx.recv().await.unwrap();
            remote_tx
                .send(bytes::Bytes::from_static(b"garbage"))
                .await
                .unwrap();
        });

        let result = EventClient::connect(local, None, EventHandlers::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_transport_close_disconnects_state() {
        let (local, remote) = async_pair(8);
        let (mut remote_rx, mut remote_tx) = remote.split();

        let gateway = tokio::spawn(async move {
            remote_rx.recv().await.unwrap();
            let granted = TextCodec::encode(&Message::Authorized {
                session: granted_session(),
            })
            .unwrap();
            remote_tx.send(granted).await.unwrap();
            remote_tx.close().await.unwrap();
        });

        let client = EventClient::connect(local, None, EventHandlers::new())
            .await
            .unwrap();
        gateway.await.unwrap();

        // The receive loop notices the close and tears the state down.
        tokio::time::timeout(TICK, async {
            while client.state() != ConnectionState::Disconnected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(matches!(
            client.enumerate().await.unwrap_err(),
            GatewayError::State { .. }
        ));
        client.disconnect().await.unwrap();
    }
}
