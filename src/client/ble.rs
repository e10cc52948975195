//! Event-driven client over a fragmenting BLE link, using the binary
//! encoding.
//!
//! BLE characteristics carry far less than one frame, so every encoded
//! frame is split into countdown-prefixed fragments on send and reassembled
//! from notifications on receive (see [`super::fragment`]). One task owns
//! both link halves and multiplexes outgoing commands against incoming
//! notifications; operations hand it work through a channel.
//!
//! Credentials are mandatory on BLE. The text-only datalog-property-list
//! exchange does not exist on this transport.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::fragment::{fragment_frame, Reassembler};
use super::lock_state;
use crate::codec::BinaryCodec;
use crate::error::{GatewayError, Result};
use crate::handler::EventHandlers;
use crate::protocol::{
    AccessLevel, Credentials, Message, PropertySelector, PropertyValue, SessionInfo, WriteFlags,
};
use crate::state::{ConnectionState, StateMachine};
use crate::transport::{BleLink, BleWriter, NotificationStream};

/// Fragment payload for the common 23-byte ATT MTU: 20 usable bytes per
/// write minus the countdown byte.
pub const DEFAULT_MAX_FRAGMENT_PAYLOAD: usize = 19;

const COMMAND_QUEUE_CAPACITY: usize = 32;

enum LoopCommand {
    /// Pre-fragmented frame to write in order.
    Send(Vec<Bytes>),
    Shutdown(oneshot::Sender<Result<()>>),
}

/// Async client for gateways reachable over BLE.
#[derive(Debug)]
pub struct BleClient {
    commands: mpsc::Sender<LoopCommand>,
    shared: Arc<Mutex<StateMachine>>,
    max_fragment_payload: usize,
    task: JoinHandle<()>,
}

impl BleClient {
    /// Connect over an established link with the default fragment size.
    pub async fn connect<L: BleLink>(
        link: L,
        credentials: Credentials,
        handlers: EventHandlers,
    ) -> Result<Self> {
        Self::connect_with_config(link, credentials, handlers, DEFAULT_MAX_FRAGMENT_PAYLOAD).await
    }

    /// Connect with an explicit fragment payload size, for links with a
    /// negotiated MTU.
    pub async fn connect_with_config<L: BleLink>(
        link: L,
        credentials: Credentials,
        handlers: EventHandlers,
        max_fragment_payload: usize,
    ) -> Result<Self> {
        let (mut notifications, mut writer) = link.split();
        let mut state = StateMachine::new();
        state.begin_connect()?;
        state.transport_ready()?;

        let request = BinaryCodec::encode(&Message::Authorize {
            credentials: Some(credentials),
        })?;
        for fragment in fragment_frame(&request, max_fragment_payload)? {
            writer.write_fragment(fragment).await?;
        }

        let mut reassembler = Reassembler::new();
        loop {
            let fragment = notifications
                .next()
                .await?
                .ok_or(GatewayError::ConnectionClosed)?;
            let frame = match reassembler.push(&fragment)? {
                Some(frame) => frame,
                None => continue,
            };
            // Handshake frames that fail to decode are fatal, matching the
            // socket clients.
            match BinaryCodec::decode(&frame)? {
                Message::Authorized { session } => {
                    info!(
                        access_level = session.access_level.as_wire_str(),
                        gateway_version = %session.gateway_version,
                        "authorized"
                    );
                    state.authorized(session)?;
                    break;
                }
                Message::Error { reason } => {
                    let _ = writer.disconnect().await;
                    return Err(GatewayError::Gateway(reason));
                }
                other => {
                    debug!(command = ?other.command(), "skipping frame during authorization");
                }
            }
        }

        let shared = Arc::new(Mutex::new(state));
        let (commands, commands_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let task = tokio::spawn(ble_loop(
            notifications,
            writer,
            reassembler,
            commands_rx,
            handlers,
            shared.clone(),
        ));
        Ok(Self {
            commands,
            shared,
            max_fragment_payload,
            task,
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

    /// Encode and fragment at the call site so oversized frames fail the
    /// caller directly instead of surfacing through the error callback.
    async fn send(&self, message: Message) -> Result<()> {
        lock_state(&self.shared).require_connected()?;
        let frame = BinaryCodec::encode(&message)?;
        let fragments = fragment_frame(&frame, self.max_fragment_payload)?;
        self.commands
            .send(LoopCommand::Send(fragments))
            .await
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    /// Tear the link down and stop the background task.
    pub async fn disconnect(self) -> Result<()> {
        lock_state(&self.shared).disconnect();
        let (done_tx, done_rx) = oneshot::channel();
        let result = if self
            .commands
            .send(LoopCommand::Shutdown(done_tx))
            .await
            .is_ok()
        {
            done_rx.await.unwrap_or(Ok(()))
        } else {
            // The loop already ended; the link is gone either way.
            Ok(())
        };
        let _ = self.task.await;
        result
    }
}

async fn ble_loop<N: NotificationStream, W: BleWriter>(
    mut notifications: N,
    mut writer: W,
    mut reassembler: Reassembler,
    mut commands: mpsc::Receiver<LoopCommand>,
    handlers: EventHandlers,
    shared: Arc<Mutex<StateMachine>>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LoopCommand::Send(fragments)) => {
                    if let Err(err) = write_all(&mut writer, fragments).await {
                        handlers.error(&err);
                        break;
                    }
                }
                Some(LoopCommand::Shutdown(done)) => {
                    let _ = done.send(writer.disconnect().await);
                    break;
                }
                None => {
                    let _ = writer.disconnect().await;
                    break;
                }
            },
            fragment = notifications.next() => match fragment {
                Ok(Some(fragment)) => match reassembler.push(&fragment) {
                    Ok(Some(frame)) => match BinaryCodec::decode(&frame) {
                        Ok(message) => handlers.dispatch(message),
                        // Post-authorization decode failures are
                        // survivable.
                        Err(err) => handlers.error(&err),
                    },
                    Ok(None) => {}
                    Err(err) => handlers.error(&err),
                },
                Ok(None) => {
                    info!("link closed by gateway");
                    break;
                }
                Err(err) => {
                    handlers.error(&err);
                    break;
                }
            },
        }
    }
    lock_state(&shared).disconnect();
}

async fn write_all<W: BleWriter>(writer: &mut W, fragments: Vec<Bytes>) -> Result<()> {
    for fragment in fragments {
        writer.write_fragment(fragment).await?;
    }
    Ok(())
}
