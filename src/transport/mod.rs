//! Transport seams.
//!
//! Every transport is message oriented: one `send` carries exactly one
//! complete frame and one `recv` yields exactly one complete frame. Length
//! delimiting, datagram boundaries or GATT writes are the implementor's
//! concern; the clients never see partial frames, except on BLE where the
//! fragmentation layer in [`crate::client`] sits on top of
//! [`BleWriter::write_fragment`].
//!
//! Three seams, one per client variant:
//!
//! - [`Transport`]: blocking, for [`SyncClient`](crate::SyncClient)
//! - [`FrameTransport`]: async with split ownership, for
//!   [`EventClient`](crate::EventClient)
//! - [`BleLink`]: async fragment-level link, for
//!   [`BleClient`](crate::BleClient)
//!
//! The async seams split into independently owned halves so the receive loop
//! can await incoming frames while the writer half is driven from elsewhere.

mod channel;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::Result;

pub use channel::{
    async_pair, ble_pair, blocking_pair, BlockingChannelTransport, ChannelBleLink,
    ChannelBleWriter, ChannelNotifications, ChannelReader, ChannelTransport, ChannelWriter,
};

/// Boxed future used by the async transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Blocking message transport.
pub trait Transport {
    /// Send one complete frame.
    fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Block until one complete frame arrives. A closed transport is
    /// [`GatewayError::ConnectionClosed`](crate::GatewayError::ConnectionClosed).
    fn recv_frame(&mut self) -> Result<Bytes>;

    /// Close the transport. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Async message transport that splits into read and write halves.
pub trait FrameTransport: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Receive half of a [`FrameTransport`].
pub trait FrameReader: Send + 'static {
    /// Await the next frame. `None` means the peer closed cleanly.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>>;
}

/// Send half of a [`FrameTransport`].
pub trait FrameWriter: Send + 'static {
    /// Send one complete frame.
    fn send(&mut self, frame: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Close the write half. Idempotent.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// A connected BLE link that splits into a notification stream and a
/// fragment writer.
pub trait BleLink: Send + 'static {
    type Notifications: NotificationStream;
    type Writer: BleWriter;

    fn split(self) -> (Self::Notifications, Self::Writer);
}

/// Incoming notification stream of a [`BleLink`]. Each item is one fragment,
/// not one frame.
pub trait NotificationStream: Send + 'static {
    /// Await the next fragment. `None` means the link dropped.
    fn next(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>>;
}

/// Outgoing characteristic writes of a [`BleLink`].
pub trait BleWriter: Send + 'static {
    /// Write one fragment. Fragments of a frame must be written in order.
    fn write_fragment(&mut self, fragment: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Tear the link down. Idempotent.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;
}
