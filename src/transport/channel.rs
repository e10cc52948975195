//! In-memory channel transports.
//!
//! Each `*_pair` function returns two connected endpoints; a frame sent on
//! one side arrives on the other. Used by the test suites and for loopback
//! wiring; production deployments implement the transport traits over their
//! actual socket or BLE stack.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{
    BleLink, BleWriter, BoxFuture, FrameReader, FrameTransport, FrameWriter, NotificationStream,
    Transport,
};
use crate::error::{GatewayError, Result};

/// Blocking endpoint backed by a pair of std channels.
#[derive(Debug)]
pub struct BlockingChannelTransport {
    tx: Option<std::sync::mpsc::Sender<Bytes>>,
    rx: std::sync::mpsc::Receiver<Bytes>,
}

/// Two connected blocking endpoints.
pub fn blocking_pair() -> (BlockingChannelTransport, BlockingChannelTransport) {
    let (a_tx, a_rx) = std::sync::mpsc::channel();
    let (b_tx, b_rx) = std::sync::mpsc::channel();
    (
        BlockingChannelTransport {
            tx: Some(a_tx),
            rx: b_rx,
        },
        BlockingChannelTransport {
            tx: Some(b_tx),
            rx: a_rx,
        },
    )
}

impl Transport for BlockingChannelTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(GatewayError::ConnectionClosed)?;
        tx.send(Bytes::copy_from_slice(frame))
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    fn recv_frame(&mut self) -> Result<Bytes> {
        self.rx.recv().map_err(|_| GatewayError::ConnectionClosed)
    }

    fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

/// Async endpoint backed by a pair of tokio channels.
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

/// Two connected async endpoints.
pub fn async_pair(capacity: usize) -> (ChannelTransport, ChannelTransport) {
    let (a_tx, a_rx) = mpsc::channel(capacity);
    let (b_tx, b_rx) = mpsc::channel(capacity);
    (
        ChannelTransport { tx: a_tx, rx: b_rx },
        ChannelTransport { tx: b_tx, rx: a_rx },
    )
}

impl FrameTransport for ChannelTransport {
    type Reader = ChannelReader;
    type Writer = ChannelWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            ChannelReader { rx: self.rx },
            ChannelWriter { tx: Some(self.tx) },
        )
    }
}

pub struct ChannelReader {
    rx: mpsc::Receiver<Bytes>,
}

impl FrameReader for ChannelReader {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }
}

pub struct ChannelWriter {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl FrameWriter for ChannelWriter {
    fn send(&mut self, frame: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let tx = self.tx.as_ref().ok_or(GatewayError::ConnectionClosed)?;
            tx.send(frame)
                .await
                .map_err(|_| GatewayError::ConnectionClosed)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.tx = None;
            Ok(())
        })
    }
}

/// Async BLE-shaped endpoint; each channel item is one fragment.
pub struct ChannelBleLink {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

/// Two connected fragment-level endpoints.
pub fn ble_pair(capacity: usize) -> (ChannelBleLink, ChannelBleLink) {
    let (a_tx, a_rx) = mpsc::channel(capacity);
    let (b_tx, b_rx) = mpsc::channel(capacity);
    (
        ChannelBleLink { tx: a_tx, rx: b_rx },
        ChannelBleLink { tx: b_tx, rx: a_rx },
    )
}

impl BleLink for ChannelBleLink {
    type Notifications = ChannelNotifications;
    type Writer = ChannelBleWriter;

    fn split(self) -> (Self::Notifications, Self::Writer) {
        (
            ChannelNotifications { rx: self.rx },
            ChannelBleWriter { tx: Some(self.tx) },
        )
    }
}

pub struct ChannelNotifications {
    rx: mpsc::Receiver<Bytes>,
}

impl NotificationStream for ChannelNotifications {
    fn next(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }
}

pub struct ChannelBleWriter {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl BleWriter for ChannelBleWriter {
    fn write_fragment(&mut self, fragment: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let tx = self.tx.as_ref().ok_or(GatewayError::ConnectionClosed)?;
            tx.send(fragment)
                .await
                .map_err(|_| GatewayError::ConnectionClosed)
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.tx = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_pair_delivers_frames() {
        let (mut a, mut b) = blocking_pair();
        a.send_frame(b"hello").unwrap();
        assert_eq!(b.recv_frame().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_blocking_close_is_seen_by_peer() {
        let (mut a, mut b) = blocking_pair();
        a.close().unwrap();
        assert!(matches!(
            b.recv_frame(),
            Err(GatewayError::ConnectionClosed)
        ));
        assert!(matches!(
            a.send_frame(b"late"),
            Err(GatewayError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_async_pair_delivers_frames() {
        let (a, b) = async_pair(4);
        let (mut a_rx, mut a_tx) = a.split();
        let (mut b_rx, mut b_tx) = b.split();

        a_tx.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(b_rx.recv().await.unwrap(), Some(Bytes::from_static(b"ping")));

        b_tx.send(Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(a_rx.recv().await.unwrap(), Some(Bytes::from_static(b"pong")));
    }

    #[tokio::test]
    async fn test_async_close_yields_none() {
        let (a, b) = async_pair(4);
        let (_a_rx, mut a_tx) = a.split();
        let (mut b_rx, _b_tx) = b.split();

        a_tx.close().await.unwrap();
        assert_eq!(b_rx.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ble_pair_preserves_fragment_order() {
        let (a, b) = ble_pair(8);
        let (_n, mut w) = a.split();
        let (mut notifications, _bw) = b.split();

        w.write_fragment(Bytes::from_static(b"\x01AB")).await.unwrap();
        w.write_fragment(Bytes::from_static(b"\x00CD")).await.unwrap();
        assert_eq!(
            notifications.next().await.unwrap(),
            Some(Bytes::from_static(b"\x01AB"))
        );
        assert_eq!(
            notifications.next().await.unwrap(),
            Some(Bytes::from_static(b"\x00CD"))
        );
    }
}
