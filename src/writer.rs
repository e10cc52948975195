//! Dedicated writer task.
//!
//! All outgoing frames funnel through one task that owns the transport's
//! write half, so concurrent callers never interleave partial writes. The
//! task drains its channel in arrival order and closes the transport when
//! the last [`WriterHandle`] is dropped.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{GatewayError, Result};
use crate::transport::FrameWriter;

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub(crate) struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue one frame for writing. Frames from one handle keep their order.
    pub(crate) async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| GatewayError::ConnectionClosed)
    }
}

/// Spawn the writer task over an owned write half.
///
/// Returns the sending handle and the task's join handle. The task ends,
/// closing the transport, once every [`WriterHandle`] clone is dropped.
pub(crate) fn spawn_writer_task<W: FrameWriter>(
    mut writer: W,
    capacity: usize,
) -> (WriterHandle, JoinHandle<Result<()>>) {
    let (tx, mut rx) = mpsc::channel::<Bytes>(capacity);
    let task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            trace!(len = frame.len(), "writing frame");
            writer.send(frame).await?;
        }
        debug!("writer handles dropped, closing transport");
        writer.close().await
    });
    (WriterHandle { tx }, task)
}
