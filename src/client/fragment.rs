//! BLE frame fragmentation.
//!
//! Each fragment starts with one countdown byte: the number of fragments
//! still to come after this one. The final fragment of every frame carries
//! 0, so reassembly needs no length negotiation. A frame needing more than
//! 256 fragments cannot express its first countdown in one byte and is
//! refused at send time.
//!
//! There are no sequence numbers: fragments of different frames must not
//! interleave on one link, and the reassembler cannot detect it if they do.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{GatewayError, Result};

/// Largest number of fragments one frame may span.
pub const MAX_FRAGMENTS: usize = 256;

/// Split one encoded frame into countdown-prefixed fragments.
///
/// `max_payload` is the fragment capacity excluding the countdown byte.
pub fn fragment_frame(frame: &[u8], max_payload: usize) -> Result<Vec<Bytes>> {
    if max_payload == 0 {
        return Err(GatewayError::Protocol(
            "fragment payload size must be at least 1".to_string(),
        ));
    }
    if frame.is_empty() {
        // A frame with no payload still travels as one terminal fragment.
        return Ok(vec![Bytes::from_static(&[0])]);
    }
    let chunks: Vec<&[u8]> = frame.chunks(max_payload).collect();
    if chunks.len() > MAX_FRAGMENTS {
        return Err(GatewayError::Protocol(format!(
            "frame of {} bytes needs {} fragments, limit is {MAX_FRAGMENTS}",
            frame.len(),
            chunks.len(),
        )));
    }
    let last = chunks.len() - 1;
    Ok(chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut fragment = BytesMut::with_capacity(1 + chunk.len());
            fragment.put_u8((last - i) as u8);
            fragment.put_slice(chunk);
            fragment.freeze()
        })
        .collect())
}

/// Accumulates fragments until a complete frame is available.
#[derive(Default)]
pub struct Reassembler {
    buf: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment. Returns the completed frame when the terminal
    /// fragment (countdown 0) arrives.
    pub fn push(&mut self, fragment: &[u8]) -> Result<Option<Bytes>> {
        let (&countdown, payload) = fragment.split_first().ok_or_else(|| {
            GatewayError::Protocol("empty fragment without countdown byte".to_string())
        })?;
        self.buf.put_slice(payload);
        if countdown == 0 {
            Ok(Some(self.buf.split().freeze()))
        } else {
            Ok(None)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes buffered for the frame currently in flight.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially assembled frame, e.g. after a link reset.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
