//! Wire codecs.
//!
//! Two encodings carry the same [`Message`](crate::protocol::Message) model:
//!
//! - [`TextCodec`]: line-delimited keyword/header/body frames, used on the
//!   socket transports
//! - [`BinaryCodec`]: one command id byte plus a CBOR payload, used on BLE
//!
//! Both are stateless; framing (length delimiting or fragmentation) is the
//! transport's concern.

mod binary;
mod cbor;
mod text;

pub use binary::BinaryCodec;
pub use text::{RawTextFrame, TextCodec};
