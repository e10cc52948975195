//! Client SDK for the gateway control protocol.
//!
//! The protocol exposes the devices behind an energy gateway: device
//! enumeration, property description and discovery, reads, writes,
//! subscriptions with pushed updates, datalog retrieval, device messages
//! and extension calls. The same message model travels in two encodings, a
//! line-oriented text form for socket transports and a compact binary form
//! for BLE.
//!
//! Three client variants cover the common integration styles:
//!
//! - [`SyncClient`] blocks per request, for tools and scripts
//! - [`EventClient`] delivers responses and pushes through [`EventHandlers`]
//! - [`BleClient`] does the same over a fragmenting BLE link
//!
//! ```no_run
//! use gateway_client::protocol::Credentials;
//! use gateway_client::{transport, SyncClient};
//!
//! # fn main() -> gateway_client::Result<()> {
//! # let (transport, _peer) = transport::blocking_pair();
//! let mut client = SyncClient::connect(transport, Some(Credentials::new("svc", "secret")))?;
//! let devices = client.enumerate()?;
//! for device in &devices {
//!     println!("{}: {}", device.id, device.name);
//! }
//! client.disconnect()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod state;
pub mod transport;

mod handler;
mod writer;

pub use client::{BleClient, EventClient, SyncClient, DEFAULT_MAX_FRAGMENT_PAYLOAD};
pub use error::{GatewayError, Result};
pub use handler::EventHandlers;
pub use state::ConnectionState;
