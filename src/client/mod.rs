//! Client variants.
//!
//! Three clients over the same protocol model, differing in transport and
//! interaction style:
//!
//! - [`SyncClient`]: blocking request/response over the text encoding
//! - [`EventClient`]: async, callback-driven, text encoding
//! - [`BleClient`]: async, callback-driven, binary encoding over a
//!   fragmenting BLE link

mod ble;
mod event;
pub mod fragment;
mod sync;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::state::StateMachine;

pub use ble::{BleClient, DEFAULT_MAX_FRAGMENT_PAYLOAD};
pub use event::EventClient;
pub use sync::SyncClient;

/// Lock the shared state machine. A panic in a callback must not wedge the
/// connection state, so poisoning is ignored.
pub(crate) fn lock_state(shared: &Arc<Mutex<StateMachine>>) -> MutexGuard<'_, StateMachine> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
