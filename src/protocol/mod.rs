//! Protocol module - the shared, transport-agnostic message model.
//!
//! This module defines what travels over the wire, independent of encoding:
//! - the closed [`Command`] set with its text keyword and binary id tables
//! - the typed [`Message`] union, one variant per command
//! - the value types carried inside frames

mod command;
mod message;
mod types;

pub use command::{Command, ERROR_ID, PROTOCOL_VERSION, RESPONSE_ID_BIT};
pub use message::Message;
pub use types::{
    AccessLevel, Credentials, DatalogEntry, DatalogReadResult, DescriptionFlags, DeviceFunctions,
    DeviceInfo, DeviceMessage, ExtensionCallResult, ExtensionStatus, MessagesReadResult,
    PropertyDescription, PropertyReadResult, PropertySelector, PropertySubscriptionResult,
    PropertyValue, PropertyWriteResult, SessionInfo, Status, WriteFlags,
};

pub(crate) use types::{parse_flags, render_flags};
