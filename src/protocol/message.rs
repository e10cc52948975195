//! The typed message model shared by both wire codecs.
//!
//! [`Message`] is a closed tagged union with one variant per command kind,
//! so dispatch over incoming frames is a compile-time exhaustiveness
//! requirement rather than a runtime lookup.

use super::command::Command;
use super::types::{
    Credentials, DatalogReadResult, DeviceInfo, DeviceMessage, ExtensionCallResult,
    MessagesReadResult, PropertyDescription, PropertyReadResult, PropertySelector,
    PropertySubscriptionResult, PropertyValue, PropertyWriteResult, SessionInfo, WriteFlags,
};

/// One complete protocol message in either wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Authorization request; credentials are optional on the socket
    /// transports and mandatory on BLE.
    Authorize { credentials: Option<Credentials> },
    /// Authorization grant. The protocol version is validated and consumed
    /// by the codecs and does not appear here.
    Authorized { session: SessionInfo },
    Enumerate,
    Enumerated { devices: Vec<DeviceInfo> },
    Describe { selector: PropertySelector },
    Description { properties: Vec<PropertyDescription> },
    FindProperties { selector: PropertySelector },
    PropertiesFound { ids: Vec<String> },
    ReadProperty { id: String },
    PropertyRead { result: PropertyReadResult },
    ReadProperties { ids: Vec<String> },
    PropertiesRead { results: Vec<PropertyReadResult> },
    WriteProperty {
        id: String,
        value: PropertyValue,
        flags: WriteFlags,
    },
    PropertyWritten { result: PropertyWriteResult },
    SubscribeProperty { id: String },
    PropertySubscribed { result: PropertySubscriptionResult },
    SubscribeProperties { ids: Vec<String> },
    PropertiesSubscribed { results: Vec<PropertySubscriptionResult> },
    UnsubscribeProperty { id: String },
    PropertyUnsubscribed { result: PropertySubscriptionResult },
    UnsubscribeProperties { ids: Vec<String> },
    PropertiesUnsubscribed { results: Vec<PropertySubscriptionResult> },
    /// Unsolicited push for a subscribed property.
    PropertyUpdate { id: String, value: PropertyValue },
    ReadDatalogProperties,
    DatalogPropertiesRead { ids: Vec<String> },
    ReadDatalog { id: String, start: u64, end: u64 },
    DatalogRead { result: DatalogReadResult },
    ReadMessages { start: u64, end: u64 },
    MessagesRead { result: MessagesReadResult },
    /// Unsolicited push carrying one live device message.
    DeviceMessage { message: DeviceMessage },
    CallExtension {
        extension: String,
        function: String,
        parameters: Vec<String>,
    },
    ExtensionCalled { result: ExtensionCallResult },
    /// Universal failure response.
    Error { reason: String },
}

impl Message {
    /// The command kind of this message.
    pub fn command(&self) -> Command {
        match self {
            Message::Authorize { .. } => Command::Authorize,
            Message::Authorized { .. } => Command::Authorized,
            Message::Enumerate => Command::Enumerate,
            Message::Enumerated { .. } => Command::Enumerated,
            Message::Describe { .. } => Command::Describe,
            Message::Description { .. } => Command::Description,
            Message::FindProperties { .. } => Command::FindProperties,
            Message::PropertiesFound { .. } => Command::PropertiesFound,
            Message::ReadProperty { .. } => Command::ReadProperty,
            Message::PropertyRead { .. } => Command::PropertyRead,
            Message::ReadProperties { .. } => Command::ReadProperties,
            Message::PropertiesRead { .. } => Command::PropertiesRead,
            Message::WriteProperty { .. } => Command::WriteProperty,
            Message::PropertyWritten { .. } => Command::PropertyWritten,
            Message::SubscribeProperty { .. } => Command::SubscribeProperty,
            Message::PropertySubscribed { .. } => Command::PropertySubscribed,
            Message::SubscribeProperties { .. } => Command::SubscribeProperties,
            Message::PropertiesSubscribed { .. } => Command::PropertiesSubscribed,
            Message::UnsubscribeProperty { .. } => Command::UnsubscribeProperty,
            Message::PropertyUnsubscribed { .. } => Command::PropertyUnsubscribed,
            Message::UnsubscribeProperties { .. } => Command::UnsubscribeProperties,
            Message::PropertiesUnsubscribed { .. } => Command::PropertiesUnsubscribed,
            Message::PropertyUpdate { .. } => Command::PropertyUpdate,
            Message::ReadDatalogProperties => Command::ReadDatalogProperties,
            Message::DatalogPropertiesRead { .. } => Command::DatalogPropertiesRead,
            Message::ReadDatalog { .. } => Command::ReadDatalog,
            Message::DatalogRead { .. } => Command::DatalogRead,
            Message::ReadMessages { .. } => Command::ReadMessages,
            Message::MessagesRead { .. } => Command::MessagesRead,
            Message::DeviceMessage { .. } => Command::DeviceMessage,
            Message::CallExtension { .. } => Command::CallExtension,
            Message::ExtensionCalled { .. } => Command::ExtensionCalled,
            Message::Error { .. } => Command::Error,
        }
    }
}
