//! Command tables: text keywords, binary ids, and request/response pairing.
//!
//! Every logical command of the protocol appears here exactly once. The text
//! wire identifies a frame by its keyword line; the binary wire by a single
//! id byte where the high bit marks responses and pushes. The two tables are
//! a fixed bijection except for the datalog-property-list commands, which
//! exist only on the text wire.

/// Bit set on every binary id that travels gateway-to-client (responses,
/// pushes, and the universal error frame).
pub const RESPONSE_ID_BIT: u8 = 0x80;

/// Binary id of the universal error frame.
pub const ERROR_ID: u8 = 0xFF;

/// Protocol version this client implements. Any other version advertised by
/// the gateway during authorization is a hard protocol error.
pub const PROTOCOL_VERSION: u64 = 1;

/// Every command kind of the protocol, requests and responses alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Authorize,
    Authorized,
    Enumerate,
    Enumerated,
    Describe,
    Description,
    FindProperties,
    PropertiesFound,
    ReadProperty,
    PropertyRead,
    ReadProperties,
    PropertiesRead,
    WriteProperty,
    PropertyWritten,
    SubscribeProperty,
    PropertySubscribed,
    SubscribeProperties,
    PropertiesSubscribed,
    UnsubscribeProperty,
    PropertyUnsubscribed,
    UnsubscribeProperties,
    PropertiesUnsubscribed,
    /// Push only; has no request counterpart.
    PropertyUpdate,
    ReadDatalogProperties,
    DatalogPropertiesRead,
    ReadDatalog,
    DatalogRead,
    ReadMessages,
    MessagesRead,
    /// Push only; has no request counterpart.
    DeviceMessage,
    CallExtension,
    ExtensionCalled,
    /// Universal failure response.
    Error,
}

impl Command {
    /// Text wire keyword (first line of a text frame).
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Authorize => "AUTHORIZE",
            Command::Authorized => "AUTHORIZED",
            Command::Enumerate => "ENUMERATE",
            Command::Enumerated => "ENUMERATED",
            Command::Describe => "DESCRIBE",
            Command::Description => "DESCRIPTION",
            Command::FindProperties => "FIND PROPERTIES",
            Command::PropertiesFound => "PROPERTIES FOUND",
            Command::ReadProperty => "READ PROPERTY",
            Command::PropertyRead => "PROPERTY READ",
            Command::ReadProperties => "READ PROPERTIES",
            Command::PropertiesRead => "PROPERTIES READ",
            Command::WriteProperty => "WRITE PROPERTY",
            Command::PropertyWritten => "PROPERTY WRITTEN",
            Command::SubscribeProperty => "SUBSCRIBE PROPERTY",
            Command::PropertySubscribed => "PROPERTY SUBSCRIBED",
            Command::SubscribeProperties => "SUBSCRIBE PROPERTIES",
            Command::PropertiesSubscribed => "PROPERTIES SUBSCRIBED",
            Command::UnsubscribeProperty => "UNSUBSCRIBE PROPERTY",
            Command::PropertyUnsubscribed => "PROPERTY UNSUBSCRIBED",
            Command::UnsubscribeProperties => "UNSUBSCRIBE PROPERTIES",
            Command::PropertiesUnsubscribed => "PROPERTIES UNSUBSCRIBED",
            Command::PropertyUpdate => "PROPERTY UPDATE",
            Command::ReadDatalogProperties => "READ DATALOG PROPERTIES",
            Command::DatalogPropertiesRead => "DATALOG PROPERTIES READ",
            Command::ReadDatalog => "READ DATALOG",
            Command::DatalogRead => "DATALOG READ",
            Command::ReadMessages => "READ MESSAGES",
            Command::MessagesRead => "MESSAGES READ",
            Command::DeviceMessage => "DEVICE MESSAGE",
            Command::CallExtension => "CALL EXTENSION",
            Command::ExtensionCalled => "EXTENSION CALLED",
            Command::Error => "ERROR",
        }
    }

    /// Look up a command by its text keyword.
    pub fn from_keyword(keyword: &str) -> Option<Command> {
        Some(match keyword {
            "AUTHORIZE" => Command::Authorize,
            "AUTHORIZED" => Command::Authorized,
            "ENUMERATE" => Command::Enumerate,
            "ENUMERATED" => Command::Enumerated,
            "DESCRIBE" => Command::Describe,
            "DESCRIPTION" => Command::Description,
            "FIND PROPERTIES" => Command::FindProperties,
            "PROPERTIES FOUND" => Command::PropertiesFound,
            "READ PROPERTY" => Command::ReadProperty,
            "PROPERTY READ" => Command::PropertyRead,
            "READ PROPERTIES" => Command::ReadProperties,
            "PROPERTIES READ" => Command::PropertiesRead,
            "WRITE PROPERTY" => Command::WriteProperty,
            "PROPERTY WRITTEN" => Command::PropertyWritten,
            "SUBSCRIBE PROPERTY" => Command::SubscribeProperty,
            "PROPERTY SUBSCRIBED" => Command::PropertySubscribed,
            "SUBSCRIBE PROPERTIES" => Command::SubscribeProperties,
            "PROPERTIES SUBSCRIBED" => Command::PropertiesSubscribed,
            "UNSUBSCRIBE PROPERTY" => Command::UnsubscribeProperty,
            "PROPERTY UNSUBSCRIBED" => Command::PropertyUnsubscribed,
            "UNSUBSCRIBE PROPERTIES" => Command::UnsubscribeProperties,
            "PROPERTIES UNSUBSCRIBED" => Command::PropertiesUnsubscribed,
            "PROPERTY UPDATE" => Command::PropertyUpdate,
            "READ DATALOG PROPERTIES" => Command::ReadDatalogProperties,
            "DATALOG PROPERTIES READ" => Command::DatalogPropertiesRead,
            "READ DATALOG" => Command::ReadDatalog,
            "DATALOG READ" => Command::DatalogRead,
            "READ MESSAGES" => Command::ReadMessages,
            "MESSAGES READ" => Command::MessagesRead,
            "DEVICE MESSAGE" => Command::DeviceMessage,
            "CALL EXTENSION" => Command::CallExtension,
            "EXTENSION CALLED" => Command::ExtensionCalled,
            "ERROR" => Command::Error,
            _ => return None,
        })
    }

    /// Binary wire id, or `None` for text-only commands.
    pub fn binary_id(&self) -> Option<u8> {
        Some(match self {
            Command::Authorize => 0x01,
            Command::Authorized => 0x81,
            Command::Enumerate => 0x02,
            Command::Enumerated => 0x82,
            Command::Describe => 0x03,
            Command::Description => 0x83,
            Command::FindProperties => 0x04,
            Command::PropertiesFound => 0x84,
            Command::ReadProperty => 0x05,
            Command::PropertyRead => 0x85,
            Command::ReadProperties => 0x06,
            Command::PropertiesRead => 0x86,
            Command::WriteProperty => 0x07,
            Command::PropertyWritten => 0x87,
            Command::SubscribeProperty => 0x08,
            Command::PropertySubscribed => 0x88,
            Command::SubscribeProperties => 0x09,
            Command::PropertiesSubscribed => 0x89,
            Command::UnsubscribeProperty => 0x0A,
            Command::PropertyUnsubscribed => 0x8A,
            Command::UnsubscribeProperties => 0x0B,
            Command::PropertiesUnsubscribed => 0x8B,
            Command::PropertyUpdate => 0x8C,
            Command::ReadDatalogProperties | Command::DatalogPropertiesRead => return None,
            Command::ReadDatalog => 0x0D,
            Command::DatalogRead => 0x8D,
            Command::ReadMessages => 0x0E,
            Command::MessagesRead => 0x8E,
            Command::DeviceMessage => 0x8F,
            Command::CallExtension => 0x10,
            Command::ExtensionCalled => 0x90,
            Command::Error => ERROR_ID,
        })
    }

    /// Look up a command by its binary id.
    pub fn from_binary_id(id: u8) -> Option<Command> {
        Some(match id {
            0x01 => Command::Authorize,
            0x81 => Command::Authorized,
            0x02 => Command::Enumerate,
            0x82 => Command::Enumerated,
            0x03 => Command::Describe,
            0x83 => Command::Description,
            0x04 => Command::FindProperties,
            0x84 => Command::PropertiesFound,
            0x05 => Command::ReadProperty,
            0x85 => Command::PropertyRead,
            0x06 => Command::ReadProperties,
            0x86 => Command::PropertiesRead,
            0x07 => Command::WriteProperty,
            0x87 => Command::PropertyWritten,
            0x08 => Command::SubscribeProperty,
            0x88 => Command::PropertySubscribed,
            0x09 => Command::SubscribeProperties,
            0x89 => Command::PropertiesSubscribed,
            0x0A => Command::UnsubscribeProperty,
            0x8A => Command::PropertyUnsubscribed,
            0x0B => Command::UnsubscribeProperties,
            0x8B => Command::PropertiesUnsubscribed,
            0x8C => Command::PropertyUpdate,
            0x0D => Command::ReadDatalog,
            0x8D => Command::DatalogRead,
            0x0E => Command::ReadMessages,
            0x8E => Command::MessagesRead,
            0x8F => Command::DeviceMessage,
            0x10 => Command::CallExtension,
            0x90 => Command::ExtensionCalled,
            ERROR_ID => Command::Error,
            _ => return None,
        })
    }

    /// True for frames that travel gateway-to-client: responses, pushes,
    /// and the universal error frame.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Command::Authorized
                | Command::Enumerated
                | Command::Description
                | Command::PropertiesFound
                | Command::PropertyRead
                | Command::PropertiesRead
                | Command::PropertyWritten
                | Command::PropertySubscribed
                | Command::PropertiesSubscribed
                | Command::PropertyUnsubscribed
                | Command::PropertiesUnsubscribed
                | Command::PropertyUpdate
                | Command::DatalogPropertiesRead
                | Command::DatalogRead
                | Command::MessagesRead
                | Command::DeviceMessage
                | Command::ExtensionCalled
                | Command::Error
        )
    }

    /// True for the two unsolicited push kinds.
    pub fn is_push(&self) -> bool {
        matches!(self, Command::PropertyUpdate | Command::DeviceMessage)
    }

    /// All commands, for table-driven tests.
    pub const ALL: [Command; 33] = [
        Command::Authorize,
        Command::Authorized,
        Command::Enumerate,
        Command::Enumerated,
        Command::Describe,
        Command::Description,
        Command::FindProperties,
        Command::PropertiesFound,
        Command::ReadProperty,
        Command::PropertyRead,
        Command::ReadProperties,
        Command::PropertiesRead,
        Command::WriteProperty,
        Command::PropertyWritten,
        Command::SubscribeProperty,
        Command::PropertySubscribed,
        Command::SubscribeProperties,
        Command::PropertiesSubscribed,
        Command::UnsubscribeProperty,
        Command::PropertyUnsubscribed,
        Command::UnsubscribeProperties,
        Command::PropertiesUnsubscribed,
        Command::PropertyUpdate,
        Command::ReadDatalogProperties,
        Command::DatalogPropertiesRead,
        Command::ReadDatalog,
        Command::DatalogRead,
        Command::ReadMessages,
        Command::MessagesRead,
        Command::DeviceMessage,
        Command::CallExtension,
        Command::ExtensionCalled,
        Command::Error,
    ];
}
