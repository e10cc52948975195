//! Value types carried in protocol frames.
//!
//! All of these are immutable value types constructed during decode and
//! consumed by callbacks or returned to a blocking caller; none are mutated
//! after construction.

use std::fmt;
use std::str::FromStr;

use bitflags::Flags;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Result status reported by the gateway for a single operation.
///
/// Closed set: any unrecognized wire value decodes to [`Status::Error`],
/// never to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    InProgress,
    Error,
    NoProperty,
    NoDevice,
    NoDeviceAccess,
    Timeout,
    InvalidValue,
}

impl Status {
    /// Text wire representation.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::InProgress => "InProgress",
            Status::Error => "Error",
            Status::NoProperty => "NoProperty",
            Status::NoDevice => "NoDevice",
            Status::NoDeviceAccess => "NoDeviceAccess",
            Status::Timeout => "Timeout",
            Status::InvalidValue => "InvalidValue",
        }
    }

    /// Decode from the text wire. Unknown values map to `Error`.
    pub fn from_wire_str(raw: &str) -> Status {
        match raw {
            "Success" => Status::Success,
            "InProgress" => Status::InProgress,
            "NoProperty" => Status::NoProperty,
            "NoDevice" => Status::NoDevice,
            "NoDeviceAccess" => Status::NoDeviceAccess,
            "Timeout" => Status::Timeout,
            "InvalidValue" => Status::InvalidValue,
            _ => Status::Error,
        }
    }

    /// Binary wire representation.
    pub fn as_wire_u8(&self) -> u8 {
        match self {
            Status::Success => 0,
            Status::InProgress => 1,
            Status::Error => 2,
            Status::NoProperty => 3,
            Status::NoDevice => 4,
            Status::NoDeviceAccess => 5,
            Status::Timeout => 6,
            Status::InvalidValue => 7,
        }
    }

    /// Decode from the binary wire. Unknown values map to `Error`.
    pub fn from_wire_u8(raw: u64) -> Status {
        match raw {
            0 => Status::Success,
            1 => Status::InProgress,
            3 => Status::NoProperty,
            4 => Status::NoDevice,
            5 => Status::NoDeviceAccess,
            6 => Status::Timeout,
            7 => Status::InvalidValue,
            _ => Status::Error,
        }
    }
}

/// Result status of an extension call, scoped to that command only.
///
/// Closed set with the same leniency rule as [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionStatus {
    Success,
    Error,
    UnknownExtension,
    UnknownFunction,
    InvalidParameters,
}

impl ExtensionStatus {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ExtensionStatus::Success => "Success",
            ExtensionStatus::Error => "Error",
            ExtensionStatus::UnknownExtension => "UnknownExtension",
            ExtensionStatus::UnknownFunction => "UnknownFunction",
            ExtensionStatus::InvalidParameters => "InvalidParameters",
        }
    }

    pub fn from_wire_str(raw: &str) -> ExtensionStatus {
        match raw {
            "Success" => ExtensionStatus::Success,
            "UnknownExtension" => ExtensionStatus::UnknownExtension,
            "UnknownFunction" => ExtensionStatus::UnknownFunction,
            "InvalidParameters" => ExtensionStatus::InvalidParameters,
            _ => ExtensionStatus::Error,
        }
    }

    pub fn as_wire_u8(&self) -> u8 {
        match self {
            ExtensionStatus::Success => 0,
            ExtensionStatus::Error => 1,
            ExtensionStatus::UnknownExtension => 2,
            ExtensionStatus::UnknownFunction => 3,
            ExtensionStatus::InvalidParameters => 4,
        }
    }

    pub fn from_wire_u8(raw: u64) -> ExtensionStatus {
        match raw {
            0 => ExtensionStatus::Success,
            2 => ExtensionStatus::UnknownExtension,
            3 => ExtensionStatus::UnknownFunction,
            4 => ExtensionStatus::InvalidParameters,
            _ => ExtensionStatus::Error,
        }
    }
}

/// Access level granted by the gateway during authorization, immutable for
/// the rest of the connection. Ordered: `None < Basic < Installer < Expert <
/// QualifiedServicePersonnel`.
///
/// Unlike [`Status`], an unknown wire value here is a protocol error:
/// silently defaulting an access level would widen authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    None,
    Basic,
    Installer,
    Expert,
    QualifiedServicePersonnel,
}

impl AccessLevel {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            AccessLevel::None => "None",
            AccessLevel::Basic => "Basic",
            AccessLevel::Installer => "Installer",
            AccessLevel::Expert => "Expert",
            AccessLevel::QualifiedServicePersonnel => "QualifiedServicePersonnel",
        }
    }

    pub fn from_wire_str(raw: &str) -> Result<AccessLevel> {
        match raw {
            "None" => Ok(AccessLevel::None),
            "Basic" => Ok(AccessLevel::Basic),
            "Installer" => Ok(AccessLevel::Installer),
            "Expert" => Ok(AccessLevel::Expert),
            "QualifiedServicePersonnel" => Ok(AccessLevel::QualifiedServicePersonnel),
            other => Err(GatewayError::Protocol(format!(
                "unknown access level {other:?}"
            ))),
        }
    }

    pub fn as_wire_u8(&self) -> u8 {
        match self {
            AccessLevel::None => 0,
            AccessLevel::Basic => 1,
            AccessLevel::Installer => 2,
            AccessLevel::Expert => 3,
            AccessLevel::QualifiedServicePersonnel => 4,
        }
    }

    pub fn from_wire_u8(raw: u64) -> Result<AccessLevel> {
        match raw {
            0 => Ok(AccessLevel::None),
            1 => Ok(AccessLevel::Basic),
            2 => Ok(AccessLevel::Installer),
            3 => Ok(AccessLevel::Expert),
            4 => Ok(AccessLevel::QualifiedServicePersonnel),
            other => Err(GatewayError::Protocol(format!(
                "unknown access level {other}"
            ))),
        }
    }
}

/// A property value as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    /// Coerce a wire string into a typed value.
    ///
    /// The order is fixed and deliberate: numeric parse first, then the
    /// case-insensitive boolean literals, else text. `"1"` is a number,
    /// `"TRUE"` is a bool, `""` is empty text.
    pub fn from_wire(raw: &str) -> PropertyValue {
        if let Ok(n) = raw.parse::<f64>() {
            return PropertyValue::Number(n);
        }
        if raw.eq_ignore_ascii_case("true") {
            return PropertyValue::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return PropertyValue::Bool(false);
        }
        PropertyValue::Text(raw.to_string())
    }

    /// Render for the text wire.
    pub fn to_wire(&self) -> String {
        match self {
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Text(s) => s.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Capabilities of a described property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DescriptionFlags: u32 {
        const READABLE = 1;
        const WRITABLE = 1 << 1;
        const SUBSCRIBABLE = 1 << 2;
        const LOGGED = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Modifiers for a property write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WriteFlags: u32 {
        const PERSISTENT = 1;
        const FORCE = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Functions a device behind the gateway advertises.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceFunctions: u32 {
        const GATEWAY = 1;
        const METER = 1 << 1;
        const INVERTER = 1 << 2;
        const BATTERY = 1 << 3;
        const CHARGEPOINT = 1 << 4;
        const SENSOR = 1 << 5;
    }
}

/// Render a flag set as comma-joined tokens in definition order. The order
/// is stable, so two renders of the same set are byte-identical.
pub(crate) fn render_flags<F: Flags>(flags: &F) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse comma-joined flag tokens. An unknown token is a protocol error.
pub(crate) fn parse_flags<F: Flags>(raw: &str) -> Result<F> {
    let mut flags = F::empty();
    if raw.is_empty() {
        return Ok(flags);
    }
    for token in raw.split(',') {
        let flag = F::from_name(token)
            .ok_or_else(|| GatewayError::Protocol(format!("unknown flag token {token:?}")))?;
        flags.insert(flag);
    }
    Ok(flags)
}

/// Outcome of reading one property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyReadResult {
    pub status: Status,
    pub id: String,
    /// Absent when the gateway reports a non-success status.
    pub value: Option<PropertyValue>,
}

/// Outcome of subscribing to or unsubscribing from one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySubscriptionResult {
    pub status: Status,
    pub id: String,
}

/// Outcome of writing one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyWriteResult {
    pub status: Status,
    pub id: String,
}

/// One device-originated message, used both for historical retrieval and
/// live push notifications. Always fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub timestamp: u64,
    pub access_id: String,
    pub device_id: String,
    pub message_id: u64,
    pub message: String,
}

/// One enumerated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub functions: DeviceFunctions,
}

/// Description of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescription {
    pub id: String,
    pub description: String,
    pub flags: DescriptionFlags,
}

/// One historical datalog sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DatalogEntry {
    pub timestamp: u64,
    pub value: PropertyValue,
}

/// Outcome of a datalog retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct DatalogReadResult {
    pub status: Status,
    pub id: String,
    pub entries: Vec<DatalogEntry>,
}

/// Outcome of a message-history retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesReadResult {
    pub status: Status,
    pub messages: Vec<DeviceMessage>,
}

/// Outcome of an extension call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionCallResult {
    pub status: ExtensionStatus,
    pub extension: String,
    pub function: String,
    pub result: String,
}

/// Hierarchical property selector `accessId.deviceId.propertyId`, each
/// segment independently wildcardable with `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySelector {
    pub access_id: String,
    pub device_id: String,
    pub property_id: String,
}

impl PropertySelector {
    pub fn new(
        access_id: impl Into<String>,
        device_id: impl Into<String>,
        property_id: impl Into<String>,
    ) -> Self {
        Self {
            access_id: access_id.into(),
            device_id: device_id.into(),
            property_id: property_id.into(),
        }
    }

    /// Selector matching every property of every device.
    pub fn any() -> Self {
        Self::new("*", "*", "*")
    }
}

impl fmt::Display for PropertySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.access_id, self.device_id, self.property_id)
    }
}

impl FromStr for PropertySelector {
    type Err = GatewayError;

    fn from_str(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(d), Some(p)) if !a.is_empty() && !d.is_empty() && !p.is_empty() => {
                Ok(PropertySelector::new(a, d, p))
            }
            _ => Err(GatewayError::Protocol(format!(
                "malformed property selector {raw:?}"
            ))),
        }
    }
}

/// User credentials for a credentialed authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Everything the gateway granted at authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub access_level: AccessLevel,
    pub gateway_version: String,
    pub extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_roundtrip() {
        for status in [
            Status::Success,
            Status::InProgress,
            Status::Error,
            Status::NoProperty,
            Status::NoDevice,
            Status::NoDeviceAccess,
            Status::Timeout,
            Status::InvalidValue,
        ] {
            assert_eq!(Status::from_wire_str(status.as_wire_str()), status);
            assert_eq!(Status::from_wire_u8(status.as_wire_u8() as u64), status);
        }
    }

    #[test]
    fn test_unknown_status_maps_to_error() {
        assert_eq!(Status::from_wire_str("Exploded"), Status::Error);
        assert_eq!(Status::from_wire_str(""), Status::Error);
        assert_eq!(Status::from_wire_u8(200), Status::Error);
    }

    #[test]
    fn test_unknown_extension_status_maps_to_error() {
        assert_eq!(
            ExtensionStatus::from_wire_str("Whatever"),
            ExtensionStatus::Error
        );
        assert_eq!(ExtensionStatus::from_wire_u8(99), ExtensionStatus::Error);
    }

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::None < AccessLevel::Basic);
        assert!(AccessLevel::Basic < AccessLevel::Installer);
        assert!(AccessLevel::Installer < AccessLevel::Expert);
        assert!(AccessLevel::Expert < AccessLevel::QualifiedServicePersonnel);
    }

    #[test]
    fn test_unknown_access_level_is_protocol_error() {
        assert!(AccessLevel::from_wire_str("Root").is_err());
        assert!(AccessLevel::from_wire_u8(9).is_err());
    }

    #[test]
    fn test_value_coercion_order() {
        assert_eq!(PropertyValue::from_wire("12.5"), PropertyValue::Number(12.5));
        assert_eq!(PropertyValue::from_wire("42"), PropertyValue::Number(42.0));
        assert_eq!(PropertyValue::from_wire("1"), PropertyValue::Number(1.0));
        assert_eq!(PropertyValue::from_wire("0"), PropertyValue::Number(0.0));
        assert_eq!(PropertyValue::from_wire("-3"), PropertyValue::Number(-3.0));
        assert_eq!(PropertyValue::from_wire("true"), PropertyValue::Bool(true));
        assert_eq!(PropertyValue::from_wire("TRUE"), PropertyValue::Bool(true));
        assert_eq!(PropertyValue::from_wire("False"), PropertyValue::Bool(false));
        assert_eq!(
            PropertyValue::from_wire("north"),
            PropertyValue::Text("north".to_string())
        );
        assert_eq!(
            PropertyValue::from_wire(""),
            PropertyValue::Text(String::new())
        );
    }

    #[test]
    fn test_value_wire_roundtrip() {
        for value in [
            PropertyValue::Number(42.0),
            PropertyValue::Number(12.5),
            PropertyValue::Bool(true),
            PropertyValue::Bool(false),
            PropertyValue::Text("north".to_string()),
        ] {
            assert_eq!(PropertyValue::from_wire(&value.to_wire()), value);
        }
    }

    #[test]
    fn test_flags_render_definition_order() {
        let flags = DescriptionFlags::WRITABLE | DescriptionFlags::READABLE;
        // Definition order, not insertion order.
        assert_eq!(render_flags(&flags), "READABLE,WRITABLE");
        assert_eq!(render_flags(&DescriptionFlags::empty()), "");
    }

    #[test]
    fn test_flags_parse() {
        let parsed: DescriptionFlags = parse_flags("READABLE,LOGGED").unwrap();
        assert_eq!(parsed, DescriptionFlags::READABLE | DescriptionFlags::LOGGED);
        let empty: WriteFlags = parse_flags("").unwrap();
        assert!(empty.is_empty());
        assert!(parse_flags::<DeviceFunctions>("TOASTER").is_err());
    }

    #[test]
    fn test_selector_display_parse() {
        let selector = PropertySelector::new("acc", "*", "temp");
        assert_eq!(selector.to_string(), "acc.*.temp");
        assert_eq!("acc.*.temp".parse::<PropertySelector>().unwrap(), selector);
        assert!("acc.temp".parse::<PropertySelector>().is_err());
        assert!("..".parse::<PropertySelector>().is_err());
    }
}
