//! Text frame codec: line-delimited, human-readable.
//!
//! Wire shape:
//!
//! ```text
//! <COMMAND>
//! key1:value1
//! key2:value2
//!
//! <optional body>
//! ```
//!
//! Header values may themselves contain `:`; only the first colon splits.
//! List-valued commands carry their payload as a JSON-encoded body, because
//! header lines would be unbounded in number. Encoding is deterministic:
//! headers are written in a fixed order and flag sets are comma-joined in
//! their definition order, so two encodes of the same logical call are
//! byte-identical.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::protocol::{
    parse_flags, render_flags, Command, Credentials, DatalogEntry, DatalogReadResult,
    DescriptionFlags, DeviceFunctions, DeviceInfo, DeviceMessage, ExtensionCallResult,
    ExtensionStatus, Message, MessagesReadResult, PropertyDescription, PropertyReadResult,
    PropertySelector, PropertySubscriptionResult, PropertyValue, PropertyWriteResult, SessionInfo,
    Status, WriteFlags, PROTOCOL_VERSION,
};

/// A parsed text frame before typed interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTextFrame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawTextFrame {
    fn new(command: Command) -> Self {
        Self {
            command: command.keyword().to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    fn body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    /// Render to wire bytes.
    pub fn render(&self) -> Bytes {
        let mut out = String::new();
        out.push_str(&self.command);
        out.push('\n');
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        Bytes::from(out)
    }

    /// Parse wire bytes into a raw frame.
    ///
    /// Rejects frames with fewer than two lines, frames without the
    /// blank-line header terminator, and header lines without a colon.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| GatewayError::Protocol("text frame is not valid UTF-8".to_string()))?;
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < 2 {
            return Err(GatewayError::Protocol(
                "text frame has fewer than 2 lines".to_string(),
            ));
        }
        let terminator = lines
            .iter()
            .position(|line| line.is_empty())
            .ok_or_else(|| {
                GatewayError::Protocol("text frame has no blank-line header terminator".to_string())
            })?;
        let mut headers = Vec::with_capacity(terminator.saturating_sub(1));
        for line in &lines[1..terminator] {
            let (key, value) = line.split_once(':').ok_or_else(|| {
                GatewayError::Protocol(format!("malformed header line {line:?}"))
            })?;
            headers.push((key.to_string(), value.to_string()));
        }
        Ok(Self {
            command: lines[0].to_string(),
            headers,
            body: lines[terminator + 1..].join("\n"),
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, command: Command, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| GatewayError::missing(command, key))
    }

    fn require_u64(&self, command: Command, key: &str) -> Result<u64> {
        let raw = self.require(command, key)?;
        raw.parse::<u64>().map_err(|_| {
            GatewayError::Protocol(format!(
                "header {key:?} in {} frame is not a number: {raw:?}",
                command.keyword()
            ))
        })
    }
}

// JSON body shapes. Values travel as wire strings and go through the same
// coercion rule as header values.

#[derive(Serialize, Deserialize)]
struct WireDevice {
    id: String,
    name: String,
    functions: String,
}

#[derive(Serialize, Deserialize)]
struct WireDescription {
    id: String,
    description: String,
    flags: String,
}

#[derive(Serialize, Deserialize)]
struct WireReadResult {
    status: String,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireSubscriptionResult {
    status: String,
    id: String,
}

#[derive(Serialize, Deserialize)]
struct WireDatalogEntry {
    timestamp: u64,
    value: String,
}

/// Codec for the line-oriented text encoding.
pub struct TextCodec;

impl TextCodec {
    /// Encode a message to text wire bytes.
    pub fn encode(message: &Message) -> Result<Bytes> {
        let frame = match message {
            Message::Authorize { credentials } => {
                let mut frame = RawTextFrame::new(Command::Authorize)
                    .header("protocol_version", PROTOCOL_VERSION.to_string());
                if let Some(credentials) = credentials {
                    frame = frame
                        .header("user", credentials.user.clone())
                        .header("password", credentials.password.clone());
                }
                frame
            }
            Message::Authorized { session } => {
                let mut frame = RawTextFrame::new(Command::Authorized)
                    .header("access_level", session.access_level.as_wire_str())
                    .header("protocol_version", PROTOCOL_VERSION.to_string())
                    .header("gateway_version", session.gateway_version.clone());
                if !session.extensions.is_empty() {
                    frame = frame.header("extensions", session.extensions.join(","));
                }
                frame
            }
            Message::Enumerate => RawTextFrame::new(Command::Enumerate),
            Message::Enumerated { devices } => {
                let wire: Vec<WireDevice> = devices
                    .iter()
                    .map(|d| WireDevice {
                        id: d.id.clone(),
                        name: d.name.clone(),
                        functions: render_flags(&d.functions),
                    })
                    .collect();
                RawTextFrame::new(Command::Enumerated).body(serde_json::to_string(&wire)?)
            }
            Message::Describe { selector } => {
                RawTextFrame::new(Command::Describe).header("id", selector.to_string())
            }
            Message::Description { properties } => {
                let wire: Vec<WireDescription> = properties
                    .iter()
                    .map(|p| WireDescription {
                        id: p.id.clone(),
                        description: p.description.clone(),
                        flags: render_flags(&p.flags),
                    })
                    .collect();
                RawTextFrame::new(Command::Description).body(serde_json::to_string(&wire)?)
            }
            Message::FindProperties { selector } => {
                RawTextFrame::new(Command::FindProperties).header("id", selector.to_string())
            }
            Message::PropertiesFound { ids } => {
                RawTextFrame::new(Command::PropertiesFound).body(serde_json::to_string(ids)?)
            }
            Message::ReadProperty { id } => {
                RawTextFrame::new(Command::ReadProperty).header("id", id.clone())
            }
            Message::PropertyRead { result } => {
                let mut frame = RawTextFrame::new(Command::PropertyRead)
                    .header("status", result.status.as_wire_str())
                    .header("id", result.id.clone());
                if let Some(value) = &result.value {
                    frame = frame.header("value", value.to_wire());
                }
                frame
            }
            Message::ReadProperties { ids } => {
                RawTextFrame::new(Command::ReadProperties).body(serde_json::to_string(ids)?)
            }
            Message::PropertiesRead { results } => {
                let wire: Vec<WireReadResult> = results.iter().map(read_result_to_wire).collect();
                RawTextFrame::new(Command::PropertiesRead).body(serde_json::to_string(&wire)?)
            }
            Message::WriteProperty { id, value, flags } => {
                let mut frame = RawTextFrame::new(Command::WriteProperty)
                    .header("id", id.clone())
                    .header("value", value.to_wire());
                if !flags.is_empty() {
                    frame = frame.header("flags", render_flags(flags));
                }
                frame
            }
            Message::PropertyWritten { result } => RawTextFrame::new(Command::PropertyWritten)
                .header("status", result.status.as_wire_str())
                .header("id", result.id.clone()),
            Message::SubscribeProperty { id } => {
                RawTextFrame::new(Command::SubscribeProperty).header("id", id.clone())
            }
            Message::PropertySubscribed { result } => {
                subscription_frame(Command::PropertySubscribed, result)
            }
            Message::SubscribeProperties { ids } => {
                RawTextFrame::new(Command::SubscribeProperties).body(serde_json::to_string(ids)?)
            }
            Message::PropertiesSubscribed { results } => {
                subscription_list_frame(Command::PropertiesSubscribed, results)?
            }
            Message::UnsubscribeProperty { id } => {
                RawTextFrame::new(Command::UnsubscribeProperty).header("id", id.clone())
            }
            Message::PropertyUnsubscribed { result } => {
                subscription_frame(Command::PropertyUnsubscribed, result)
            }
            Message::UnsubscribeProperties { ids } => {
                RawTextFrame::new(Command::UnsubscribeProperties).body(serde_json::to_string(ids)?)
            }
            Message::PropertiesUnsubscribed { results } => {
                subscription_list_frame(Command::PropertiesUnsubscribed, results)?
            }
            Message::PropertyUpdate { id, value } => RawTextFrame::new(Command::PropertyUpdate)
                .header("id", id.clone())
                .header("value", value.to_wire()),
            Message::ReadDatalogProperties => RawTextFrame::new(Command::ReadDatalogProperties),
            Message::DatalogPropertiesRead { ids } => {
                RawTextFrame::new(Command::DatalogPropertiesRead).body(serde_json::to_string(ids)?)
            }
            Message::ReadDatalog { id, start, end } => RawTextFrame::new(Command::ReadDatalog)
                .header("id", id.clone())
                .header("start", start.to_string())
                .header("end", end.to_string()),
            Message::DatalogRead { result } => {
                let wire: Vec<WireDatalogEntry> = result
                    .entries
                    .iter()
                    .map(|e| WireDatalogEntry {
                        timestamp: e.timestamp,
                        value: e.value.to_wire(),
                    })
                    .collect();
                RawTextFrame::new(Command::DatalogRead)
                    .header("status", result.status.as_wire_str())
                    .header("id", result.id.clone())
                    .body(serde_json::to_string(&wire)?)
            }
            Message::ReadMessages { start, end } => RawTextFrame::new(Command::ReadMessages)
                .header("start", start.to_string())
                .header("end", end.to_string()),
            Message::MessagesRead { result } => RawTextFrame::new(Command::MessagesRead)
                .header("status", result.status.as_wire_str())
                .body(serde_json::to_string(&result.messages)?),
            Message::DeviceMessage { message } => RawTextFrame::new(Command::DeviceMessage)
                .header("timestamp", message.timestamp.to_string())
                .header("access_id", message.access_id.clone())
                .header("device_id", message.device_id.clone())
                .header("message_id", message.message_id.to_string())
                .header("message", message.message.clone()),
            Message::CallExtension {
                extension,
                function,
                parameters,
            } => RawTextFrame::new(Command::CallExtension)
                .header("extension", extension.clone())
                .header("function", function.clone())
                .body(serde_json::to_string(parameters)?),
            Message::ExtensionCalled { result } => RawTextFrame::new(Command::ExtensionCalled)
                .header("status", result.status.as_wire_str())
                .header("extension", result.extension.clone())
                .header("function", result.function.clone())
                .body(result.result.clone()),
            Message::Error { reason } => {
                RawTextFrame::new(Command::Error).header("reason", reason.clone())
            }
        };
        Ok(frame.render())
    }

    /// Decode text wire bytes into a typed message.
    ///
    /// Every mandatory header of the command is validated; absence is a
    /// protocol error, never a default value.
    pub fn decode(bytes: &[u8]) -> Result<Message> {
        let frame = RawTextFrame::parse(bytes)?;
        let command = Command::from_keyword(&frame.command).ok_or_else(|| {
            GatewayError::Protocol(format!("unknown command keyword {:?}", frame.command))
        })?;
        match command {
            Command::Authorize => {
                check_protocol_version(&frame, command)?;
                let credentials = match (frame.get("user"), frame.get("password")) {
                    (Some(user), Some(password)) => Some(Credentials::new(user, password)),
                    (None, None) => None,
                    _ => {
                        return Err(GatewayError::Protocol(
                            "user and password headers must appear together".to_string(),
                        ))
                    }
                };
                Ok(Message::Authorize { credentials })
            }
            Command::Authorized => {
                let access_level = crate::protocol::AccessLevel::from_wire_str(
                    frame.require(command, "access_level")?,
                )?;
                check_protocol_version(&frame, command)?;
                let gateway_version = frame.require(command, "gateway_version")?.to_string();
                let extensions = match frame.get("extensions") {
                    Some(raw) if !raw.is_empty() => {
                        raw.split(',').map(str::to_string).collect()
                    }
                    _ => Vec::new(),
                };
                Ok(Message::Authorized {
                    session: SessionInfo {
                        access_level,
                        gateway_version,
                        extensions,
                    },
                })
            }
            Command::Enumerate => Ok(Message::Enumerate),
            Command::Enumerated => {
                let wire: Vec<WireDevice> = serde_json::from_str(&frame.body)?;
                let devices = wire
                    .into_iter()
                    .map(|d| {
                        Ok(DeviceInfo {
                            id: d.id,
                            name: d.name,
                            functions: parse_flags::<DeviceFunctions>(&d.functions)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Message::Enumerated { devices })
            }
            Command::Describe => Ok(Message::Describe {
                selector: frame.require(command, "id")?.parse::<PropertySelector>()?,
            }),
            Command::Description => {
                let wire: Vec<WireDescription> = serde_json::from_str(&frame.body)?;
                let properties = wire
                    .into_iter()
                    .map(|p| {
                        Ok(PropertyDescription {
                            id: p.id,
                            description: p.description,
                            flags: parse_flags::<DescriptionFlags>(&p.flags)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Message::Description { properties })
            }
            Command::FindProperties => Ok(Message::FindProperties {
                selector: frame.require(command, "id")?.parse::<PropertySelector>()?,
            }),
            Command::PropertiesFound => Ok(Message::PropertiesFound {
                ids: serde_json::from_str(&frame.body)?,
            }),
            Command::ReadProperty => Ok(Message::ReadProperty {
                id: frame.require(command, "id")?.to_string(),
            }),
            Command::PropertyRead => Ok(Message::PropertyRead {
                result: PropertyReadResult {
                    status: Status::from_wire_str(frame.require(command, "status")?),
                    id: frame.require(command, "id")?.to_string(),
                    value: frame.get("value").map(PropertyValue::from_wire),
                },
            }),
            Command::ReadProperties => Ok(Message::ReadProperties {
                ids: serde_json::from_str(&frame.body)?,
            }),
            Command::PropertiesRead => {
                let wire: Vec<WireReadResult> = serde_json::from_str(&frame.body)?;
                Ok(Message::PropertiesRead {
                    results: wire.into_iter().map(read_result_from_wire).collect(),
                })
            }
            Command::WriteProperty => Ok(Message::WriteProperty {
                id: frame.require(command, "id")?.to_string(),
                value: PropertyValue::from_wire(frame.require(command, "value")?),
                flags: match frame.get("flags") {
                    Some(raw) => parse_flags::<WriteFlags>(raw)?,
                    None => WriteFlags::empty(),
                },
            }),
            Command::PropertyWritten => Ok(Message::PropertyWritten {
                result: PropertyWriteResult {
                    status: Status::from_wire_str(frame.require(command, "status")?),
                    id: frame.require(command, "id")?.to_string(),
                },
            }),
            Command::SubscribeProperty => Ok(Message::SubscribeProperty {
                id: frame.require(command, "id")?.to_string(),
            }),
            Command::PropertySubscribed => Ok(Message::PropertySubscribed {
                result: decode_subscription(&frame, command)?,
            }),
            Command::SubscribeProperties => Ok(Message::SubscribeProperties {
                ids: serde_json::from_str(&frame.body)?,
            }),
            Command::PropertiesSubscribed => Ok(Message::PropertiesSubscribed {
                results: decode_subscription_list(&frame)?,
            }),
            Command::UnsubscribeProperty => Ok(Message::UnsubscribeProperty {
                id: frame.require(command, "id")?.to_string(),
            }),
            Command::PropertyUnsubscribed => Ok(Message::PropertyUnsubscribed {
                result: decode_subscription(&frame, command)?,
            }),
            Command::UnsubscribeProperties => Ok(Message::UnsubscribeProperties {
                ids: serde_json::from_str(&frame.body)?,
            }),
            Command::PropertiesUnsubscribed => Ok(Message::PropertiesUnsubscribed {
                results: decode_subscription_list(&frame)?,
            }),
            Command::PropertyUpdate => Ok(Message::PropertyUpdate {
                id: frame.require(command, "id")?.to_string(),
                value: PropertyValue::from_wire(frame.require(command, "value")?),
            }),
            Command::ReadDatalogProperties => Ok(Message::ReadDatalogProperties),
            Command::DatalogPropertiesRead => Ok(Message::DatalogPropertiesRead {
                ids: serde_json::from_str(&frame.body)?,
            }),
            Command::ReadDatalog => Ok(Message::ReadDatalog {
                id: frame.require(command, "id")?.to_string(),
                start: frame.require_u64(command, "start")?,
                end: frame.require_u64(command, "end")?,
            }),
            Command::DatalogRead => {
                let wire: Vec<WireDatalogEntry> = serde_json::from_str(&frame.body)?;
                Ok(Message::DatalogRead {
                    result: DatalogReadResult {
                        status: Status::from_wire_str(frame.require(command, "status")?),
                        id: frame.require(command, "id")?.to_string(),
                        entries: wire
                            .into_iter()
                            .map(|e| DatalogEntry {
                                timestamp: e.timestamp,
                                value: PropertyValue::from_wire(&e.value),
                            })
                            .collect(),
                    },
                })
            }
            Command::ReadMessages => Ok(Message::ReadMessages {
                start: frame.require_u64(command, "start")?,
                end: frame.require_u64(command, "end")?,
            }),
            Command::MessagesRead => Ok(Message::MessagesRead {
                result: MessagesReadResult {
                    status: Status::from_wire_str(frame.require(command, "status")?),
                    messages: serde_json::from_str(&frame.body)?,
                },
            }),
            Command::DeviceMessage => Ok(Message::DeviceMessage {
                message: DeviceMessage {
                    timestamp: frame.require_u64(command, "timestamp")?,
                    access_id: frame.require(command, "access_id")?.to_string(),
                    device_id: frame.require(command, "device_id")?.to_string(),
                    message_id: frame.require_u64(command, "message_id")?,
                    message: frame.require(command, "message")?.to_string(),
                },
            }),
            Command::CallExtension => Ok(Message::CallExtension {
                extension: frame.require(command, "extension")?.to_string(),
                function: frame.require(command, "function")?.to_string(),
                parameters: serde_json::from_str(&frame.body)?,
            }),
            Command::ExtensionCalled => Ok(Message::ExtensionCalled {
                result: ExtensionCallResult {
                    status: ExtensionStatus::from_wire_str(frame.require(command, "status")?),
                    extension: frame.require(command, "extension")?.to_string(),
                    function: frame.require(command, "function")?.to_string(),
                    result: frame.body.clone(),
                },
            }),
            Command::Error => Ok(Message::Error {
                reason: frame.require(command, "reason")?.to_string(),
            }),
        }
    }
}

fn check_protocol_version(frame: &RawTextFrame, command: Command) -> Result<()> {
    let version = frame.require(command, "protocol_version")?;
    if version != PROTOCOL_VERSION.to_string() {
        return Err(GatewayError::VersionMismatch(version.to_string()));
    }
    Ok(())
}

fn read_result_to_wire(result: &PropertyReadResult) -> WireReadResult {
    WireReadResult {
        status: result.status.as_wire_str().to_string(),
        id: result.id.clone(),
        value: result.value.as_ref().map(PropertyValue::to_wire),
    }
}

fn read_result_from_wire(wire: WireReadResult) -> PropertyReadResult {
    PropertyReadResult {
        status: Status::from_wire_str(&wire.status),
        id: wire.id,
        value: wire.value.as_deref().map(PropertyValue::from_wire),
    }
}

fn subscription_frame(command: Command, result: &PropertySubscriptionResult) -> RawTextFrame {
    RawTextFrame::new(command)
        .header("status", result.status.as_wire_str())
        .header("id", result.id.clone())
}

fn subscription_list_frame(
    command: Command,
    results: &[PropertySubscriptionResult],
) -> Result<RawTextFrame> {
    let wire: Vec<WireSubscriptionResult> = results
        .iter()
        .map(|r| WireSubscriptionResult {
            status: r.status.as_wire_str().to_string(),
            id: r.id.clone(),
        })
        .collect();
    Ok(RawTextFrame::new(command).body(serde_json::to_string(&wire)?))
}

fn decode_subscription(
    frame: &RawTextFrame,
    command: Command,
) -> Result<PropertySubscriptionResult> {
    Ok(PropertySubscriptionResult {
        status: Status::from_wire_str(frame.require(command, "status")?),
        id: frame.require(command, "id")?.to_string(),
    })
}

fn decode_subscription_list(frame: &RawTextFrame) -> Result<Vec<PropertySubscriptionResult>> {
    let wire: Vec<WireSubscriptionResult> = serde_json::from_str(&frame.body)?;
    Ok(wire
        .into_iter()
        .map(|r| PropertySubscriptionResult {
            status: Status::from_wire_str(&r.status),
            id: r.id,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AccessLevel;

    fn roundtrip(message: Message) {
        let encoded = TextCodec::encode(&message).unwrap();
        let decoded = TextCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, message, "text roundtrip failed");
    }

    #[test]
    fn test_raw_parse_rejects_single_line() {
        assert!(matches!(
            RawTextFrame::parse(b"ENUMERATE"),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_raw_parse_rejects_missing_terminator() {
        assert!(matches!(
            RawTextFrame::parse(b"AUTHORIZE\nprotocol_version:1"),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_raw_parse_rejects_header_without_colon() {
        assert!(RawTextFrame::parse(b"ERROR\nreason\n\n").is_err());
    }

    #[test]
    fn test_header_value_may_contain_colon() {
        let frame = RawTextFrame::parse(b"ERROR\nreason:db: connection lost\n\n").unwrap();
        assert_eq!(frame.get("reason"), Some("db: connection lost"));
    }

    #[test]
    fn test_anonymous_authorize_wire_shape() {
        let encoded = TextCodec::encode(&Message::Authorize { credentials: None }).unwrap();
        assert_eq!(&encoded[..], b"AUTHORIZE\nprotocol_version:1\n\n");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let message = Message::WriteProperty {
            id: "dev.x.1".to_string(),
            value: PropertyValue::Number(21.5),
            flags: WriteFlags::FORCE | WriteFlags::PERSISTENT,
        };
        let first = TextCodec::encode(&message).unwrap();
        let second = TextCodec::encode(&message).unwrap();
        assert_eq!(first, second);
        // Flags render in definition order regardless of construction order.
        assert!(std::str::from_utf8(&first)
            .unwrap()
            .contains("flags:PERSISTENT,FORCE"));
    }

    #[test]
    fn test_roundtrip_all_commands() {
        let session = SessionInfo {
            access_level: AccessLevel::Installer,
            gateway_version: "2.4.0".to_string(),
            extensions: vec!["billing".to_string(), "diag".to_string()],
        };
        let read = PropertyReadResult {
            status: Status::Success,
            id: "acc.dev.1".to_string(),
            value: Some(PropertyValue::Number(42.0)),
        };
        let sub = PropertySubscriptionResult {
            status: Status::Success,
            id: "acc.dev.1".to_string(),
        };
        let msg = DeviceMessage {
            timestamp: 1_700_000_000,
            access_id: "acc".to_string(),
            device_id: "dev".to_string(),
            message_id: 7,
            message: "filter clogged".to_string(),
        };
        let cases = vec![
            Message::Authorize { credentials: None },
            Message::Authorize {
                credentials: Some(Credentials::new("svc", "hunter:2")),
            },
            Message::Authorized { session },
            Message::Enumerate,
            Message::Enumerated {
                devices: vec![DeviceInfo {
                    id: "dev".to_string(),
                    name: "Heat pump".to_string(),
                    functions: DeviceFunctions::METER | DeviceFunctions::SENSOR,
                }],
            },
            Message::Describe {
                selector: PropertySelector::new("acc", "*", "temp"),
            },
            Message::Description {
                properties: vec![PropertyDescription {
                    id: "acc.dev.temp".to_string(),
                    description: "Outdoor temperature".to_string(),
                    flags: DescriptionFlags::READABLE | DescriptionFlags::LOGGED,
                }],
            },
            Message::FindProperties {
                selector: PropertySelector::any(),
            },
            Message::PropertiesFound {
                ids: vec!["acc.dev.1".to_string(), "acc.dev.2".to_string()],
            },
            Message::ReadProperty {
                id: "acc.dev.1".to_string(),
            },
            Message::PropertyRead {
                result: read.clone(),
            },
            Message::ReadProperties {
                ids: vec!["acc.dev.1".to_string()],
            },
            Message::PropertiesRead {
                results: vec![
                    read,
                    PropertyReadResult {
                        status: Status::NoProperty,
                        id: "acc.dev.9".to_string(),
                        value: None,
                    },
                ],
            },
            Message::WriteProperty {
                id: "acc.dev.1".to_string(),
                value: PropertyValue::Bool(true),
                flags: WriteFlags::empty(),
            },
            Message::PropertyWritten {
                result: PropertyWriteResult {
                    status: Status::Success,
                    id: "acc.dev.1".to_string(),
                },
            },
            Message::SubscribeProperty {
                id: "acc.dev.1".to_string(),
            },
            Message::PropertySubscribed { result: sub.clone() },
            Message::SubscribeProperties {
                ids: vec!["acc.dev.1".to_string()],
            },
            Message::PropertiesSubscribed {
                results: vec![sub.clone()],
            },
            Message::UnsubscribeProperty {
                id: "acc.dev.1".to_string(),
            },
            Message::PropertyUnsubscribed { result: sub.clone() },
            Message::UnsubscribeProperties {
                ids: vec!["acc.dev.1".to_string()],
            },
            Message::PropertiesUnsubscribed { results: vec![sub] },
            Message::PropertyUpdate {
                id: "acc.dev.1".to_string(),
                value: PropertyValue::Text("north".to_string()),
            },
            Message::ReadDatalogProperties,
            Message::DatalogPropertiesRead {
                ids: vec!["acc.dev.1".to_string()],
            },
            Message::ReadDatalog {
                id: "acc.dev.1".to_string(),
                start: 100,
                end: 200,
            },
            Message::DatalogRead {
                result: DatalogReadResult {
                    status: Status::Success,
                    id: "acc.dev.1".to_string(),
                    entries: vec![DatalogEntry {
                        timestamp: 150,
                        value: PropertyValue::Number(21.5),
                    }],
                },
            },
            Message::ReadMessages { start: 0, end: 999 },
            Message::MessagesRead {
                result: MessagesReadResult {
                    status: Status::Success,
                    messages: vec![msg.clone()],
                },
            },
            Message::DeviceMessage { message: msg },
            Message::CallExtension {
                extension: "billing".to_string(),
                function: "invoice".to_string(),
                parameters: vec!["2024".to_string(), "05".to_string()],
            },
            Message::ExtensionCalled {
                result: ExtensionCallResult {
                    status: ExtensionStatus::Success,
                    extension: "billing".to_string(),
                    function: "invoice".to_string(),
                    result: "{\"total\":12}".to_string(),
                },
            },
            Message::Error {
                reason: "device unreachable".to_string(),
            },
        ];
        for case in cases {
            roundtrip(case);
        }
    }

    #[test]
    fn test_missing_mandatory_header_is_protocol_error() {
        // PROPERTY READ without its id header.
        let err = TextCodec::decode(b"PROPERTY READ\nstatus:Success\n\n").unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)), "{err}");
    }

    #[test]
    fn test_authorized_missing_gateway_version() {
        let frame = b"AUTHORIZED\naccess_level:Basic\nprotocol_version:1\n\n";
        let err = TextCodec::decode(frame).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)), "{err}");
    }

    #[test]
    fn test_authorized_version_mismatch() {
        let frame = b"AUTHORIZED\naccess_level:Basic\nprotocol_version:2\ngateway_version:9\n\n";
        assert!(matches!(
            TextCodec::decode(frame).unwrap_err(),
            GatewayError::VersionMismatch(v) if v == "2"
        ));
    }

    #[test]
    fn test_credentials_must_appear_together() {
        let frame = b"AUTHORIZE\nprotocol_version:1\nuser:svc\n\n";
        assert!(TextCodec::decode(frame).is_err());
    }

    #[test]
    fn test_unknown_status_decodes_to_error() {
        let frame = b"PROPERTY WRITTEN\nstatus:Sideways\nid:a.b.c\n\n";
        match TextCodec::decode(frame).unwrap() {
            Message::PropertyWritten { result } => assert_eq!(result.status, Status::Error),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_unknown_keyword() {
        assert!(TextCodec::decode(b"REBOOT\n\n").is_err());
    }

    #[test]
    fn test_read_property_response_value_coercion() {
        let frame = b"PROPERTY READ\nstatus:Success\nid:dev.x.1\nvalue:42\n\n";
        match TextCodec::decode(frame).unwrap() {
            Message::PropertyRead { result } => {
                assert_eq!(result.value, Some(PropertyValue::Number(42.0)));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_authorized_without_extensions_header() {
        let frame = b"AUTHORIZED\naccess_level:Expert\nprotocol_version:1\ngateway_version:2.4\n\n";
        match TextCodec::decode(frame).unwrap() {
            Message::Authorized { session } => {
                assert!(session.extensions.is_empty());
                assert_eq!(session.access_level, AccessLevel::Expert);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
