//! Binary frame codec: one command id byte followed by a CBOR payload.
//!
//! The id byte carries direction in its high bit (responses and pushes have
//! it set), so a frame's kind is known before any payload is touched. The
//! datalog-properties pair exists only on the text wire; encoding it here is
//! [`GatewayError::UnsupportedCommand`].

use bytes::{BufMut, Bytes, BytesMut};

use super::cbor::{CborReader, CborWriter};
use crate::error::{GatewayError, Result};
use crate::protocol::{
    AccessLevel, Command, Credentials, DatalogEntry, DatalogReadResult, DescriptionFlags,
    DeviceFunctions, DeviceInfo, DeviceMessage, ExtensionCallResult, ExtensionStatus, Message,
    MessagesReadResult, PropertyDescription, PropertyReadResult, PropertySelector,
    PropertySubscriptionResult, PropertyWriteResult, SessionInfo, Status, WriteFlags,
    PROTOCOL_VERSION,
};

/// Codec for the compact binary encoding.
pub struct BinaryCodec;

impl BinaryCodec {
    /// Encode a message to binary wire bytes.
    pub fn encode(message: &Message) -> Result<Bytes> {
        let command = message.command();
        let id = command
            .binary_id()
            .ok_or(GatewayError::UnsupportedCommand(command))?;
        let mut writer = CborWriter::new();
        match message {
            Message::Authorize { credentials } => {
                writer.uint(PROTOCOL_VERSION);
                match credentials {
                    Some(credentials) => {
                        writer.array(2);
                        writer.text(&credentials.user);
                        writer.text(&credentials.password);
                    }
                    None => writer.null(),
                }
            }
            Message::Authorized { session } => {
                writer.uint(PROTOCOL_VERSION);
                writer.uint(session.access_level.as_wire_u8() as u64);
                writer.text(&session.gateway_version);
                writer.array(session.extensions.len());
                for extension in &session.extensions {
                    writer.text(extension);
                }
            }
            Message::Enumerate => {}
            Message::Enumerated { devices } => {
                writer.array(devices.len());
                for device in devices {
                    writer.array(3);
                    writer.text(&device.id);
                    writer.text(&device.name);
                    writer.uint(device.functions.bits() as u64);
                }
            }
            Message::Describe { selector } | Message::FindProperties { selector } => {
                writer.text(&selector.to_string());
            }
            Message::Description { properties } => {
                writer.array(properties.len());
                for property in properties {
                    writer.array(3);
                    writer.text(&property.id);
                    writer.text(&property.description);
                    writer.uint(property.flags.bits() as u64);
                }
            }
            Message::PropertiesFound { ids }
            | Message::ReadProperties { ids }
            | Message::SubscribeProperties { ids }
            | Message::UnsubscribeProperties { ids } => {
                write_id_list(&mut writer, ids);
            }
            Message::ReadProperty { id }
            | Message::SubscribeProperty { id }
            | Message::UnsubscribeProperty { id } => {
                writer.text(id);
            }
            Message::PropertyRead { result } => {
                write_read_result(&mut writer, result);
            }
            Message::PropertiesRead { results } => {
                writer.array(results.len());
                for result in results {
                    writer.array(3);
                    write_read_result(&mut writer, result);
                }
            }
            Message::WriteProperty { id, value, flags } => {
                writer.text(id);
                writer.property_value(value);
                writer.uint(flags.bits() as u64);
            }
            Message::PropertyWritten { result } => {
                writer.uint(result.status.as_wire_u8() as u64);
                writer.text(&result.id);
            }
            Message::PropertySubscribed { result } | Message::PropertyUnsubscribed { result } => {
                write_subscription_result(&mut writer, result);
            }
            Message::PropertiesSubscribed { results }
            | Message::PropertiesUnsubscribed { results } => {
                writer.array(results.len());
                for result in results {
                    writer.array(2);
                    write_subscription_result(&mut writer, result);
                }
            }
            Message::PropertyUpdate { id, value } => {
                writer.text(id);
                writer.property_value(value);
            }
            Message::ReadDatalog { id, start, end } => {
                writer.text(id);
                writer.uint(*start);
                writer.uint(*end);
            }
            Message::DatalogRead { result } => {
                writer.uint(result.status.as_wire_u8() as u64);
                writer.text(&result.id);
                writer.array(result.entries.len());
                for entry in &result.entries {
                    writer.array(2);
                    writer.uint(entry.timestamp);
                    writer.property_value(&entry.value);
                }
            }
            Message::ReadMessages { start, end } => {
                writer.uint(*start);
                writer.uint(*end);
            }
            Message::MessagesRead { result } => {
                writer.uint(result.status.as_wire_u8() as u64);
                writer.array(result.messages.len());
                for message in &result.messages {
                    writer.array(5);
                    write_device_message(&mut writer, message);
                }
            }
            Message::DeviceMessage { message } => {
                write_device_message(&mut writer, message);
            }
            Message::CallExtension {
                extension,
                function,
                parameters,
            } => {
                writer.text(extension);
                writer.text(function);
                write_id_list(&mut writer, parameters);
            }
            Message::ExtensionCalled { result } => {
                writer.uint(result.status.as_wire_u8() as u64);
                writer.text(&result.extension);
                writer.text(&result.function);
                writer.text(&result.result);
            }
            Message::Error { reason } => {
                writer.text(reason);
            }
            Message::ReadDatalogProperties | Message::DatalogPropertiesRead { .. } => {
                // Unreachable: binary_id() returned None above.
                return Err(GatewayError::UnsupportedCommand(command));
            }
        }
        let payload = writer.into_bytes();
        let mut frame = BytesMut::with_capacity(1 + payload.len());
        frame.put_u8(id);
        frame.put_slice(&payload);
        Ok(frame.freeze())
    }

    /// Decode binary wire bytes into a typed message.
    ///
    /// The payload must be consumed exactly; trailing bytes are a protocol
    /// error. An empty input is [`GatewayError::Truncated`].
    pub fn decode(bytes: &[u8]) -> Result<Message> {
        let (&id, payload) = bytes.split_first().ok_or(GatewayError::Truncated)?;
        let command = Command::from_binary_id(id)
            .ok_or_else(|| GatewayError::Protocol(format!("unknown command id {id:#04x}")))?;
        let mut reader = CborReader::new(payload);
        let message = match command {
            Command::Authorize => {
                check_protocol_version(reader.uint()?)?;
                let credentials = if reader.is_null()? {
                    None
                } else {
                    let len = reader.array_len()?;
                    if len != 2 {
                        return Err(GatewayError::Protocol(format!(
                            "credentials array has {len} items, expected 2"
                        )));
                    }
                    Some(Credentials::new(reader.text()?, reader.text()?))
                };
                Message::Authorize { credentials }
            }
            Command::Authorized => {
                check_protocol_version(reader.uint()?)?;
                let access_level = AccessLevel::from_wire_u8(reader.uint()?)?;
                let gateway_version = reader.text()?;
                let count = reader.array_len()?;
                let mut extensions = Vec::with_capacity(count);
                for _ in 0..count {
                    extensions.push(reader.text()?);
                }
                Message::Authorized {
                    session: SessionInfo {
                        access_level,
                        gateway_version,
                        extensions,
                    },
                }
            }
            Command::Enumerate => Message::Enumerate,
            Command::Enumerated => {
                let count = reader.array_len()?;
                let mut devices = Vec::with_capacity(count);
                for _ in 0..count {
                    expect_tuple(&mut reader, 3)?;
                    devices.push(DeviceInfo {
                        id: reader.text()?,
                        name: reader.text()?,
                        functions: flags_from_bits::<DeviceFunctions>(reader.uint()?)?,
                    });
                }
                Message::Enumerated { devices }
            }
            Command::Describe => Message::Describe {
                selector: reader.text()?.parse::<PropertySelector>()?,
            },
            Command::Description => {
                let count = reader.array_len()?;
                let mut properties = Vec::with_capacity(count);
                for _ in 0..count {
                    expect_tuple(&mut reader, 3)?;
                    properties.push(PropertyDescription {
                        id: reader.text()?,
                        description: reader.text()?,
                        flags: flags_from_bits::<DescriptionFlags>(reader.uint()?)?,
                    });
                }
                Message::Description { properties }
            }
            Command::FindProperties => Message::FindProperties {
                selector: reader.text()?.parse::<PropertySelector>()?,
            },
            Command::PropertiesFound => Message::PropertiesFound {
                ids: read_id_list(&mut reader)?,
            },
            Command::ReadProperty => Message::ReadProperty { id: reader.text()? },
            Command::PropertyRead => Message::PropertyRead {
                result: read_read_result(&mut reader)?,
            },
            Command::ReadProperties => Message::ReadProperties {
                ids: read_id_list(&mut reader)?,
            },
            Command::PropertiesRead => {
                let count = reader.array_len()?;
                let mut results = Vec::with_capacity(count);
                for _ in 0..count {
                    expect_tuple(&mut reader, 3)?;
                    results.push(read_read_result(&mut reader)?);
                }
                Message::PropertiesRead { results }
            }
            Command::WriteProperty => Message::WriteProperty {
                id: reader.text()?,
                value: reader.property_value()?,
                flags: flags_from_bits::<WriteFlags>(reader.uint()?)?,
            },
            Command::PropertyWritten => Message::PropertyWritten {
                result: PropertyWriteResult {
                    status: Status::from_wire_u8(reader.uint()?),
                    id: reader.text()?,
                },
            },
            Command::SubscribeProperty => Message::SubscribeProperty { id: reader.text()? },
            Command::PropertySubscribed => Message::PropertySubscribed {
                result: read_subscription_result(&mut reader)?,
            },
            Command::SubscribeProperties => Message::SubscribeProperties {
                ids: read_id_list(&mut reader)?,
            },
            Command::PropertiesSubscribed => Message::PropertiesSubscribed {
                results: read_subscription_list(&mut reader)?,
            },
            Command::UnsubscribeProperty => Message::UnsubscribeProperty { id: reader.text()? },
            Command::PropertyUnsubscribed => Message::PropertyUnsubscribed {
                result: read_subscription_result(&mut reader)?,
            },
            Command::UnsubscribeProperties => Message::UnsubscribeProperties {
                ids: read_id_list(&mut reader)?,
            },
            Command::PropertiesUnsubscribed => Message::PropertiesUnsubscribed {
                results: read_subscription_list(&mut reader)?,
            },
            Command::PropertyUpdate => Message::PropertyUpdate {
                id: reader.text()?,
                value: reader.property_value()?,
            },
            Command::ReadDatalog => Message::ReadDatalog {
                id: reader.text()?,
                start: reader.uint()?,
                end: reader.uint()?,
            },
            Command::DatalogRead => {
                let status = Status::from_wire_u8(reader.uint()?);
                let id = reader.text()?;
                let count = reader.array_len()?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    expect_tuple(&mut reader, 2)?;
                    entries.push(DatalogEntry {
                        timestamp: reader.uint()?,
                        value: reader.property_value()?,
                    });
                }
                Message::DatalogRead {
                    result: DatalogReadResult {
                        status,
                        id,
                        entries,
                    },
                }
            }
            Command::ReadMessages => Message::ReadMessages {
                start: reader.uint()?,
                end: reader.uint()?,
            },
            Command::MessagesRead => {
                let status = Status::from_wire_u8(reader.uint()?);
                let count = reader.array_len()?;
                let mut messages = Vec::with_capacity(count);
                for _ in 0..count {
                    expect_tuple(&mut reader, 5)?;
                    messages.push(read_device_message(&mut reader)?);
                }
                Message::MessagesRead {
                    result: MessagesReadResult { status, messages },
                }
            }
            Command::DeviceMessage => Message::DeviceMessage {
                message: read_device_message(&mut reader)?,
            },
            Command::CallExtension => Message::CallExtension {
                extension: reader.text()?,
                function: reader.text()?,
                parameters: read_id_list(&mut reader)?,
            },
            Command::ExtensionCalled => Message::ExtensionCalled {
                result: ExtensionCallResult {
                    status: ExtensionStatus::from_wire_u8(reader.uint()?),
                    extension: reader.text()?,
                    function: reader.text()?,
                    result: reader.text()?,
                },
            },
            Command::Error => Message::Error {
                reason: reader.text()?,
            },
            Command::ReadDatalogProperties | Command::DatalogPropertiesRead => {
                // Unreachable: from_binary_id never yields these.
                return Err(GatewayError::UnsupportedCommand(command));
            }
        };
        reader.expect_end()?;
        Ok(message)
    }
}

fn check_protocol_version(version: u64) -> Result<()> {
    if version != PROTOCOL_VERSION {
        return Err(GatewayError::VersionMismatch(version.to_string()));
    }
    Ok(())
}

/// Bit sets travel strictly: a set bit outside the known flags is a protocol
/// error, same as an unknown flag token on the text wire.
fn flags_from_bits<F: bitflags::Flags<Bits = u32>>(raw: u64) -> Result<F> {
    let bits = u32::try_from(raw)
        .map_err(|_| GatewayError::Protocol(format!("flag bits {raw:#x} out of range")))?;
    F::from_bits(bits)
        .ok_or_else(|| GatewayError::Protocol(format!("unknown flag bits {bits:#x}")))
}

fn expect_tuple(reader: &mut CborReader<'_>, len: usize) -> Result<()> {
    let actual = reader.array_len()?;
    if actual != len {
        return Err(GatewayError::Protocol(format!(
            "record array has {actual} items, expected {len}"
        )));
    }
    Ok(())
}

fn write_id_list(writer: &mut CborWriter, ids: &[String]) {
    writer.array(ids.len());
    for id in ids {
        writer.text(id);
    }
}

fn read_id_list(reader: &mut CborReader<'_>) -> Result<Vec<String>> {
    let count = reader.array_len()?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(reader.text()?);
    }
    Ok(ids)
}

fn write_read_result(writer: &mut CborWriter, result: &PropertyReadResult) {
    writer.uint(result.status.as_wire_u8() as u64);
    writer.text(&result.id);
    match &result.value {
        Some(value) => writer.property_value(value),
        None => writer.null(),
    }
}

fn read_read_result(reader: &mut CborReader<'_>) -> Result<PropertyReadResult> {
    Ok(PropertyReadResult {
        status: Status::from_wire_u8(reader.uint()?),
        id: reader.text()?,
        value: reader.optional_property_value()?,
    })
}

fn write_subscription_result(writer: &mut CborWriter, result: &PropertySubscriptionResult) {
    writer.uint(result.status.as_wire_u8() as u64);
    writer.text(&result.id);
}

fn read_subscription_result(reader: &mut CborReader<'_>) -> Result<PropertySubscriptionResult> {
    Ok(PropertySubscriptionResult {
        status: Status::from_wire_u8(reader.uint()?),
        id: reader.text()?,
    })
}

fn read_subscription_list(reader: &mut CborReader<'_>) -> Result<Vec<PropertySubscriptionResult>> {
    let count = reader.array_len()?;
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        expect_tuple(reader, 2)?;
        results.push(read_subscription_result(reader)?);
    }
    Ok(results)
}

fn write_device_message(writer: &mut CborWriter, message: &DeviceMessage) {
    writer.uint(message.timestamp);
    writer.text(&message.access_id);
    writer.text(&message.device_id);
    writer.uint(message.message_id);
    writer.text(&message.message);
}

fn read_device_message(reader: &mut CborReader<'_>) -> Result<DeviceMessage> {
    Ok(DeviceMessage {
        timestamp: reader.uint()?,
        access_id: reader.text()?,
        device_id: reader.text()?,
        message_id: reader.uint()?,
        message: reader.text()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PropertyValue;

    fn roundtrip(message: Message) {
        let encoded = BinaryCodec::encode(&message).unwrap();
        let decoded = BinaryCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, message, "binary roundtrip failed");
    }

    #[test]
    fn test_frame_starts_with_command_id() {
        let encoded = BinaryCodec::encode(&Message::Enumerate).unwrap();
        assert_eq!(encoded[0], 0x02);
        let encoded = BinaryCodec::encode(&Message::Error {
            reason: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(encoded[0], 0xFF);
    }

    #[test]
    fn test_roundtrip_binary_commands() {
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
                credentials: Some(Credentials::new("svc", "secret")),
            },
            Message::Authorized {
                session: SessionInfo {
                    access_level: AccessLevel::Expert,
                    gateway_version: "2.4.0".to_string(),
                    extensions: vec!["billing".to_string()],
                },
            },
            Message::Enumerate,
            Message::Enumerated {
                devices: vec![DeviceInfo {
                    id: "dev".to_string(),
                    name: "Heat pump".to_string(),
                    functions: DeviceFunctions::METER | DeviceFunctions::BATTERY,
                }],
            },
            Message::Describe {
                selector: PropertySelector::new("acc", "*", "temp"),
            },
            Message::Description {
                properties: vec![PropertyDescription {
                    id: "acc.dev.temp".to_string(),
                    description: "Outdoor temperature".to_string(),
                    flags: DescriptionFlags::READABLE | DescriptionFlags::SUBSCRIBABLE,
                }],
            },
            Message::FindProperties {
                selector: PropertySelector::any(),
            },
            Message::PropertiesFound {
                ids: vec!["acc.dev.1".to_string()],
            },
            Message::ReadProperty {
                id: "acc.dev.1".to_string(),
            },
            Message::PropertyRead {
                result: read.clone(),
            },
            Message::ReadProperties {
                ids: vec!["acc.dev.1".to_string(), "acc.dev.2".to_string()],
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
                flags: WriteFlags::PERSISTENT,
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
                parameters: vec!["2024".to_string()],
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
    fn test_text_only_commands_are_unsupported() {
        assert!(matches!(
            BinaryCodec::encode(&Message::ReadDatalogProperties),
            Err(GatewayError::UnsupportedCommand(
                Command::ReadDatalogProperties
            ))
        ));
        assert!(matches!(
            BinaryCodec::encode(&Message::DatalogPropertiesRead { ids: vec![] }),
            Err(GatewayError::UnsupportedCommand(
                Command::DatalogPropertiesRead
            ))
        ));
    }

    #[test]
    fn test_empty_frame_is_truncated() {
        assert!(matches!(
            BinaryCodec::decode(&[]),
            Err(GatewayError::Truncated)
        ));
    }

    #[test]
    fn test_unknown_command_id() {
        assert!(matches!(
            BinaryCodec::decode(&[0x7E]),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let full = BinaryCodec::encode(&Message::ReadProperty {
            id: "acc.dev.1".to_string(),
        })
        .unwrap();
        assert!(matches!(
            BinaryCodec::decode(&full[..full.len() - 2]),
            Err(GatewayError::Truncated)
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = BinaryCodec::encode(&Message::Enumerate).unwrap().to_vec();
        bytes.push(0x00);
        assert!(matches!(
            BinaryCodec::decode(&bytes),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_unknown_flag_bits_rejected() {
        // WRITE PROPERTY with a flag bit outside the known set.
        let mut writer = CborWriter::new();
        writer.text("acc.dev.1");
        writer.property_value(&PropertyValue::Number(1.0));
        writer.uint(1 << 7);
        let mut frame = vec![0x07];
        frame.extend_from_slice(&writer.into_bytes());
        assert!(matches!(
            BinaryCodec::decode(&frame),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let mut writer = CborWriter::new();
        writer.uint(9);
        writer.null();
        let mut frame = vec![0x01];
        frame.extend_from_slice(&writer.into_bytes());
        assert!(matches!(
            BinaryCodec::decode(&frame),
            Err(GatewayError::VersionMismatch(v)) if v == "9"
        ));
    }

    #[test]
    fn test_unknown_status_decodes_to_error() {
        let mut writer = CborWriter::new();
        writer.uint(42);
        writer.text("acc.dev.1");
        let mut frame = vec![0x87];
        frame.extend_from_slice(&writer.into_bytes());
        match BinaryCodec::decode(&frame).unwrap() {
            Message::PropertyWritten { result } => assert_eq!(result.status, Status::Error),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let message = Message::ReadProperties {
            ids: vec!["a.b.c".to_string(), "d.e.f".to_string()],
        };
        assert_eq!(
            BinaryCodec::encode(&message).unwrap(),
            BinaryCodec::encode(&message).unwrap()
        );
    }
}
