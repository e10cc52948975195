//! Minimal CBOR subset used by the binary frame encoding.
//!
//! Only the types the protocol actually puts on the wire are supported:
//! unsigned integers, 64-bit floats, booleans, null, UTF-8 text and
//! definite-length arrays. Integers encode canonically (shortest argument
//! form), so encoding is deterministic.
//!
//! The reader distinguishes two failure classes: running out of bytes is
//! [`GatewayError::Truncated`] (the frame may simply be incomplete), while
//! a structurally invalid byte sequence is a protocol error.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{GatewayError, Result};
use crate::protocol::PropertyValue;

const MAJOR_UINT: u8 = 0;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const SIMPLE_FALSE: u8 = 0xF4;
const SIMPLE_TRUE: u8 = 0xF5;
const SIMPLE_NULL: u8 = 0xF6;
const SIMPLE_F64: u8 = 0xFB;

/// Append-only CBOR encoder.
pub struct CborWriter {
    buf: BytesMut,
}

impl CborWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    /// Write a major type with its argument in canonical shortest form.
    fn type_arg(&mut self, major: u8, arg: u64) {
        let high = major << 5;
        if arg < 24 {
            self.buf.put_u8(high | arg as u8);
        } else if arg <= u8::MAX as u64 {
            self.buf.put_u8(high | 24);
            self.buf.put_u8(arg as u8);
        } else if arg <= u16::MAX as u64 {
            self.buf.put_u8(high | 25);
            self.buf.put_u16(arg as u16);
        } else if arg <= u32::MAX as u64 {
            self.buf.put_u8(high | 26);
            self.buf.put_u32(arg as u32);
        } else {
            self.buf.put_u8(high | 27);
            self.buf.put_u64(arg);
        }
    }

    pub fn uint(&mut self, value: u64) {
        self.type_arg(MAJOR_UINT, value);
    }

    pub fn float(&mut self, value: f64) {
        self.buf.put_u8(SIMPLE_F64);
        self.buf.put_f64(value);
    }

    pub fn bool(&mut self, value: bool) {
        self.buf
            .put_u8(if value { SIMPLE_TRUE } else { SIMPLE_FALSE });
    }

    pub fn null(&mut self) {
        self.buf.put_u8(SIMPLE_NULL);
    }

    pub fn text(&mut self, value: &str) {
        self.type_arg(MAJOR_TEXT, value.len() as u64);
        self.buf.put_slice(value.as_bytes());
    }

    pub fn array(&mut self, len: usize) {
        self.type_arg(MAJOR_ARRAY, len as u64);
    }

    pub fn property_value(&mut self, value: &PropertyValue) {
        match value {
            PropertyValue::Number(n) => self.float(*n),
            PropertyValue::Bool(b) => self.bool(*b),
            PropertyValue::Text(s) => self.text(s),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Default for CborWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor-based CBOR decoder over one complete frame.
pub struct CborReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CborReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(GatewayError::Truncated);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read one initial byte and resolve its argument.
    fn head(&mut self) -> Result<(u8, u64)> {
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1F;
        let arg = match info {
            0..=23 => info as u64,
            24 => self.byte()? as u64,
            25 => {
                let b = self.take(2)?;
                u16::from_be_bytes([b[0], b[1]]) as u64
            }
            26 => {
                let b = self.take(4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64
            }
            27 => {
                let b = self.take(8)?;
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            _ => {
                return Err(GatewayError::Protocol(format!(
                    "unsupported additional info {info} in initial byte {initial:#04x}"
                )))
            }
        };
        Ok((major, arg))
    }

    pub fn uint(&mut self) -> Result<u64> {
        match self.head()? {
            (MAJOR_UINT, arg) => Ok(arg),
            (major, _) => Err(unexpected(major, "unsigned integer")),
        }
    }

    pub fn text(&mut self) -> Result<String> {
        match self.head()? {
            (MAJOR_TEXT, len) => {
                let bytes = self.take(len as usize)?;
                std::str::from_utf8(bytes)
                    .map(str::to_string)
                    .map_err(|_| {
                        GatewayError::Protocol("text item is not valid UTF-8".to_string())
                    })
            }
            (major, _) => Err(unexpected(major, "text")),
        }
    }

    pub fn array_len(&mut self) -> Result<usize> {
        match self.head()? {
            (MAJOR_ARRAY, len) => Ok(len as usize),
            (major, _) => Err(unexpected(major, "array")),
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.byte()? {
            SIMPLE_TRUE => Ok(true),
            SIMPLE_FALSE => Ok(false),
            other => Err(GatewayError::Protocol(format!(
                "expected boolean, found initial byte {other:#04x}"
            ))),
        }
    }

    /// Decode one value item: float, boolean or text.
    pub fn property_value(&mut self) -> Result<PropertyValue> {
        match self.peek()? {
            SIMPLE_F64 => {
                self.pos += 1;
                let b = self.take(8)?;
                Ok(PropertyValue::Number(f64::from_be_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])))
            }
            SIMPLE_TRUE | SIMPLE_FALSE => Ok(PropertyValue::Bool(self.bool()?)),
            initial if initial >> 5 == MAJOR_TEXT => Ok(PropertyValue::Text(self.text()?)),
            initial => Err(GatewayError::Protocol(format!(
                "expected value item, found initial byte {initial:#04x}"
            ))),
        }
    }

    /// Decode a value item or null.
    pub fn optional_property_value(&mut self) -> Result<Option<PropertyValue>> {
        if self.peek()? == SIMPLE_NULL {
            self.pos += 1;
            return Ok(None);
        }
        self.property_value().map(Some)
    }

    pub fn is_null(&mut self) -> Result<bool> {
        if self.peek()? == SIMPLE_NULL {
            self.pos += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn peek(&self) -> Result<u8> {
        self.buf.get(self.pos).copied().ok_or(GatewayError::Truncated)
    }

    /// Assert the frame was consumed exactly. Trailing bytes mean the frame
    /// does not encode what its command id claims.
    pub fn expect_end(&self) -> Result<()> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(GatewayError::Protocol(format!(
                "{} trailing bytes after frame payload",
                self.buf.len() - self.pos
            )))
        }
    }
}

fn unexpected(major: u8, wanted: &str) -> GatewayError {
    GatewayError::Protocol(format!("expected {wanted}, found major type {major}"))
}
