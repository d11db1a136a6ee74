//! Field-level parsing and serialization of protobuf messages.

use std::borrow::Cow;
use std::collections::btree_map::Keys;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Copied;
use std::num::NonZeroU32;

use crate::error::{DecodeError, LimitKind, WireResult};
use crate::limits::Limits;
use crate::varint::{read_fixed32, read_fixed64, read_varint, varint_len, write_varint};

/// A protobuf field number.
///
/// Field numbers are non-zero and fit in 29 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldNumber(NonZeroU32);

impl FieldNumber {
    /// Largest field number the wire format can express.
    pub const MAX: u32 = (1 << 29) - 1;

    /// Creates a field number, returning `None` for zero or out-of-range values.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        if raw > Self::MAX {
            return None;
        }
        match NonZeroU32::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the raw field number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for FieldNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// The wire type carried in the low three bits of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    /// Parses a wire type from its three-bit tag value.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    /// Returns the three-bit tag value.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::StartGroup => "start-group",
            Self::EndGroup => "end-group",
            Self::Fixed32 => "fixed32",
        };
        write!(f, "{name}")
    }
}

/// Encodes a field number and wire type into a raw tag.
#[must_use]
pub const fn encode_tag(number: FieldNumber, wire_type: WireType) -> u64 {
    ((number.get() as u64) << 3) | wire_type.raw() as u64
}

/// Splits a raw tag read at `offset` into field number and wire type.
pub fn decode_tag(raw: u64, offset: usize) -> WireResult<(FieldNumber, WireType)> {
    if raw > u64::from(u32::MAX) {
        return Err(DecodeError::TagOverflow { offset, raw });
    }
    let number =
        FieldNumber::new((raw >> 3) as u32).ok_or(DecodeError::InvalidFieldNumber { offset })?;
    let wire_type = (raw & 0x7) as u8;
    let wire_type = WireType::from_raw(wire_type)
        .ok_or(DecodeError::InvalidWireType { offset, wire_type })?;
    Ok((number, wire_type))
}

/// One decoded occurrence of a field.
///
/// Length-delimited payloads borrow from the parsed buffer when possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(Cow<'a, [u8]>),
    Fixed32(u32),
}

impl<'a> FieldValue<'a> {
    /// Creates a length-delimited value borrowing `bytes`.
    #[must_use]
    pub const fn borrowed(bytes: &'a [u8]) -> Self {
        Self::Bytes(Cow::Borrowed(bytes))
    }

    /// Creates a length-delimited value owning `bytes`.
    #[must_use]
    pub const fn owned(bytes: Vec<u8>) -> Self {
        Self::Bytes(Cow::Owned(bytes))
    }

    /// Returns the zero value for a wire type; `None` for group types.
    #[must_use]
    pub const fn zero(wire_type: WireType) -> Option<Self> {
        match wire_type {
            WireType::Varint => Some(Self::Varint(0)),
            WireType::Fixed64 => Some(Self::Fixed64(0)),
            WireType::LengthDelimited => Some(Self::Bytes(Cow::Borrowed(&[]))),
            WireType::Fixed32 => Some(Self::Fixed32(0)),
            WireType::StartGroup | WireType::EndGroup => None,
        }
    }

    /// Returns the wire type this value is encoded with.
    #[must_use]
    pub const fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::Bytes(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }

    /// Returns `true` for the zero value of the wire type (0 or empty bytes).
    #[must_use]
    pub fn is_default(&self) -> bool {
        match self {
            Self::Varint(value) | Self::Fixed64(value) => *value == 0,
            Self::Fixed32(value) => *value == 0,
            Self::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Returns the payload of a length-delimited value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Detaches the value from the buffer it was parsed from.
    #[must_use]
    pub fn into_owned(self) -> FieldValue<'static> {
        match self {
            Self::Varint(value) => FieldValue::Varint(value),
            Self::Fixed64(value) => FieldValue::Fixed64(value),
            Self::Fixed32(value) => FieldValue::Fixed32(value),
            Self::Bytes(bytes) => FieldValue::Bytes(Cow::Owned(bytes.into_owned())),
        }
    }

    /// Returns the encoded size of the payload, excluding the tag.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Varint(value) => varint_len(*value),
            Self::Fixed64(_) => 8,
            Self::Fixed32(_) => 4,
            Self::Bytes(bytes) => varint_len(bytes.len() as u64) + bytes.len(),
        }
    }

    fn encode(&self, number: FieldNumber, out: &mut Vec<u8>) {
        write_varint(encode_tag(number, self.wire_type()), out);
        match self {
            Self::Varint(value) => write_varint(*value, out),
            Self::Fixed64(value) => out.extend_from_slice(&value.to_le_bytes()),
            Self::Fixed32(value) => out.extend_from_slice(&value.to_le_bytes()),
            Self::Bytes(bytes) => {
                write_varint(bytes.len() as u64, out);
                out.extend_from_slice(bytes);
            }
        }
    }
}

/// A message split into per-field occurrence lists.
///
/// Field numbers iterate in ascending order; each number keeps its
/// occurrences in the order they were encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage<'a> {
    fields: BTreeMap<FieldNumber, Vec<FieldValue<'a>>>,
}

impl<'a> ParsedMessage<'a> {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a wire buffer into per-field occurrence lists.
    pub fn parse(buf: &'a [u8], limits: &Limits) -> WireResult<Self> {
        if buf.len() > limits.max_message_bytes {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::MessageBytes,
                limit: limits.max_message_bytes,
                actual: buf.len(),
            });
        }

        let mut message = Self::new();
        let mut occurrences = 0usize;
        let mut offset = 0usize;

        while offset < buf.len() {
            let tag_offset = offset;
            let (raw_tag, next) = read_varint(buf, offset)?;
            offset = next;
            let (number, wire_type) = decode_tag(raw_tag, tag_offset)?;

            if occurrences >= limits.max_occurrences {
                return Err(DecodeError::LimitsExceeded {
                    kind: LimitKind::Occurrences,
                    limit: limits.max_occurrences,
                    actual: occurrences + 1,
                });
            }

            let value = match wire_type {
                WireType::Varint => {
                    let (value, next) = read_varint(buf, offset)?;
                    offset = next;
                    FieldValue::Varint(value)
                }
                WireType::Fixed64 => {
                    let (value, next) = read_fixed64(buf, offset)?;
                    offset = next;
                    FieldValue::Fixed64(value)
                }
                WireType::Fixed32 => {
                    let (value, next) = read_fixed32(buf, offset)?;
                    offset = next;
                    FieldValue::Fixed32(value)
                }
                WireType::LengthDelimited => {
                    let (length, start) = read_varint(buf, offset)?;
                    let available = buf.len() - start;
                    let len = usize::try_from(length)
                        .ok()
                        .filter(|len| *len <= available)
                        .ok_or(DecodeError::LengthOutOfBounds {
                            offset,
                            length,
                            available,
                        })?;
                    offset = start + len;
                    FieldValue::borrowed(&buf[start..offset])
                }
                WireType::StartGroup | WireType::EndGroup => {
                    return Err(DecodeError::UnsupportedGroup {
                        offset: tag_offset,
                        number: number.get(),
                    });
                }
            };

            message.push(number, value);
            occurrences += 1;
        }

        Ok(message)
    }

    /// Returns the occurrences recorded for `number` (empty when absent).
    #[must_use]
    pub fn get(&self, number: FieldNumber) -> &[FieldValue<'a>] {
        self.fields
            .get(&number)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates field numbers in ascending order.
    pub fn numbers(&self) -> Copied<Keys<'_, FieldNumber, Vec<FieldValue<'a>>>> {
        self.fields.keys().copied()
    }

    /// Iterates fields in ascending number order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldNumber, &[FieldValue<'a>])> {
        self.fields
            .iter()
            .map(|(number, values)| (*number, values.as_slice()))
    }

    /// Appends an occurrence for `number`.
    pub fn push(&mut self, number: FieldNumber, value: FieldValue<'a>) {
        self.fields.entry(number).or_default().push(value);
    }

    /// Replaces all occurrences of `number`; an empty list removes the field.
    pub fn set(&mut self, number: FieldNumber, values: Vec<FieldValue<'a>>) {
        if values.is_empty() {
            self.fields.remove(&number);
        } else {
            self.fields.insert(number, values);
        }
    }

    /// Removes and returns all occurrences of `number`.
    pub fn remove(&mut self, number: FieldNumber) -> Vec<FieldValue<'a>> {
        self.fields.remove(&number).unwrap_or_default()
    }

    /// Returns the total number of occurrences across all fields.
    #[must_use]
    pub fn occurrence_count(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// Returns `true` if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the exact size of [`encode`](Self::encode)'s output.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.iter()
            .flat_map(|(number, values)| {
                values.iter().map(move |value| {
                    varint_len(encode_tag(number, value.wire_type())) + value.payload_len()
                })
            })
            .sum()
    }

    /// Serializes the message in ascending field-number order.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Appends the serialized message to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for (number, values) in self.iter() {
            for value in values {
                value.encode(number, out);
            }
        }
    }

    /// Detaches every occurrence from the parsed buffer.
    #[must_use]
    pub fn into_owned(self) -> ParsedMessage<'static> {
        ParsedMessage {
            fields: self
                .fields
                .into_iter()
                .map(|(number, values)| {
                    (
                        number,
                        values.into_iter().map(FieldValue::into_owned).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl<'a> FromIterator<(FieldNumber, FieldValue<'a>)> for ParsedMessage<'a> {
    fn from_iter<I: IntoIterator<Item = (FieldNumber, FieldValue<'a>)>>(iter: I) -> Self {
        let mut message = Self::new();
        for (number, value) in iter {
            message.push(number, value);
        }
        message
    }
}

/// Re-encodes `buf` with fields in ascending number order.
///
/// Two buffers holding the same fields and per-field occurrence order
/// canonicalize to identical bytes regardless of the encoder that produced
/// them.
pub fn canonicalize(buf: &[u8], limits: &Limits) -> WireResult<Vec<u8>> {
    Ok(ParsedMessage::parse(buf, limits)?.encode())
}
