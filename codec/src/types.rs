//! Delta record types and their flag encodings.
//!
//! [`MessageDelta`] and [`FieldDelta`] are plain protobuf messages (see
//! `proto/delta.proto`), so a delta can be persisted and exchanged with any
//! protobuf runtime.

use prost::Message;
use wire::{FieldNumber, FieldValue, WireType};

use crate::error::{CodecError, CodecResult};

/// State of one side (old or new) of a field occurrence.
///
/// `Explicit` means the value is carried in the record's value slots; every
/// other state is carried by the flag bits alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueState {
    Explicit,
    NotSet,
    EmptyBytes,
    DefaultVarint,
    DefaultFixed32,
    DefaultFixed64,
    /// Only meaningful on the new side.
    SetElsewhere,
}

impl ValueState {
    const fn code(self) -> u32 {
        match self {
            Self::Explicit => 0,
            Self::NotSet => 1,
            Self::EmptyBytes => 2,
            Self::DefaultVarint => 3,
            Self::DefaultFixed32 => 4,
            Self::DefaultFixed64 => 5,
            Self::SetElsewhere => 6,
        }
    }

    const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Explicit),
            1 => Some(Self::NotSet),
            2 => Some(Self::EmptyBytes),
            3 => Some(Self::DefaultVarint),
            4 => Some(Self::DefaultFixed32),
            5 => Some(Self::DefaultFixed64),
            6 => Some(Self::SetElsewhere),
            _ => None,
        }
    }

    /// Returns the default state describing the zero value of `wire_type`.
    #[must_use]
    pub const fn default_for(wire_type: WireType) -> Option<Self> {
        match wire_type {
            WireType::Varint => Some(Self::DefaultVarint),
            WireType::Fixed64 => Some(Self::DefaultFixed64),
            WireType::LengthDelimited => Some(Self::EmptyBytes),
            WireType::Fixed32 => Some(Self::DefaultFixed32),
            WireType::StartGroup | WireType::EndGroup => None,
        }
    }

    /// Returns the zero value a default state stands for.
    #[must_use]
    pub const fn zero_value(self) -> Option<FieldValue<'static>> {
        match self {
            Self::EmptyBytes => FieldValue::zero(WireType::LengthDelimited),
            Self::DefaultVarint => FieldValue::zero(WireType::Varint),
            Self::DefaultFixed32 => FieldValue::zero(WireType::Fixed32),
            Self::DefaultFixed64 => FieldValue::zero(WireType::Fixed64),
            Self::Explicit | Self::NotSet | Self::SetElsewhere => None,
        }
    }
}

/// Flags carried by a [`FieldDelta`].
///
/// The low nibble holds the old side's [`ValueState`], the high nibble the
/// new side's. A value of zero means both sides are explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldFlags(u32);

impl FieldFlags {
    /// Mask selecting the old side's state.
    pub const OLD_MASK: u32 = 0x0F;
    /// Mask selecting the new side's state.
    pub const NEW_MASK: u32 = 0xF0;

    pub const OLD_IS_NOT_SET: u32 = 0x01;
    pub const OLD_IS_EMPTY_BYTES: u32 = 0x02;
    pub const OLD_IS_DEFAULT_VARINT: u32 = 0x03;
    pub const OLD_IS_DEFAULT_FIXED32: u32 = 0x04;
    pub const OLD_IS_DEFAULT_FIXED64: u32 = 0x05;

    pub const NEW_IS_NOT_SET: u32 = 0x10;
    pub const NEW_IS_EMPTY_BYTES: u32 = 0x20;
    pub const NEW_IS_DEFAULT_VARINT: u32 = 0x30;
    pub const NEW_IS_DEFAULT_FIXED32: u32 = 0x40;
    pub const NEW_IS_DEFAULT_FIXED64: u32 = 0x50;
    pub const NEW_IS_SET_ELSEWHERE: u32 = 0x60;

    /// The occurrence keeps its base value.
    pub const UNCHANGED: u32 = 0x100;

    /// Creates new flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if the flags are exactly [`Self::UNCHANGED`].
    ///
    /// Any other bit set alongside it falls through to the side states.
    #[must_use]
    pub const fn is_unchanged(self) -> bool {
        self.0 == Self::UNCHANGED
    }

    /// Decodes the old side's state; `None` for unknown codes.
    #[must_use]
    pub const fn old_state(self) -> Option<ValueState> {
        match ValueState::from_code(self.0 & Self::OLD_MASK) {
            Some(ValueState::SetElsewhere) => None,
            state => state,
        }
    }

    /// Decodes the new side's state; `None` for unknown codes.
    #[must_use]
    pub const fn new_state(self) -> Option<ValueState> {
        ValueState::from_code((self.0 & Self::NEW_MASK) >> 4)
    }

    /// Returns these flags with the old side replaced by `state`.
    #[must_use]
    pub const fn with_old(self, state: ValueState) -> Self {
        Self((self.0 & !Self::OLD_MASK) | state.code())
    }

    /// Returns these flags with the new side replaced by `state`.
    #[must_use]
    pub const fn with_new(self, state: ValueState) -> Self {
        Self((self.0 & !Self::NEW_MASK) | (state.code() << 4))
    }
}

/// Flags carried by a [`MessageDelta`].
///
/// The codes coincide with the matching [`FieldFlags`] codes so a nested
/// message delta folds into its parent field delta unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageFlags(u32);

impl MessageFlags {
    /// The base message was empty.
    pub const OLD_IS_EMPTY_BYTES: u32 = FieldFlags::OLD_IS_EMPTY_BYTES;
    /// The target message is empty.
    pub const NEW_IS_EMPTY_BYTES: u32 = FieldFlags::NEW_IS_EMPTY_BYTES;

    /// Creates new flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if the base message was empty.
    #[must_use]
    pub const fn is_old_empty(self) -> bool {
        self.0 & FieldFlags::OLD_MASK == Self::OLD_IS_EMPTY_BYTES
    }

    /// Returns `true` if the target message is empty.
    #[must_use]
    pub const fn is_new_empty(self) -> bool {
        self.0 & FieldFlags::NEW_MASK == Self::NEW_IS_EMPTY_BYTES
    }
}

/// How a [`MessageDelta`] describes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    /// The target is empty; `old_bytes` records the base.
    NewIsEmpty,
    /// The base was empty; `new_bytes` is the whole target.
    OldIsEmpty,
    /// Both buffers are carried whole.
    WholeBuffer,
    /// Per-field deltas against the base.
    FieldLevel,
}

/// The difference between two encodings of the same message type.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageDelta {
    /// See [`MessageFlags`].
    #[prost(uint32, tag = "1")]
    pub flags: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub old_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub new_bytes: Vec<u8>,
    /// Sorted by `(number, index, old_index, new_index)`.
    #[prost(message, repeated, tag = "4")]
    pub fields: Vec<FieldDelta>,
}

impl MessageDelta {
    /// A delta whose target is the empty message.
    #[must_use]
    pub fn new_is_empty(old_bytes: Vec<u8>) -> Self {
        Self {
            flags: MessageFlags::NEW_IS_EMPTY_BYTES,
            old_bytes,
            ..Self::default()
        }
    }

    /// A delta from the empty message to `new_bytes`.
    #[must_use]
    pub fn old_is_empty(new_bytes: Vec<u8>) -> Self {
        Self {
            flags: MessageFlags::OLD_IS_EMPTY_BYTES,
            new_bytes,
            ..Self::default()
        }
    }

    /// A delta carrying both buffers whole.
    #[must_use]
    pub fn whole_buffer(old_bytes: Vec<u8>, new_bytes: Vec<u8>) -> Self {
        Self {
            old_bytes,
            new_bytes,
            ..Self::default()
        }
    }

    /// A field-level delta.
    #[must_use]
    pub fn field_level(fields: Vec<FieldDelta>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Returns the message flags.
    #[must_use]
    pub const fn message_flags(&self) -> MessageFlags {
        MessageFlags::from_raw(self.flags)
    }

    /// Classifies how this delta describes its target.
    #[must_use]
    pub fn kind(&self) -> DeltaKind {
        let flags = self.message_flags();
        if flags.is_new_empty() {
            DeltaKind::NewIsEmpty
        } else if !self.new_bytes.is_empty() && flags.is_old_empty() {
            DeltaKind::OldIsEmpty
        } else if !self.new_bytes.is_empty() {
            DeltaKind::WholeBuffer
        } else {
            DeltaKind::FieldLevel
        }
    }
}

/// The change to one occurrence of one field.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldDelta {
    #[prost(uint32, tag = "1")]
    pub number: u32,
    /// Occurrence position among fields with this number.
    #[prost(uint32, tag = "2")]
    pub index: u32,
    /// Always equal to `new_index`; remapping is not supported.
    #[prost(uint32, tag = "3")]
    pub old_index: u32,
    #[prost(uint32, tag = "4")]
    pub new_index: u32,
    /// See [`FieldFlags`].
    #[prost(uint32, tag = "5")]
    pub flags: u32,
    #[prost(bytes = "vec", tag = "6")]
    pub old_bytes: Vec<u8>,
    #[prost(uint64, tag = "7")]
    pub old_varint: u64,
    #[prost(fixed32, tag = "8")]
    pub old_fixed32: u32,
    #[prost(fixed64, tag = "9")]
    pub old_fixed64: u64,
    #[prost(bytes = "vec", tag = "10")]
    pub new_bytes: Vec<u8>,
    #[prost(uint64, tag = "11")]
    pub new_varint: u64,
    #[prost(fixed32, tag = "12")]
    pub new_fixed32: u32,
    #[prost(fixed64, tag = "13")]
    pub new_fixed64: u64,
    /// Nested deltas when the field holds an embedded message.
    #[prost(message, repeated, tag = "14")]
    pub fields: Vec<FieldDelta>,
}

impl FieldDelta {
    /// Creates an empty delta for occurrence `index` of `number`.
    #[must_use]
    pub fn at(number: FieldNumber, index: u32) -> Self {
        Self {
            number: number.get(),
            index,
            ..Self::default()
        }
    }

    /// Returns the field flags.
    #[must_use]
    pub const fn field_flags(&self) -> FieldFlags {
        FieldFlags::from_raw(self.flags)
    }

    /// Records the old value, as a default flag when it is the zero value.
    pub fn set_old(&mut self, value: &FieldValue<'_>) {
        if value.is_default() {
            if let Some(state) = ValueState::default_for(value.wire_type()) {
                self.set_old_state(state);
            }
            return;
        }
        match value {
            FieldValue::Varint(v) => self.old_varint = *v,
            FieldValue::Fixed64(v) => self.old_fixed64 = *v,
            FieldValue::Fixed32(v) => self.old_fixed32 = *v,
            FieldValue::Bytes(bytes) => self.old_bytes = bytes.to_vec(),
        }
    }

    /// Records the new value, as a default flag when it is the zero value.
    pub fn set_new(&mut self, value: &FieldValue<'_>) {
        if value.is_default() {
            if let Some(state) = ValueState::default_for(value.wire_type()) {
                self.set_new_state(state);
            }
            return;
        }
        match value {
            FieldValue::Varint(v) => self.new_varint = *v,
            FieldValue::Fixed64(v) => self.new_fixed64 = *v,
            FieldValue::Fixed32(v) => self.new_fixed32 = *v,
            FieldValue::Bytes(bytes) => self.new_bytes = bytes.to_vec(),
        }
    }

    /// Replaces the old side's flag state.
    pub fn set_old_state(&mut self, state: ValueState) {
        self.flags = self.field_flags().with_old(state).raw();
    }

    /// Replaces the new side's flag state.
    pub fn set_new_state(&mut self, state: ValueState) {
        self.flags = self.field_flags().with_new(state).raw();
    }

    /// Takes over a nested message delta's flags, buffers and fields.
    pub fn absorb(&mut self, nested: MessageDelta) {
        self.flags = nested.flags;
        self.old_bytes = nested.old_bytes;
        self.new_bytes = nested.new_bytes;
        self.fields = nested.fields;
    }

    /// Returns the explicit new value, checking bytes, varint, fixed32 and
    /// fixed64 slots in that order.
    #[must_use]
    pub fn explicit_new_value(&self) -> Option<FieldValue<'_>> {
        explicit_value(
            &self.new_bytes,
            self.new_varint,
            self.new_fixed32,
            self.new_fixed64,
        )
    }

    /// Returns the explicit old value, using the same slot order as
    /// [`explicit_new_value`](Self::explicit_new_value).
    #[must_use]
    pub fn explicit_old_value(&self) -> Option<FieldValue<'_>> {
        explicit_value(
            &self.old_bytes,
            self.old_varint,
            self.old_fixed32,
            self.old_fixed64,
        )
    }
}

fn explicit_value(bytes: &[u8], varint: u64, fixed32: u32, fixed64: u64) -> Option<FieldValue<'_>> {
    if !bytes.is_empty() {
        Some(FieldValue::borrowed(bytes))
    } else if varint != 0 {
        Some(FieldValue::Varint(varint))
    } else if fixed32 != 0 {
        Some(FieldValue::Fixed32(fixed32))
    } else if fixed64 != 0 {
        Some(FieldValue::Fixed64(fixed64))
    } else {
        None
    }
}

/// Serializes a delta record as a protobuf message.
#[must_use]
pub fn encode_delta(delta: &MessageDelta) -> Vec<u8> {
    delta.encode_to_vec()
}

/// Parses a delta record previously produced by [`encode_delta`].
pub fn decode_delta(bytes: &[u8]) -> CodecResult<MessageDelta> {
    MessageDelta::decode(bytes).map_err(CodecError::DeltaDecode)
}
