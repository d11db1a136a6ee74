//! Error types for wire format operations.

use std::fmt;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding a protobuf wire buffer.
///
/// Every variant means the input is malformed or outside the configured
/// limits; none of them are transient.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// A varint ran past the end of the buffer.
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A varint was longer than ten bytes or overflowed 64 bits.
    InvalidVarint { offset: usize },

    /// The raw tag value does not fit the 32-bit tag space.
    TagOverflow { offset: usize, raw: u64 },

    /// The tag carried field number zero.
    InvalidFieldNumber { offset: usize },

    /// The tag carried wire type 6 or 7.
    InvalidWireType { offset: usize, wire_type: u8 },

    /// A start-group or end-group tag was encountered.
    UnsupportedGroup { offset: usize, number: u32 },

    /// A length prefix points past the end of the buffer.
    LengthOutOfBounds {
        offset: usize,
        length: u64,
        available: usize,
    },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    MessageBytes,
    Occurrences,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                offset,
                needed,
                available,
            } => {
                write!(
                    f,
                    "truncated input at offset {offset}: need {needed} bytes, have {available}"
                )
            }
            Self::InvalidVarint { offset } => write!(f, "invalid varint at offset {offset}"),
            Self::TagOverflow { offset, raw } => {
                write!(f, "tag 0x{raw:X} at offset {offset} exceeds 32 bits")
            }
            Self::InvalidFieldNumber { offset } => {
                write!(f, "field number zero at offset {offset}")
            }
            Self::InvalidWireType { offset, wire_type } => {
                write!(f, "invalid wire type {wire_type} at offset {offset}")
            }
            Self::UnsupportedGroup { offset, number } => {
                write!(
                    f,
                    "group encoding for field {number} at offset {offset} is unsupported"
                )
            }
            Self::LengthOutOfBounds {
                offset,
                length,
                available,
            } => {
                write!(
                    f,
                    "length {length} at offset {offset} exceeds remaining {available} bytes"
                )
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MessageBytes => "message bytes",
            Self::Occurrences => "field occurrences",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display_tag_overflow() {
        let err = DecodeError::TagOverflow {
            offset: 3,
            raw: 0x1_0000_0000,
        };
        let msg = err.to_string();
        assert!(msg.contains("100000000"));
        assert!(msg.contains("offset 3"));
    }

    #[test]
    fn decode_error_display_limits_exceeded() {
        let err = DecodeError::LimitsExceeded {
            kind: LimitKind::Occurrences,
            limit: 4,
            actual: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("field occurrences"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn group_display_names_field() {
        let err = DecodeError::UnsupportedGroup {
            offset: 0,
            number: 7,
        };
        assert!(err.to_string().contains("field 7"));
    }
}
