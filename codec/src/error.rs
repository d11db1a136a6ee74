//! Error types for codec operations.

use std::fmt;

use wire::WireType;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while computing or applying a delta.
///
/// Every error is terminal for the call that raised it; no partially built
/// delta or partially patched buffer is ever returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An input buffer is corrupt, truncated, uses groups, or exceeds limits.
    MalformedWireFormat(wire::DecodeError),

    /// A field expected to hold an embedded message is not length-delimited.
    InvalidEmbeddedType { number: u32, found: WireType },

    /// The two messages handed to the typed API have different schemas.
    TypeMismatch { expected: String, found: String },

    /// A field delta refers to different old and new occurrence indices.
    UnsupportedIndexRemap {
        number: u32,
        index: u32,
        old_index: u32,
        new_index: u32,
    },

    /// The base has no occurrence where the delta expects one to be kept.
    MissingFieldDelta { number: u32, index: u32 },

    /// A field delta's flags and values are inconsistent.
    InvalidDelta {
        number: u32,
        index: u32,
        reason: DeltaReason,
    },

    /// Embedded messages nest deeper than the configured limit.
    DepthExceeded { limit: usize },

    /// The persisted delta record could not be decoded.
    DeltaDecode(prost::DecodeError),

    /// The patched bytes could not be decoded into the typed message.
    MessageDecode(prost::DecodeError),
}

/// Details for invalid delta errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaReason {
    /// `UNCHANGED` was applied where the base has no occurrence.
    UnchangedWithoutBase,
    /// `NEW_IS_SET_ELSEWHERE` was applied where the base has no occurrence.
    SetElsewhereWithoutBase,
    /// The new-side flag bits are not a known state.
    UnknownFlags { flags: u32 },
    /// No explicit value, default flag or nested fields describe the new side.
    NoNewValue,
    /// The field number is zero or out of range.
    InvalidFieldNumber,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedWireFormat(e) => write!(f, "malformed wire format: {e}"),
            Self::InvalidEmbeddedType { number, found } => {
                write!(
                    f,
                    "field {number} holds an embedded message but is encoded as {found}"
                )
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "message type mismatch: expected {expected}, found {found}")
            }
            Self::UnsupportedIndexRemap {
                number,
                index,
                old_index,
                new_index,
            } => {
                write!(
                    f,
                    "unsupported remap of field {number}[{index}] from {old_index} to {new_index}"
                )
            }
            Self::MissingFieldDelta { number, index } => {
                write!(
                    f,
                    "missing field delta for {number}[{index}]: base has no occurrence to keep"
                )
            }
            Self::InvalidDelta {
                number,
                index,
                reason,
            } => {
                write!(f, "invalid delta for field {number}[{index}]: {reason}")
            }
            Self::DepthExceeded { limit } => {
                write!(f, "embedded message depth exceeds limit {limit}")
            }
            Self::DeltaDecode(e) => write!(f, "delta record decode error: {e}"),
            Self::MessageDecode(e) => write!(f, "message decode error: {e}"),
        }
    }
}

impl fmt::Display for DeltaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnchangedWithoutBase => write!(f, "field can't be new and unchanged"),
            Self::SetElsewhereWithoutBase => {
                write!(f, "value is set elsewhere but the base has none")
            }
            Self::UnknownFlags { flags } => write!(f, "unknown field flags 0x{flags:X}"),
            Self::NoNewValue => write!(f, "no new value"),
            Self::InvalidFieldNumber => write!(f, "invalid field number"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedWireFormat(e) => Some(e),
            Self::DeltaDecode(e) | Self::MessageDecode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wire::DecodeError> for CodecError {
    fn from(err: wire::DecodeError) -> Self {
        Self::MalformedWireFormat(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_convert() {
        let err: CodecError = wire::DecodeError::InvalidFieldNumber { offset: 0 }.into();
        assert!(matches!(err, CodecError::MalformedWireFormat(_)));
        assert!(err.to_string().contains("malformed wire format"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn invalid_delta_display() {
        let err = CodecError::InvalidDelta {
            number: 4,
            index: 2,
            reason: DeltaReason::UnknownFlags { flags: 0x70 },
        };
        let msg = err.to_string();
        assert!(msg.contains("4[2]"));
        assert!(msg.contains("0x70"));
    }

    #[test]
    fn embedded_type_display() {
        let err = CodecError::InvalidEmbeddedType {
            number: 6,
            found: WireType::Varint,
        };
        assert!(err.to_string().contains("varint"));
    }
}
