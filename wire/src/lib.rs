//! Protobuf wire format parsing and serialization for pbdelta.
//!
//! This crate splits an encoded message into per-field occurrence lists and
//! reassembles such lists into bytes. It knows nothing about schemas or
//! deltas: only tags, wire types and payloads.
//!
//! # Design Principles
//!
//! - **Bounded decoding** - Buffer sizes and occurrence counts are checked against [`Limits`].
//! - **Zero-copy parsing** - Length-delimited payloads borrow from the input buffer.
//! - **Canonical output** - Fields serialize in ascending number order.
//! - **No groups** - The deprecated group encoding is rejected, not skipped.

mod error;
mod limits;
mod message;
mod varint;

pub use error::{DecodeError, LimitKind, WireResult};
pub use limits::Limits;
pub use message::{
    canonicalize, decode_tag, encode_tag, FieldNumber, FieldValue, ParsedMessage, WireType,
};
pub use varint::{read_fixed32, read_fixed64, read_varint, varint_len, write_varint, MAX_VARINT_LEN};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        // Verify all expected items are exported
        let _ = Limits::default();
        let _ = FieldNumber::new(1);
        let _ = WireType::Varint;
        let _ = ParsedMessage::new();
        let _ = MAX_VARINT_LEN;

        // Error types
        let _: WireResult<()> = Ok(());
    }

    #[test]
    fn limits_default_is_reasonable() {
        let limits = Limits::default();
        assert!(
            limits.max_message_bytes >= 1024 * 1024,
            "should allow at least 1MB messages"
        );
        assert!(limits.max_occurrences >= 1024);
    }

    #[test]
    fn tag_roundtrip() {
        let number = FieldNumber::new(19_000).unwrap();
        let raw = encode_tag(number, WireType::Fixed32);
        assert_eq!(decode_tag(raw, 0).unwrap(), (number, WireType::Fixed32));
    }
}
