//! Configurable limits for bounded decoding.

/// Wire-level limits for message parsing.
///
/// These limits are enforced while parsing untrusted buffers so a single
/// malformed input cannot force unbounded allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single message buffer in bytes.
    pub max_message_bytes: usize,

    /// Maximum number of field occurrences in a single message buffer.
    pub max_occurrences: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // Matches the conventional 64 MiB protobuf message ceiling
            max_message_bytes: 64 * 1024 * 1024,
            max_occurrences: 1 << 20,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_message_bytes: 4096,
            max_occurrences: 256,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_message_bytes: usize::MAX,
            max_occurrences: usize::MAX,
        }
    }
}
