//! Limits for delta computation and application.

use wire::Limits as WireLimits;

/// Codec-specific limits enforced while diffing and patching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecLimits {
    /// Maximum embedded-message nesting depth the engine will recurse into.
    pub max_depth: usize,
    /// Limits applied to every buffer the engine parses.
    pub wire: WireLimits,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            // Same ceiling protobuf runtimes use for recursive decoding
            max_depth: 100,
            wire: WireLimits::default(),
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_depth: 16,
            wire: WireLimits::for_testing(),
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            wire: WireLimits::unlimited(),
        }
    }
}
