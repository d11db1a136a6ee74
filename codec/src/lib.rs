//! Protobuf message delta computation and application for pbdelta.
//!
//! This is the main crate that ties together wire and schema to compute the
//! difference between two encodings of one message type and to patch a base
//! encoding with such a difference.
//!
//! # Features
//!
//! - Field-level deltas aligned by field number and occurrence position
//! - Recursive diffing of embedded messages, including extension fields
//! - Whole-buffer fallback when it encodes smaller
//! - Delta records that are themselves protobuf messages
//! - Typed entry points over `prost` messages
//!
//! # Design Principles
//!
//! - **Correctness first** - Applying `compute(a, b)` to `a` yields the canonical encoding of `b`.
//! - **Schema-light** - Only embedded-message field numbers are consulted.
//! - **Deterministic** - Same inputs produce byte-identical deltas.

mod apply;
mod diff;
mod error;
mod limits;
mod typed;
mod types;

pub use apply::{apply_delta, apply_field_delta};
pub use diff::{compute_delta, compute_delta_with_strategy, whole_buffer_len, EncodingStrategy};
pub use error::{CodecError, CodecResult, DeltaReason};
pub use limits::CodecLimits;
pub use typed::{apply_message_delta, get_delta, get_delta_with_strategy, SchemaMessage};
pub use types::{
    decode_delta, encode_delta, DeltaKind, FieldDelta, FieldFlags, MessageDelta, MessageFlags,
    ValueState,
};
pub use wire::Limits as WireLimits;
