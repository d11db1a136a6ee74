//! Typed entry points over `prost` messages.

use prost::Message;
use schema::{DescriptorRef, ExtensionRegistry};

use crate::apply::apply_delta;
use crate::diff::{compute_delta_with_strategy, EncodingStrategy};
use crate::error::{CodecError, CodecResult};
use crate::limits::CodecLimits;
use crate::types::MessageDelta;

/// A `prost` message that can describe its own schema.
pub trait SchemaMessage: Message {
    /// Returns the descriptor of this message's type.
    fn message_descriptor(&self) -> DescriptorRef;
}

/// Computes the delta between two messages of the same type.
///
/// Both messages are serialized and canonicalized first, so the result does
/// not depend on field emission order. Fails with
/// [`CodecError::TypeMismatch`] when the full names differ.
pub fn get_delta<A, B>(
    old: &A,
    new: &B,
    extensions: &ExtensionRegistry,
    limits: &CodecLimits,
) -> CodecResult<Option<MessageDelta>>
where
    A: SchemaMessage,
    B: SchemaMessage,
{
    get_delta_with_strategy(old, new, extensions, limits, EncodingStrategy::Smallest)
}

/// [`get_delta`] with an explicit encoding strategy.
pub fn get_delta_with_strategy<A, B>(
    old: &A,
    new: &B,
    extensions: &ExtensionRegistry,
    limits: &CodecLimits,
    strategy: EncodingStrategy,
) -> CodecResult<Option<MessageDelta>>
where
    A: SchemaMessage,
    B: SchemaMessage,
{
    let descriptor = old.message_descriptor();
    let other = new.message_descriptor();
    if descriptor.full_name() != other.full_name() {
        return Err(CodecError::TypeMismatch {
            expected: descriptor.full_name().to_owned(),
            found: other.full_name().to_owned(),
        });
    }
    let old_bytes = canonical_bytes(old, limits)?;
    let new_bytes = canonical_bytes(new, limits)?;
    compute_delta_with_strategy(
        &old_bytes,
        &new_bytes,
        descriptor.as_ref(),
        extensions,
        limits,
        strategy,
    )
}

/// Applies `delta` to `base` and decodes the result as `M`.
pub fn apply_message_delta<M>(
    base: &M,
    delta: &MessageDelta,
    limits: &CodecLimits,
) -> CodecResult<M>
where
    M: SchemaMessage + Default,
{
    let base_bytes = canonical_bytes(base, limits)?;
    let patched = apply_delta(&base_bytes, delta, limits)?;
    M::decode(patched.as_slice()).map_err(CodecError::MessageDecode)
}

fn canonical_bytes<M: Message>(message: &M, limits: &CodecLimits) -> CodecResult<Vec<u8>> {
    Ok(wire::canonicalize(&message.encode_to_vec(), &limits.wire)?)
}
