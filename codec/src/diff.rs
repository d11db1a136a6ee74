//! Delta computation between two encodings of one message type.

use std::collections::BTreeSet;

use prost::Message;
use schema::{ExtensionRegistry, MessageDescriptor};
use tracing::{debug, trace};
use wire::{varint_len, FieldNumber, FieldValue, ParsedMessage};

use crate::error::{CodecError, CodecResult};
use crate::limits::CodecLimits;
use crate::types::{FieldDelta, MessageDelta, ValueState};

/// Which representation [`compute_delta_with_strategy`] returns when a
/// field-level delta exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncodingStrategy {
    /// Pick whichever of field-level and whole-buffer encodes smaller.
    #[default]
    Smallest,
    /// Always return the field-level form.
    FieldLevel,
}

/// Computes the delta that turns `old` into `new`.
///
/// Returns `Ok(None)` when the buffers are byte-identical or differ in no
/// field occurrence. Fields whose number resolves to an embedded message,
/// through `descriptor` or a registered extension, are diffed recursively.
pub fn compute_delta(
    old: &[u8],
    new: &[u8],
    descriptor: &dyn MessageDescriptor,
    extensions: &ExtensionRegistry,
    limits: &CodecLimits,
) -> CodecResult<Option<MessageDelta>> {
    compute_delta_with_strategy(
        old,
        new,
        descriptor,
        extensions,
        limits,
        EncodingStrategy::Smallest,
    )
}

/// Computes a delta with an explicit encoding strategy.
///
/// The strategy applies at every nesting level. Empty-buffer special cases
/// are used regardless of strategy.
pub fn compute_delta_with_strategy(
    old: &[u8],
    new: &[u8],
    descriptor: &dyn MessageDescriptor,
    extensions: &ExtensionRegistry,
    limits: &CodecLimits,
    strategy: EncodingStrategy,
) -> CodecResult<Option<MessageDelta>> {
    let differ = Differ {
        extensions,
        limits,
        strategy,
    };
    let delta = differ.message(old, new, descriptor, 0)?;
    debug!(
        message = descriptor.full_name(),
        old_len = old.len(),
        new_len = new.len(),
        delta_len = delta.as_ref().map_or(0, Message::encoded_len),
        "computed delta"
    );
    Ok(delta)
}

struct Differ<'r> {
    extensions: &'r ExtensionRegistry,
    limits: &'r CodecLimits,
    strategy: EncodingStrategy,
}

impl Differ<'_> {
    fn message(
        &self,
        old: &[u8],
        new: &[u8],
        descriptor: &dyn MessageDescriptor,
        depth: usize,
    ) -> CodecResult<Option<MessageDelta>> {
        if old == new {
            return Ok(None);
        }
        if new.is_empty() {
            return Ok(Some(MessageDelta::new_is_empty(old.to_vec())));
        }
        if old.is_empty() {
            return Ok(Some(MessageDelta::old_is_empty(new.to_vec())));
        }
        if depth >= self.limits.max_depth {
            return Err(CodecError::DepthExceeded {
                limit: self.limits.max_depth,
            });
        }

        let old_fields = ParsedMessage::parse(old, &self.limits.wire)?;
        let new_fields = ParsedMessage::parse(new, &self.limits.wire)?;
        let numbers: BTreeSet<FieldNumber> =
            old_fields.numbers().chain(new_fields.numbers()).collect();

        let mut fields = Vec::new();
        for number in numbers {
            let olds = old_fields.get(number);
            let news = new_fields.get(number);
            for index in 0..olds.len().max(news.len()) {
                let field = self.occurrence(
                    number,
                    index,
                    olds.get(index),
                    news.get(index),
                    descriptor,
                    depth,
                )?;
                fields.extend(field);
            }
        }
        if fields.is_empty() {
            return Ok(None);
        }
        fields.sort_by_key(|f| (f.number, f.index, f.old_index, f.new_index));

        let field_level = MessageDelta::field_level(fields);
        let field_len = field_level.encoded_len();
        let whole_len = whole_buffer_len(old.len(), new.len());
        trace!(
            depth,
            message = descriptor.full_name(),
            field_len,
            whole_len,
            "compared delta encodings"
        );
        if self.strategy == EncodingStrategy::FieldLevel || field_len < whole_len {
            Ok(Some(field_level))
        } else {
            Ok(Some(MessageDelta::whole_buffer(old.to_vec(), new.to_vec())))
        }
    }

    fn occurrence(
        &self,
        number: FieldNumber,
        index: usize,
        old: Option<&FieldValue<'_>>,
        new: Option<&FieldValue<'_>>,
        descriptor: &dyn MessageDescriptor,
        depth: usize,
    ) -> CodecResult<Option<FieldDelta>> {
        let mut field = FieldDelta::at(number, index_u32(index));
        match (old, new) {
            (None, None) => return Ok(None),
            (None, Some(new)) => {
                field.set_old_state(ValueState::NotSet);
                field.set_new(new);
            }
            (Some(old), None) => {
                field.set_old(old);
                field.set_new_state(ValueState::NotSet);
            }
            (Some(old), Some(new)) if old == new => return Ok(None),
            (Some(old), Some(new)) => {
                let Some(embedded) = self.extensions.resolve_embedded(descriptor, number) else {
                    field.set_old(old);
                    field.set_new(new);
                    return Ok(Some(field));
                };
                let (Some(old_bytes), Some(new_bytes)) = (old.as_bytes(), new.as_bytes()) else {
                    let found = if old.as_bytes().is_none() {
                        old.wire_type()
                    } else {
                        new.wire_type()
                    };
                    return Err(CodecError::InvalidEmbeddedType {
                        number: number.get(),
                        found,
                    });
                };
                match self.message(old_bytes, new_bytes, embedded.as_ref(), depth + 1)? {
                    Some(nested) => field.absorb(nested),
                    None => return Ok(None),
                }
            }
        }
        Ok(Some(field))
    }
}

/// Encoded size of a delta carrying `old_len` and `new_len` bytes whole.
///
/// Two tag bytes, two length prefixes and the payloads.
#[must_use]
pub const fn whole_buffer_len(old_len: usize, new_len: usize) -> usize {
    2 + varint_len(old_len as u64) + varint_len(new_len as u64) + old_len + new_len
}

pub(crate) fn index_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
