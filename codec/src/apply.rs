//! Delta application.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use wire::{FieldNumber, FieldValue, ParsedMessage};

use crate::diff::index_u32;
use crate::error::{CodecError, CodecResult, DeltaReason};
use crate::limits::CodecLimits;
use crate::types::{FieldDelta, MessageDelta, MessageFlags, ValueState};

/// Applies `delta` to `base`, producing the canonical encoding of the target.
///
/// Occurrences the delta does not mention are carried over from `base`.
pub fn apply_delta(
    base: &[u8],
    delta: &MessageDelta,
    limits: &CodecLimits,
) -> CodecResult<Vec<u8>> {
    let out = apply_message(
        base,
        delta.message_flags(),
        &delta.new_bytes,
        &delta.fields,
        limits,
        0,
    )?;
    debug!(
        base_len = base.len(),
        fields = delta.fields.len(),
        out_len = out.len(),
        "applied delta"
    );
    Ok(out)
}

/// Applies one field delta to the matching base occurrence.
///
/// Returns `Ok(None)` when the occurrence is removed.
pub fn apply_field_delta<'a>(
    base: Option<&FieldValue<'a>>,
    delta: &'a FieldDelta,
    limits: &CodecLimits,
) -> CodecResult<Option<FieldValue<'a>>> {
    apply_field(base, delta, limits, 0)
}

fn apply_message(
    base: &[u8],
    flags: MessageFlags,
    new_bytes: &[u8],
    fields: &[FieldDelta],
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<Vec<u8>> {
    if flags.is_new_empty() {
        return Ok(Vec::new());
    }
    if !new_bytes.is_empty() {
        return Ok(new_bytes.to_vec());
    }
    apply_fields(base, fields, limits, depth)
}

fn apply_fields(
    base: &[u8],
    fields: &[FieldDelta],
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<Vec<u8>> {
    if depth >= limits.max_depth {
        return Err(CodecError::DepthExceeded {
            limit: limits.max_depth,
        });
    }
    let parsed = ParsedMessage::parse(base, &limits.wire)?;

    // Later entries for the same occurrence replace earlier ones.
    let mut grouped: BTreeMap<FieldNumber, BTreeMap<u32, &FieldDelta>> = BTreeMap::new();
    for field in fields {
        if field.old_index != field.new_index {
            return Err(CodecError::UnsupportedIndexRemap {
                number: field.number,
                index: field.index,
                old_index: field.old_index,
                new_index: field.new_index,
            });
        }
        let number = FieldNumber::new(field.number).ok_or(CodecError::InvalidDelta {
            number: field.number,
            index: field.index,
            reason: DeltaReason::InvalidFieldNumber,
        })?;
        grouped.entry(number).or_default().insert(field.index, field);
    }

    let numbers: BTreeSet<FieldNumber> =
        parsed.numbers().chain(grouped.keys().copied()).collect();
    let mut out = ParsedMessage::new();
    for number in numbers {
        let base_values = parsed.get(number);
        let deltas = grouped.get(&number);
        let delta_count = deltas
            .and_then(|d| d.keys().next_back())
            .map_or(0, |&last| last as usize + 1);

        let mut values = Vec::with_capacity(base_values.len());
        for index in 0..base_values.len().max(delta_count) {
            let base_value = base_values.get(index);
            let Some(delta) = deltas.and_then(|d| d.get(&index_u32(index))) else {
                let value = base_value.ok_or(CodecError::MissingFieldDelta {
                    number: number.get(),
                    index: index_u32(index),
                })?;
                values.push(value.clone());
                continue;
            };
            if let Some(value) = apply_field(base_value, delta, limits, depth)? {
                values.push(value);
            }
        }
        out.set(number, values);
    }
    Ok(out.encode())
}

fn apply_field<'a>(
    base: Option<&FieldValue<'a>>,
    delta: &'a FieldDelta,
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<Option<FieldValue<'a>>> {
    let invalid = |reason| CodecError::InvalidDelta {
        number: delta.number,
        index: delta.index,
        reason,
    };
    let flags = delta.field_flags();
    if flags.is_unchanged() {
        return base
            .cloned()
            .map(Some)
            .ok_or_else(|| invalid(DeltaReason::UnchangedWithoutBase));
    }

    match flags.new_state() {
        None => {
            return Err(invalid(DeltaReason::UnknownFlags { flags: flags.raw() }));
        }
        Some(ValueState::NotSet) => return Ok(None),
        Some(ValueState::SetElsewhere) => {
            return base
                .cloned()
                .map(Some)
                .ok_or_else(|| invalid(DeltaReason::SetElsewhereWithoutBase));
        }
        Some(
            state @ (ValueState::EmptyBytes
            | ValueState::DefaultVarint
            | ValueState::DefaultFixed32
            | ValueState::DefaultFixed64),
        ) => return Ok(state.zero_value()),
        Some(ValueState::Explicit) => {}
    }

    if let Some(value) = delta.explicit_new_value() {
        return Ok(Some(value));
    }
    if !delta.fields.is_empty() {
        let base_bytes: &[u8] = match base {
            None => &[],
            Some(value) => value.as_bytes().ok_or(CodecError::InvalidEmbeddedType {
                number: delta.number,
                found: value.wire_type(),
            })?,
        };
        let nested = apply_fields(base_bytes, &delta.fields, limits, depth + 1)?;
        return Ok(Some(FieldValue::owned(nested)));
    }
    Err(invalid(DeltaReason::NoNewValue))
}
