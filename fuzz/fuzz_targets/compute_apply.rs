#![no_main]

use codec::{apply_delta, compute_delta_with_strategy, CodecLimits, EncodingStrategy};
use libfuzzer_sys::fuzz_target;
use schema::{ExtensionRegistry, FieldDef, MessageDef, SchemaPool};
use wire::{canonicalize, FieldValue, Limits, ParsedMessage};

/// Canonical form of a `fuzz.Node`, including every parseable child.
fn normalize(bytes: &[u8], limits: &Limits) -> Vec<u8> {
    let Ok(parsed) = ParsedMessage::parse(bytes, limits) else {
        return bytes.to_vec();
    };
    let mut out = ParsedMessage::new();
    for (number, values) in parsed.iter() {
        let values = values
            .iter()
            .map(|value| match value.as_bytes() {
                Some(child) if matches!(number.get(), 1 | 2) => {
                    FieldValue::owned(normalize(child, limits))
                }
                _ => value.clone().into_owned(),
            })
            .collect();
        out.set(number, values);
    }
    out.encode()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = (data[0] as usize).min(data.len() - 1) + 1;
    let (old, new) = data[1..].split_at(split - 1);

    let limits = CodecLimits::for_testing();
    let (Ok(old), Ok(new)) = (canonicalize(old, &limits.wire), canonicalize(new, &limits.wire))
    else {
        return;
    };

    // Fields 1 and 2 recurse into the same type, so any nested bytes are tried.
    let pool = SchemaPool::builder()
        .message(
            MessageDef::new("fuzz.Node")
                .field(FieldDef::message(1, "left", "fuzz.Node"))
                .field(FieldDef::message(2, "right", "fuzz.Node")),
        )
        .build()
        .unwrap();
    let descriptor = pool.descriptor("fuzz.Node").unwrap();

    for strategy in [EncodingStrategy::Smallest, EncodingStrategy::FieldLevel] {
        let Ok(delta) = compute_delta_with_strategy(
            &old,
            &new,
            descriptor.as_ref(),
            &ExtensionRegistry::empty(),
            &limits,
            strategy,
        ) else {
            continue;
        };
        let out = match delta {
            Some(delta) => apply_delta(&old, &delta, &limits).unwrap(),
            None => old.clone(),
        };
        // Nested messages come back canonical, so compare normalized trees.
        assert_eq!(normalize(&out, &limits.wire), normalize(&new, &limits.wire));
    }
});
