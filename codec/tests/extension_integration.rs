use std::sync::Arc;

use codec::{
    apply_delta, compute_delta_with_strategy, CodecError, CodecLimits, EncodingStrategy,
    FieldDelta,
};
use schema::{ExtensionDef, ExtensionRegistry, FieldDef, FieldNumber, MessageDef, SchemaPool};
use wire::{FieldValue, ParsedMessage};

const PAYLOAD_EXT: u32 = 100;

fn num(raw: u32) -> FieldNumber {
    FieldNumber::new(raw).unwrap()
}

fn pool() -> Arc<SchemaPool> {
    SchemaPool::builder()
        .message(MessageDef::new("base.Host").field(FieldDef::scalar(1, "name")))
        .message(
            MessageDef::new("ext.Payload")
                .field(FieldDef::scalar(1, "body"))
                .field(FieldDef::scalar(2, "count")),
        )
        .build()
        .unwrap()
}

fn registry(pool: &Arc<SchemaPool>) -> ExtensionRegistry {
    let payload = pool.descriptor("ext.Payload").unwrap();
    let mut builder = ExtensionRegistry::builder();
    builder.register(Arc::new(ExtensionDef::new(
        "base.Host",
        num(PAYLOAD_EXT),
        payload,
    )));
    builder.build()
}

fn host(name: &str, body: &str, count: u64) -> Vec<u8> {
    let payload: ParsedMessage<'_> = [
        (num(1), FieldValue::borrowed(body.as_bytes())),
        (num(2), FieldValue::Varint(count)),
    ]
    .into_iter()
    .collect();
    let host: ParsedMessage<'_> = [
        (num(1), FieldValue::borrowed(name.as_bytes())),
        (num(PAYLOAD_EXT), FieldValue::owned(payload.encode())),
    ]
    .into_iter()
    .collect();
    host.encode()
}

#[test]
fn registered_extension_is_diffed_recursively() {
    let pool = pool();
    let host_descriptor = pool.descriptor("base.Host").unwrap();
    let old = host("h", "before", 3);
    let new = host("h", "after", 3);

    let delta = compute_delta_with_strategy(
        &old,
        &new,
        host_descriptor.as_ref(),
        &registry(&pool),
        &CodecLimits::default(),
        EncodingStrategy::FieldLevel,
    )
    .unwrap()
    .unwrap();

    assert_eq!(
        delta.fields,
        vec![FieldDelta {
            number: PAYLOAD_EXT,
            fields: vec![FieldDelta {
                number: 1,
                old_bytes: b"before".to_vec(),
                new_bytes: b"after".to_vec(),
                ..FieldDelta::default()
            }],
            ..FieldDelta::default()
        }]
    );
    assert_eq!(apply_delta(&old, &delta, &CodecLimits::default()).unwrap(), new);
}

#[test]
fn unregistered_extension_is_opaque_bytes() {
    let pool = pool();
    let host_descriptor = pool.descriptor("base.Host").unwrap();
    let old = host("h", "before", 3);
    let new = host("h", "after", 3);

    let delta = compute_delta_with_strategy(
        &old,
        &new,
        host_descriptor.as_ref(),
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
        EncodingStrategy::FieldLevel,
    )
    .unwrap()
    .unwrap();

    assert_eq!(delta.fields.len(), 1);
    let field = &delta.fields[0];
    assert_eq!(field.number, PAYLOAD_EXT);
    assert!(field.fields.is_empty());
    assert!(field.old_bytes.ends_with(b"\x10\x03"));
    assert!(!field.new_bytes.is_empty());
    assert_eq!(apply_delta(&old, &delta, &CodecLimits::default()).unwrap(), new);
}

#[test]
fn extension_field_with_wrong_wire_type_is_rejected() {
    let pool = pool();
    let host_descriptor = pool.descriptor("base.Host").unwrap();
    let old = host("h", "before", 3);
    let new: ParsedMessage<'_> = [
        (num(1), FieldValue::borrowed(b"h")),
        (num(PAYLOAD_EXT), FieldValue::Fixed32(7)),
    ]
    .into_iter()
    .collect();

    let err = compute_delta_with_strategy(
        &old,
        &new.encode(),
        host_descriptor.as_ref(),
        &registry(&pool),
        &CodecLimits::default(),
        EncodingStrategy::FieldLevel,
    )
    .unwrap_err();
    assert_eq!(
        err,
        CodecError::InvalidEmbeddedType {
            number: PAYLOAD_EXT,
            found: wire::WireType::Fixed32,
        }
    );
}

#[test]
fn registry_is_shared_across_threads() {
    let pool = pool();
    let registry = registry(&pool);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = registry.clone();
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let descriptor = pool.descriptor("base.Host").unwrap();
                let old = host("h", "same", i);
                let new = host("h", "same", i + 1);
                let delta = compute_delta_with_strategy(
                    &old,
                    &new,
                    descriptor.as_ref(),
                    &registry,
                    &CodecLimits::default(),
                    EncodingStrategy::FieldLevel,
                )
                .unwrap()
                .unwrap();
                apply_delta(&old, &delta, &CodecLimits::default()).unwrap() == new
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
