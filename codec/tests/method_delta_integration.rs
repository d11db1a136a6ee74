use std::sync::{Arc, OnceLock};

use codec::{
    apply_delta, apply_message_delta, decode_delta, encode_delta, get_delta,
    get_delta_with_strategy, CodecError, CodecLimits, DeltaKind, EncodingStrategy, FieldDelta,
    FieldFlags, MessageDelta, SchemaMessage,
};
use prost::Message;
use schema::{DescriptorRef, ExtensionRegistry, FieldDef, MessageDef, SchemaPool};

#[derive(Clone, PartialEq, ::prost::Message)]
struct Method {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(string, tag = "2")]
    request_type_url: String,
    #[prost(bool, tag = "3")]
    request_streaming: bool,
    #[prost(string, tag = "4")]
    response_type_url: String,
    #[prost(bool, tag = "5")]
    response_streaming: bool,
    #[prost(message, repeated, tag = "6")]
    options: Vec<MethodOption>,
    #[prost(int32, tag = "7")]
    syntax: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct MethodOption {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(message, optional, tag = "2")]
    value: Option<Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct Any {
    #[prost(string, tag = "1")]
    type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    value: Vec<u8>,
}

fn pool() -> &'static Arc<SchemaPool> {
    static POOL: OnceLock<Arc<SchemaPool>> = OnceLock::new();
    POOL.get_or_init(|| {
        SchemaPool::builder()
            .message(
                MessageDef::new("google.protobuf.Method")
                    .field(FieldDef::scalar(1, "name"))
                    .field(FieldDef::scalar(2, "request_type_url"))
                    .field(FieldDef::scalar(3, "request_streaming"))
                    .field(FieldDef::scalar(4, "response_type_url"))
                    .field(FieldDef::scalar(5, "response_streaming"))
                    .field(FieldDef::message(6, "options", "google.protobuf.Option"))
                    .field(FieldDef::scalar(7, "syntax")),
            )
            .message(
                MessageDef::new("google.protobuf.Option")
                    .field(FieldDef::scalar(1, "name"))
                    .field(FieldDef::message(2, "value", "google.protobuf.Any")),
            )
            .message(
                MessageDef::new("google.protobuf.Any")
                    .field(FieldDef::scalar(1, "type_url"))
                    .field(FieldDef::scalar(2, "value")),
            )
            .build()
            .unwrap()
    })
}

impl SchemaMessage for Method {
    fn message_descriptor(&self) -> DescriptorRef {
        pool().descriptor("google.protobuf.Method").unwrap()
    }
}

impl SchemaMessage for MethodOption {
    fn message_descriptor(&self) -> DescriptorRef {
        pool().descriptor("google.protobuf.Option").unwrap()
    }
}

fn option(name: &str) -> MethodOption {
    MethodOption {
        name: name.to_string(),
        value: None,
    }
}

fn base_method() -> Method {
    Method {
        name: "foo".to_string(),
        request_streaming: true,
        options: vec![option("baz")],
        ..Method::default()
    }
}

fn target_method() -> Method {
    Method {
        name: "bar".to_string(),
        request_type_url: "example.com".to_string(),
        options: vec![option("qux")],
        ..Method::default()
    }
}

fn expected_field_delta() -> MessageDelta {
    MessageDelta {
        fields: vec![
            FieldDelta {
                number: 1,
                old_bytes: b"foo".to_vec(),
                new_bytes: b"bar".to_vec(),
                ..FieldDelta::default()
            },
            FieldDelta {
                number: 2,
                flags: FieldFlags::OLD_IS_NOT_SET,
                new_bytes: b"example.com".to_vec(),
                ..FieldDelta::default()
            },
            FieldDelta {
                number: 3,
                flags: FieldFlags::NEW_IS_NOT_SET,
                old_varint: 1,
                ..FieldDelta::default()
            },
            FieldDelta {
                number: 6,
                fields: vec![FieldDelta {
                    number: 1,
                    old_bytes: b"baz".to_vec(),
                    new_bytes: b"qux".to_vec(),
                    ..FieldDelta::default()
                }],
                ..FieldDelta::default()
            },
        ],
        ..MessageDelta::default()
    }
}

#[test]
fn applying_hand_built_delta_yields_target() {
    let base = base_method();
    let out = apply_message_delta(&base, &expected_field_delta(), &CodecLimits::default()).unwrap();
    assert_eq!(out, target_method());
}

#[test]
fn forced_field_level_delta_matches_expected_record() {
    let delta = get_delta_with_strategy(
        &base_method(),
        &target_method(),
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
        EncodingStrategy::FieldLevel,
    )
    .unwrap()
    .unwrap();
    assert_eq!(delta, expected_field_delta());
}

#[test]
fn default_strategy_picks_smaller_whole_buffer() {
    let base = base_method();
    let target = target_method();
    let delta = get_delta(&base, &target, &ExtensionRegistry::empty(), &CodecLimits::default())
        .unwrap()
        .unwrap();
    assert_eq!(delta.kind(), DeltaKind::WholeBuffer);
    assert_eq!(delta.old_bytes, base.encode_to_vec());
    assert_eq!(Method::decode(delta.new_bytes.as_slice()).unwrap(), target);
    assert!(delta.encoded_len() <= expected_field_delta().encoded_len());

    let out = apply_message_delta(&base, &delta, &CodecLimits::default()).unwrap();
    assert_eq!(out, target);
}

#[test]
fn equal_messages_have_no_delta() {
    let delta = get_delta(
        &base_method(),
        &base_method(),
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
    )
    .unwrap();
    assert_eq!(delta, None);
}

#[test]
fn clearing_message_uses_new_is_empty() {
    let base = base_method();
    let delta = get_delta(
        &base,
        &Method::default(),
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(delta.kind(), DeltaKind::NewIsEmpty);
    assert_eq!(delta.old_bytes, base.encode_to_vec());
    let out = apply_message_delta(&base, &delta, &CodecLimits::default()).unwrap();
    assert_eq!(out, Method::default());
}

#[test]
fn populating_empty_message_uses_old_is_empty() {
    let target = target_method();
    let delta = get_delta(
        &Method::default(),
        &target,
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(delta.kind(), DeltaKind::OldIsEmpty);
    let out = apply_message_delta(&Method::default(), &delta, &CodecLimits::default()).unwrap();
    assert_eq!(out, target);
}

#[test]
fn mismatched_types_are_rejected() {
    let err = get_delta(
        &base_method(),
        &option("baz"),
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CodecError::TypeMismatch {
            expected: "google.protobuf.Method".to_string(),
            found: "google.protobuf.Option".to_string(),
        }
    );
}

#[test]
fn nested_any_changes_recurse_two_levels() {
    let mut base = base_method();
    base.options[0].value = Some(Any {
        type_url: "type.example/A".to_string(),
        value: vec![1; 64],
    });
    let mut target = base.clone();
    target.options[0].value = Some(Any {
        type_url: "type.example/B".to_string(),
        value: vec![1; 64],
    });

    let delta = get_delta_with_strategy(
        &base,
        &target,
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
        EncodingStrategy::FieldLevel,
    )
    .unwrap()
    .unwrap();
    let options = &delta.fields[0];
    assert_eq!(options.number, 6);
    let value = &options.fields[0];
    assert_eq!(value.number, 2);
    assert_eq!(value.fields[0].number, 1);
    assert_eq!(value.fields[0].new_bytes, b"type.example/B");

    let out = apply_message_delta(&base, &delta, &CodecLimits::default()).unwrap();
    assert_eq!(out, target);
}

#[test]
fn appended_repeated_options_round_trip() {
    let base = base_method();
    let mut target = base.clone();
    target.options.push(option("extra"));
    target.options.push(option(""));

    let delta = get_delta_with_strategy(
        &base,
        &target,
        &ExtensionRegistry::empty(),
        &CodecLimits::default(),
        EncodingStrategy::FieldLevel,
    )
    .unwrap()
    .unwrap();
    let appended: Vec<(u32, u32)> = delta.fields.iter().map(|f| (f.index, f.flags)).collect();
    assert_eq!(
        appended,
        vec![
            (1, FieldFlags::OLD_IS_NOT_SET),
            (2, FieldFlags::OLD_IS_NOT_SET | FieldFlags::NEW_IS_EMPTY_BYTES),
        ]
    );

    let out = apply_message_delta(&base, &delta, &CodecLimits::default()).unwrap();
    assert_eq!(out, target);
}

#[test]
fn persisted_delta_applies_after_decoding() {
    let base = base_method();
    let bytes = encode_delta(&expected_field_delta());
    let delta = decode_delta(&bytes).unwrap();
    let out = apply_delta(&base.encode_to_vec(), &delta, &CodecLimits::default()).unwrap();
    assert_eq!(out, target_method().encode_to_vec());
}
