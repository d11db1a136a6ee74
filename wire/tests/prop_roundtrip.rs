use proptest::prelude::*;
use wire::{FieldNumber, FieldValue, Limits, ParsedMessage};

fn value_strategy() -> impl Strategy<Value = FieldValue<'static>> {
    prop_oneof![
        any::<u64>().prop_map(FieldValue::Varint),
        any::<u64>().prop_map(FieldValue::Fixed64),
        any::<u32>().prop_map(FieldValue::Fixed32),
        prop::collection::vec(any::<u8>(), 0..24).prop_map(FieldValue::owned),
    ]
}

fn entry_strategy() -> impl Strategy<Value = (FieldNumber, FieldValue<'static>)> {
    let number = prop_oneof![1u32..16, Just(FieldNumber::MAX), 1000u32..1010]
        .prop_map(|raw| FieldNumber::new(raw).unwrap());
    (number, value_strategy())
}

proptest! {
    #[test]
    fn prop_encode_parse_roundtrip(entries in prop::collection::vec(entry_strategy(), 0..48)) {
        let message: ParsedMessage<'static> = entries.into_iter().collect();
        let bytes = message.encode();
        prop_assert_eq!(bytes.len(), message.encoded_len());

        let parsed = ParsedMessage::parse(&bytes, &Limits::default()).unwrap();
        prop_assert_eq!(&parsed, &message);
        prop_assert_eq!(parsed.encode(), bytes);
    }

    #[test]
    fn prop_parse_arbitrary_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        if let Ok(parsed) = ParsedMessage::parse(&bytes, &Limits::for_testing()) {
            // Whatever parses must survive a canonical re-encode.
            let encoded = parsed.encode();
            let reparsed = ParsedMessage::parse(&encoded, &Limits::for_testing()).unwrap();
            prop_assert_eq!(reparsed, parsed);
        }
    }
}
