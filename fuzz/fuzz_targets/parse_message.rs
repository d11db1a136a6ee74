#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{canonicalize, Limits, ParsedMessage};

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    let Ok(parsed) = ParsedMessage::parse(data, &limits) else {
        return;
    };

    // Canonical output must parse back to the same fields and be a fixed point.
    let encoded = parsed.encode();
    assert_eq!(encoded.len(), parsed.encoded_len());
    let reparsed = ParsedMessage::parse(&encoded, &Limits::unlimited()).unwrap();
    assert_eq!(reparsed, parsed);
    assert_eq!(canonicalize(&encoded, &Limits::unlimited()).unwrap(), encoded);
});
