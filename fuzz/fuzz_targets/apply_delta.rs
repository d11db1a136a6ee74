#![no_main]

use codec::{apply_delta, decode_delta, CodecLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte splits the input into a base message and a delta record.
    let split = (data[0] as usize).min(data.len() - 1) + 1;
    let (base, delta) = data[1..].split_at(split - 1);

    let limits = CodecLimits::for_testing();
    if let Ok(delta) = decode_delta(delta) {
        let _ = apply_delta(base, &delta, &limits);
    }
});
