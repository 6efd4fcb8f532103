#![no_main]

use logdemux::{to_bytes, ReferenceDate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let _ = to_bytes(input);

    if let Ok(reference) = ReferenceDate::parse(input, 0) {
        let _ = reference.resolve_string("00:00");
        let _ = reference.resolve_string("23:59");
    }
});
