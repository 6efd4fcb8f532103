#![no_main]

use logdemux::{parse_record, RecordValue};
use libfuzzer_sys::fuzz_target;

const MAX_INPUT_LEN: usize = 4096;

fuzz_target!(|data: &[u8]| {
    if data.len() > MAX_INPUT_LEN {
        return;
    }
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(record) = parse_record(input) {
        // Parsed keys are always retrievable and render without panicking
        for (key, value) in record.iter() {
            assert!(record.get(key).is_some());
            let rendered = value.to_string();
            if let RecordValue::Integer(i) = value {
                assert_eq!(rendered, i.to_string());
            }
        }
    }
});
