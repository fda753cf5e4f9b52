#![no_main]

use libfuzzer_sys::fuzz_target;
use maturation::fuzz_api::receipt_from_body;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let _ = receipt_from_body(200, body);
    }
});
