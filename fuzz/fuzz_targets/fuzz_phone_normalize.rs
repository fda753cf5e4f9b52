#![no_main]

use libfuzzer_sys::fuzz_target;
use maturation::fuzz_api::{extract_phone, normalize_phone};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(digits) = normalize_phone(s) {
            assert!(digits.bytes().all(|b| b.is_ascii_digit()));
            assert!((8..=15).contains(&digits.len()));
            assert_eq!(normalize_phone(&digits).as_deref(), Some(digits.as_str()));
        }
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(s) {
            let _ = extract_phone(&v);
        }
    }
});
