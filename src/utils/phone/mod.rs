/// Minimum and maximum digit counts for an E.164-style phone number.
const MIN_PHONE_DIGITS: usize = 8;
const MAX_PHONE_DIGITS: usize = 15;

/// Normalize a phone number or WhatsApp-style JID into bare digits.
///
/// `"5511999990000:12@s.whatsapp.net"` and `"+55 (11) 99999-0000"` both
/// normalize to `"5511999990000"`. Returns `None` when the
/// remaining digit count falls outside 8..=15.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let without_domain = raw.split('@').next().unwrap_or_default();
    let without_device = without_domain.split(':').next().unwrap_or_default();
    let digits: String = without_device
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

pub fn is_valid_phone(raw: &str) -> bool {
    normalize_phone(raw).is_some()
}
