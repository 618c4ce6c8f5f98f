//! Small parsing and formatting helpers

/// Parse the leading integer of `text`, C `atoll` style
///
/// Leading whitespace and one sign are accepted, parsing stops at the first
/// non-digit, and anything unparsable yields 0. Overflow saturates.
#[must_use]
pub fn parse_leading_i64(text: &str) -> i64 {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(b - b'0');
        value = value.saturating_mul(10).saturating_add(digit);
    }

    if negative { -value } else { value }
}

/// Format a byte count in human-readable form
///
/// # Example
///
/// ```
/// use dclink_core::util::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.00 KiB");
/// assert_eq!(format_bytes(1536 * 1024), "1.50 MiB");
/// ```
#[must_use]
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}
