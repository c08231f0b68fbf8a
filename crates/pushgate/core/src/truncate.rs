//! Field truncation for provider payloads.

/// Maximum number of bytes forwarded per textual field.
pub const MAX_BYTES_PER_FIELD: usize = 1024;

/// Truncate `s` to at most `max_bytes`, backing off to a character boundary.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate a string value in place; other JSON values are left untouched.
pub fn truncate_value(value: &mut serde_json::Value, max_bytes: usize) {
    if let serde_json::Value::String(s) = value {
        let len = truncate_utf8(s, max_bytes).len();
        s.truncate(len);
    }
}
