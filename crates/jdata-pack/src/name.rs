//! Field-name sanitization: a pure, bidirectional transform between raw wire
//! names and identifier-safe object keys.
//!
//! A non-identifier-safe leading character becomes the reversible prefix form
//! `x0x<HEX>_`; any other unsafe character becomes an inline `_0x<HEX>_`
//! escape. `decode_name` inverts both exactly.

/// Sanitizes a raw wire name into an identifier-safe key.
pub fn encode_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, ch) in raw.chars().enumerate() {
        let safe_tail = ch.is_ascii_alphanumeric() || ch == '_';
        let safe_head = ch.is_ascii_alphabetic() || ch == '_';
        if i == 0 && !safe_head {
            out.push_str(&format!("x0x{:X}_", ch as u32));
        } else if !safe_tail {
            out.push_str(&format!("_0x{:X}_", ch as u32));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Restores the raw wire name from its sanitized key form.
pub fn decode_name(enc: &str) -> String {
    let mut out = String::with_capacity(enc.len());
    let bytes = enc.as_bytes();
    let mut i = 0;
    if let Some(rest) = enc.strip_prefix("x0x") {
        if let Some((ch, used)) = take_hex_escape(rest) {
            out.push(ch);
            i = 3 + used;
        }
    }
    while i < bytes.len() {
        if bytes[i] == b'_' && enc[i + 1..].starts_with("0x") {
            if let Some((ch, used)) = take_hex_escape(&enc[i + 3..]) {
                out.push(ch);
                i += 3 + used;
                continue;
            }
        }
        let ch = enc[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Reads `<HEX>_` from the front of `s`; returns the decoded char and the
/// number of bytes consumed.
fn take_hex_escape(s: &str) -> Option<(char, usize)> {
    let end = s.find('_')?;
    if end == 0 || end > 6 {
        return None;
    }
    let code = u32::from_str_radix(&s[..end], 16).ok()?;
    let ch = char::from_u32(code)?;
    Some((ch, end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_names_pass_through() {
        assert_eq!(encode_name("_ArrayType_"), "_ArrayType_");
        assert_eq!(encode_name("plain_name9"), "plain_name9");
        assert_eq!(decode_name("_ArrayType_"), "_ArrayType_");
    }

    #[test]
    fn test_leading_digit_gets_prefix() {
        assert_eq!(encode_name("9lives"), "x0x39_lives");
        assert_eq!(decode_name("x0x39_lives"), "9lives");
    }

    #[test]
    fn test_inner_escape() {
        assert_eq!(encode_name("my field"), "my_0x20_field");
        assert_eq!(decode_name("my_0x20_field"), "my field");
    }

    #[test]
    fn test_leading_underscore_escaped_form_decodes() {
        // The alternate envelope prefix used by hosts that cannot keep a
        // leading underscore.
        assert_eq!(decode_name("x0x5F_ArrayType_"), "_ArrayType_");
    }

    #[test]
    fn test_roundtrip_mixed() {
        for raw in ["a b/c", "@meta", "日本", "0", "_x_", "k.v"] {
            assert_eq!(decode_name(&encode_name(raw)), raw, "raw = {raw}");
        }
    }
}
