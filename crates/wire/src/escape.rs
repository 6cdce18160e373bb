//! JSON string escaping into a capped buffer.

/// Append `src` to `out` in JSON string-escaped form, never growing `out`
/// past `cap` bytes.
///
/// Escape sequences are written atomically: if the next sequence would
/// cross the cap, nothing more is written. Returns `true` when all of
/// `src` was consumed, `false` on truncation.
pub fn escape_into(src: &str, out: &mut String, cap: usize) -> bool {
    for ch in src.chars() {
        let mut scratch = [0u8; 6];
        let piece: &str = match ch {
            '"' => "\\\"",
            '\\' => "\\\\",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            c if (c as u32) < 0x20 => {
                let b = c as u32 as u8;
                scratch[0] = b'\\';
                scratch[1] = b'u';
                scratch[2] = b'0';
                scratch[3] = b'0';
                scratch[4] = hex_digit(b >> 4);
                scratch[5] = hex_digit(b & 0x0f);
                // scratch holds only ascii
                std::str::from_utf8(&scratch).unwrap_or("")
            }
            c => c.encode_utf8(&mut scratch),
        };
        if out.len() + piece.len() > cap {
            return false;
        }
        out.push_str(piece);
    }
    true
}

fn hex_digit(v: u8) -> u8 {
    match v {
        0..=9 => b'0' + v,
        _ => b'a' + (v - 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(src: &str) -> String {
        let mut out = String::new();
        assert!(escape_into(src, &mut out, usize::MAX));
        out
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(escaped("hello world"), "hello world");
    }

    #[test]
    fn quotes_backslashes_and_whitespace_escape() {
        assert_eq!(escaped("a\"b\\c\nd\te\r"), "a\\\"b\\\\c\\nd\\te\\r");
    }

    #[test]
    fn other_control_chars_become_unicode_escapes() {
        assert_eq!(escaped("\x01\x1f"), "\\u0001\\u001f");
    }

    #[test]
    fn multibyte_text_survives() {
        assert_eq!(escaped("héllo ✓"), "héllo ✓");
    }

    #[test]
    fn truncation_never_splits_an_escape_pair() {
        let mut out = String::new();
        assert!(!escape_into("ab\"cd", &mut out, 3));
        // the two-byte \" would not fit at position 2
        assert_eq!(out, "ab");
    }

    #[test]
    fn output_round_trips_through_a_real_parser() {
        let src = "line1\nline2 \"quoted\" \\ \x02";
        let mut out = String::from("\"");
        escape_into(src, &mut out, usize::MAX);
        out.push('"');
        let parsed: String = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, src);
    }
}
