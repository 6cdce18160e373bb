//! Field location and bounded value extraction.

use microclaw_core::{BoundedString, Ident, IdentError};

/// Locate `"key"` in `src` and return the remainder of the slice starting
/// at the first byte of the value (whitespace and the colon skipped).
///
/// The match is a raw byte scan over the whole slice. Callers that need an
/// `id` inside a nested object must narrow `src` to that object first.
pub fn find_field<'a>(src: &'a str, key: &str) -> Option<&'a str> {
    let bytes = src.as_bytes();
    let kb = key.as_bytes();
    let mut i = 0;
    while i + kb.len() + 2 <= bytes.len() {
        if bytes[i] == b'"'
            && bytes[i + 1 + kb.len()] == b'"'
            && &bytes[i + 1..i + 1 + kb.len()] == kb
        {
            let mut j = i + kb.len() + 2;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\t' | b'\r' | b'\n' | b':') {
                j += 1;
            }
            if j < bytes.len() {
                return Some(&src[j..]);
            }
            return None;
        }
        i += 1;
    }
    None
}

/// Decode a JSON string value into `out`, appending at most up to `cap`
/// total bytes. Returns `false` when `value` does not start with a quote.
///
/// Only `\"` `\\` `\n` `\r` `\t` are decoded; any other escape keeps the
/// escaped character verbatim. Truncation at `cap` is silent.
pub fn extract_string_into(value: &str, out: &mut String, cap: usize) -> bool {
    let mut chars = value.chars();
    if chars.next() != Some('"') {
        return false;
    }
    while let Some(c) = chars.next() {
        let decoded = match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some(other) => other,
                None => break,
            },
            other => other,
        };
        if out.len() + decoded.len_utf8() > cap {
            break;
        }
        out.push(decoded);
    }
    true
}

/// [`extract_string_into`] writing into a fixed-capacity buffer. The
/// buffer is cleared first; its own capacity is the cap.
pub fn extract_bounded<const N: usize>(value: &str, out: &mut BoundedString<N>) -> bool {
    out.clear();
    let mut chars = value.chars();
    if chars.next() != Some('"') {
        return false;
    }
    while let Some(c) = chars.next() {
        let decoded = match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some(other) => other,
                None => break,
            },
            other => other,
        };
        if !out.push(decoded) {
            break;
        }
    }
    true
}

/// Outcome of reading an integer-shaped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntParse {
    /// A bare JSON number, parsed.
    Number(i64),
    /// A quoted value; the digits are in the string, not parsed here.
    /// Snowflake ids arrive this way and overflow `i64` anyway.
    Quoted,
    /// Neither a number nor a string.
    Invalid,
}

/// Read the integer at the start of `value`.
pub fn extract_integer(value: &str) -> IntParse {
    let bytes = value.as_bytes();
    match bytes.first() {
        Some(b'"') => IntParse::Quoted,
        Some(b'-') | Some(b'0'..=b'9') => {
            let mut end = 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            match value[..end].parse::<i64>() {
                Ok(n) => IntParse::Number(n),
                Err(_) => IntParse::Invalid,
            }
        }
        _ => IntParse::Invalid,
    }
}

/// `find_field` plus `extract_integer`, with every failure mapping to 0.
pub fn integer_or_zero(src: &str, key: &str) -> i64 {
    match find_field(src, key).map(extract_integer) {
        Some(IntParse::Number(n)) => n,
        _ => 0,
    }
}

/// Read a bare `true`/`false` at the start of `value`.
pub fn extract_bool(value: &str) -> Option<bool> {
    if value.starts_with("true") {
        Some(true)
    } else if value.starts_with("false") {
        Some(false)
    } else {
        None
    }
}

/// Read a bare JSON number at the start of `value` as `f32`.
pub fn extract_f32(value: &str) -> Option<f32> {
    let bytes = value.as_bytes();
    let mut end = 0;
    while end < bytes.len()
        && matches!(bytes[end], b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
    {
        end += 1;
    }
    value[..end].parse::<f32>().ok()
}

/// Slice out one balanced `{...}` object starting at the first byte of
/// `value`, quote-aware so braces inside strings do not count.
pub fn object_slice(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&value[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read an identifier that may arrive as a number or a string.
///
/// Quoted ids longer than the identifier buffer fail as [`IdentError::Overflow`]
/// rather than being truncated, so a mangled id can never match an
/// allow-list entry by prefix.
pub fn extract_ident(value: &str) -> Result<Ident, IdentError> {
    match extract_integer(value) {
        IntParse::Number(n) => Ident::from_i64(n),
        IntParse::Quoted => {
            // Two spare bytes so an over-long id is detected, not cut.
            let mut scratch: BoundedString<34> = BoundedString::new();
            extract_bounded(value, &mut scratch);
            Ident::from_text(scratch.as_str())
        }
        IntParse::Invalid => Err(IdentError::NotAnId),
    }
}
