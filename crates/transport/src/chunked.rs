//! In-place removal of chunked transfer framing.

/// Strip `Transfer-Encoding: chunked` framing from `buf`, in place.
///
/// Detection is a sniff: a body whose first byte is a hex digit followed
/// by a well-formed size line is treated as chunked. Responses here are
/// JSON, which starts with `{` or `[`, so the sniff cannot misfire on a
/// real payload. A malformed size line before anything was decoded
/// leaves the buffer untouched.
pub fn decode_in_place(buf: &mut Vec<u8>) {
    if buf.first().is_none_or(|b| !b.is_ascii_hexdigit()) {
        return;
    }
    let mut src = 0;
    let mut dst = 0;
    loop {
        let mut size = 0usize;
        let mut digits = 0;
        while src < buf.len() {
            match (buf[src] as char).to_digit(16) {
                Some(v) => {
                    size = size.saturating_mul(16).saturating_add(v as usize);
                    digits += 1;
                    src += 1;
                }
                None => break,
            }
        }
        if digits == 0 {
            if dst == 0 {
                return;
            }
            break;
        }
        // skip the rest of the size line, chunk extensions included
        while src < buf.len() && buf[src] != b'\n' {
            src += 1;
        }
        if src >= buf.len() {
            if dst == 0 {
                return;
            }
            break;
        }
        src += 1;
        if size == 0 {
            break;
        }
        let end = (src + size).min(buf.len());
        buf.copy_within(src..end, dst);
        dst += end - src;
        src = end;
        if src < buf.len() && buf[src] == b'\r' {
            src += 1;
        }
        if src < buf.len() && buf[src] == b'\n' {
            src += 1;
        }
        if src >= buf.len() {
            break;
        }
    }
    buf.truncate(dst);
}
