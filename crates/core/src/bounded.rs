//! Fixed-capacity UTF-8 string storage.
//!
//! `BoundedString` is the one place that knows how to write into a
//! fixed `[u8; N]` safely: every write either fits, truncates at a char
//! boundary and says so, or zeroes the buffer entirely so downstream
//! checks fail closed.

use thiserror::Error;

/// Returned when an input cannot fit the fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value of {needed} bytes exceeds {capacity}-byte capacity")]
pub struct CapacityError {
    pub needed: usize,
    pub capacity: usize,
}

/// A stack-allocated string with a compile-time byte capacity.
///
/// Always valid UTF-8: writes are only ever cut at char boundaries.
#[derive(Clone, Copy)]
pub struct BoundedString<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> BoundedString<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_str(&self) -> &str {
        // Invariant: buf[..len] is always valid UTF-8 (writes go through
        // &str and are cut at char boundaries only).
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    /// Empty the string and zero the backing buffer.
    pub fn clear(&mut self) {
        self.buf = [0; N];
        self.len = 0;
    }

    /// Append as much of `s` as fits, cutting at a char boundary.
    /// Returns `false` if anything was dropped.
    pub fn push_str_lossy(&mut self, s: &str) -> bool {
        let room = N - self.len;
        if s.len() <= room {
            self.buf[self.len..self.len + s.len()].copy_from_slice(s.as_bytes());
            self.len += s.len();
            return true;
        }
        let mut cut = room;
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf[self.len..self.len + cut].copy_from_slice(s[..cut].as_bytes());
        self.len += cut;
        false
    }

    /// Append a single char if it fits. Returns `false` if it did not.
    pub fn push(&mut self, c: char) -> bool {
        let need = c.len_utf8();
        if self.len + need > N {
            return false;
        }
        c.encode_utf8(&mut self.buf[self.len..self.len + need]);
        self.len += need;
        true
    }

    /// Build from `s`, truncating at a char boundary if it is too long.
    pub fn from_str_lossy(s: &str) -> Self {
        let mut out = Self::new();
        out.push_str_lossy(s);
        out
    }

    /// Replace the contents with `s`, or fail without a partial write.
    pub fn try_from_str(s: &str) -> Result<Self, CapacityError> {
        if s.len() > N {
            return Err(CapacityError { needed: s.len(), capacity: N });
        }
        let mut out = Self::new();
        out.push_str_lossy(s);
        Ok(out)
    }

    /// Replace the contents with `s`; on overflow the buffer is zeroed
    /// (never left holding a truncated partial value) and `false` is
    /// returned so that an equality check downstream fails closed.
    pub fn assign_or_clear(&mut self, s: &str) -> bool {
        self.clear();
        if s.len() > N {
            return false;
        }
        self.push_str_lossy(s)
    }
}

impl<const N: usize> Default for BoundedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::ops::Deref for BoundedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> std::fmt::Display for BoundedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> std::fmt::Debug for BoundedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> std::fmt::Write for BoundedString<N> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if self.push_str_lossy(s) { Ok(()) } else { Err(std::fmt::Error) }
    }
}

impl<const N: usize> PartialEq for BoundedString<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<const N: usize> Eq for BoundedString<N> {}

impl<const N: usize> PartialEq<&str> for BoundedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
