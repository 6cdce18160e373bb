//! Bounded conversation history.
//!
//! One fixed-capacity buffer holds the whole session as delimited records:
//! `role 0x01 content 0x02`, appended in order. When an append would not
//! fit, whole records are evicted oldest-first until it does. There is no
//! per-message allocation and the buffer never grows.

const ROLE_SEP: char = '\x01';
const RECORD_SEP: char = '\x02';

/// Default session capacity in bytes.
pub const SESSION_CAP: usize = 4096;

/// Append-only ring of role/content records in one fixed-capacity buffer.
pub struct SessionLog {
    buf: String,
    cap: usize,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::with_capacity(SESSION_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: String::with_capacity(cap), cap }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Append one record, evicting the oldest complete records as needed.
    ///
    /// A record larger than the whole buffer empties the log and is then
    /// stored truncated at whatever fits; an append is never rejected
    /// outright.
    pub fn push(&mut self, role: &str, content: &str) {
        let need = role.len() + 1 + content.len() + 1;
        while self.buf.len() + need > self.cap && !self.buf.is_empty() {
            match self.buf.find(RECORD_SEP) {
                Some(pos) => {
                    self.buf.drain(..=pos);
                }
                None => {
                    self.buf.clear();
                    break;
                }
            }
        }
        let room = self.cap.saturating_sub(self.buf.len());
        if need <= room {
            self.buf.push_str(role);
            self.buf.push(ROLE_SEP);
            self.buf.push_str(content);
            self.buf.push(RECORD_SEP);
        } else if room > role.len() + 2 {
            // Oversized single record: keep what fits, still well-formed
            self.buf.push_str(role);
            self.buf.push(ROLE_SEP);
            let budget = room - role.len() - 2;
            self.buf.push_str(crate::prefix(content, budget));
            self.buf.push(RECORD_SEP);
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Iterate `(role, content)` pairs, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.buf
            .split_terminator(RECORD_SEP)
            .filter_map(|rec| rec.split_once(ROLE_SEP))
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}
