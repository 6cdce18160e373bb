//! Console keepalive.
//!
//! Hosts watching the process over a serial bridge drop the line when
//! nothing moves for a while, so during long network waits we emit one
//! NUL byte every 200ms. NUL is invisible on a terminal and ignored by
//! line readers. The ticks only ever fire from inside the transport's
//! wait loops; replies being printed are never interleaved with them.

use std::io::Write;
use std::time::{Duration, Instant};

use microclaw_transport::IdleNotify;

const TICK_EVERY: Duration = Duration::from_millis(200);

pub struct SerialKeepalive {
    enabled: bool,
    last: Instant,
}

impl SerialKeepalive {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, last: Instant::now() }
    }
}

impl IdleNotify for SerialKeepalive {
    fn tick(&mut self) {
        if !self.enabled || self.last.elapsed() < TICK_EVERY {
            return;
        }
        self.last = Instant::now();
        let mut out = std::io::stdout().lock();
        // failure to write a keepalive byte is not worth surfacing
        let _ = out.write_all(&[0]);
        let _ = out.flush();
    }
}
