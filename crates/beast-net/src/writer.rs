use std::time::{Duration, Instant};

/// Fixed outbound buffer capacity per output service (mirrors the original's
/// `MODES_OUT_BUF_SIZE`). A frame that would overflow it forces an immediate
/// flush before the frame is appended.
pub const OUT_BUF_SIZE: usize = 1500;

/// A zero-payload type-'1' frame: `1A 31` followed by 9 zero bytes (7 meta +
/// 2 payload). Sent to output services that have gone quiet, so downstream
/// consumers can tell the link is alive even with no traffic to relay.
pub const BEAST_HEARTBEAT: [u8; 11] = [0x1A, 0x31, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Buffers frames for a single output-direction service until a size or time
/// threshold is hit, then flushes them out to every client attached to that
/// service in one write. Bypassed entirely by dialed output clients, which
/// write straight through (see `Engine::broadcast`).
pub struct Writer {
    buf: Vec<u8>,
    last_flush: Instant,
    last_activity: Instant,
}

impl Writer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { buf: Vec::with_capacity(OUT_BUF_SIZE), last_flush: now, last_activity: now }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Appends `frame` to the buffer, returning `true` if the buffer should
    /// be flushed before accepting more data (it's now at or over the size
    /// threshold, or the frame wouldn't otherwise fit in `OUT_BUF_SIZE`).
    pub fn push(&mut self, frame: &[u8], flush_size_bytes: usize, now: Instant) -> bool {
        if self.buf.len() + frame.len() > OUT_BUF_SIZE {
            return true;
        }
        self.buf.extend_from_slice(frame);
        self.last_activity = now;
        self.buf.len() >= flush_size_bytes
    }

    pub fn due_for_time_flush(&self, flush_interval: Duration, now: Instant) -> bool {
        !self.buf.is_empty() && now.saturating_duration_since(self.last_flush) >= flush_interval
    }

    pub fn due_for_heartbeat(&self, heartbeat_interval: Duration, now: Instant) -> bool {
        self.buf.is_empty()
            && now.saturating_duration_since(self.last_activity) >= heartbeat_interval
    }

    /// Drains the buffer, returning its contents for the caller to write out.
    pub fn take(&mut self, now: Instant) -> Vec<u8> {
        self.last_flush = now;
        std::mem::take(&mut self.buf)
    }

    pub fn note_heartbeat_sent(&mut self, now: Instant) {
        self.last_activity = now;
        self.last_flush = now;
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
