use std::io;

use mio::{net::TcpStream, Token};

use crate::service::ReadMode;

/// Inbound buffer capacity. One byte short of 1KiB to leave room for a
/// trailing NUL when a buffer is ever treated as a C string (mirrors the
/// original's `MODES_CLIENT_BUF_SIZE`).
pub const CLIENT_BUF_SIZE: usize = 1024;

/// Outcome of a single non-blocking read attempt.
pub enum ReadStatus {
    Data(usize),
    WouldBlock,
    Eof,
}

/// A single accepted or dialed TCP connection feeding data into the engine.
///
/// Unlike the teacher's `TcpStream` wrapper, a `Client` holds no write-side
/// backlog of its own — outbound data for output-direction connections lives
/// in the owning `Writer` (buffered services) or is written straight through
/// (dialed output clients). `Client` is purely the read side plus enough
/// bookkeeping to drive the tick.
pub struct Client {
    pub token: Token,
    pub stream: TcpStream,
    /// Bytes read from the socket but not yet scanned into frames.
    pub inbuf: Vec<u8>,
    /// Index of the service this client feeds frames into, if any. A dialed
    /// client (input or output) has no owning service and this is `None` —
    /// its read behavior comes from `mode` directly instead.
    pub service: Option<usize>,
    /// Whether inbound bytes are scanned for frames or left unparsed. Set at
    /// connection time from the owning service or dial target's direction
    /// and never changed afterward.
    pub mode: ReadMode,
    /// Set once the connection is known dead; the client is dropped on the
    /// next prune phase. Invariant: a closed client is never read from or
    /// written to again.
    pub closed: bool,
}

impl Client {
    pub fn new(token: Token, stream: TcpStream, service: Option<usize>, mode: ReadMode) -> Self {
        Self { token, stream, inbuf: Vec::with_capacity(CLIENT_BUF_SIZE), service, mode, closed: false }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Reads as much as fits in the remaining inbuf capacity.
    pub fn read_into_buf(&mut self) -> io::Result<ReadStatus> {
        use std::io::Read;

        let mut total = 0;
        loop {
            // One byte short of CLIENT_BUF_SIZE: the data model reserves it
            // for a trailing NUL in ASCII mode, so buflen must stay < CLIENT_BUF_SIZE.
            if self.inbuf.len() >= CLIENT_BUF_SIZE - 1 {
                break;
            }
            let mut chunk = [0u8; 512];
            let max = (CLIENT_BUF_SIZE - 1 - self.inbuf.len()).min(chunk.len());
            match self.stream.read(&mut chunk[..max]) {
                Ok(0) => return Ok(if total == 0 { ReadStatus::Eof } else { ReadStatus::Data(total) }),
                Ok(n) => {
                    self.inbuf.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(if total == 0 { ReadStatus::WouldBlock } else { ReadStatus::Data(total) });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(ReadStatus::Data(total))
    }

    /// Drops `n` bytes from the front of `inbuf` after they've been scanned
    /// into frames (or discarded as garbage during resync).
    pub fn consume(&mut self, n: usize) {
        self.inbuf.drain(0..n);
    }
}
