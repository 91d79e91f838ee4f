use mio::{net::TcpListener, Token};

use crate::{dial::Direction, writer::Writer};

/// How a service's accepted clients are read. Dispatch was a function-pointer
/// callback selected by role in the original; an enum matched in the tick
/// loop does the same job without indirection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Bytes are not parsed; the service only ever writes.
    Ignore,
    /// Frames are scanned out of the inbound buffer and broadcast onward.
    BeastData,
    /// BEAST command frames (tag `'1'` only, no timestamp metadata).
    /// Accepted by this engine but have no semantic effect once extracted —
    /// no factory currently wires a handler to this mode (§4.3/§6).
    BeastCommand,
    /// NUL/separator-delimited ASCII records, split on `ascii_separator`.
    AsciiDelimited,
}

/// A role backed by one or more listening sockets, together with every
/// client currently accepted across any of them.
///
/// `--in-server`/`--out-server` can each bind a comma-separated list of
/// ports under a single `Service`, so `listeners` is plural even though most
/// services in practice bind exactly one.
pub struct Service {
    pub listeners: Vec<(Token, TcpListener)>,
    pub direction: Direction,
    pub mode: ReadMode,
    pub clients: Vec<usize>,
    /// Present only for `Direction::Output` services, which buffer frames
    /// instead of writing each one through immediately.
    pub writer: Option<Writer>,
    /// Separator frames are split on when `mode == AsciiDelimited`. Unused
    /// otherwise.
    pub ascii_separator: Vec<u8>,
}

impl Service {
    pub fn new(listeners: Vec<(Token, TcpListener)>, direction: Direction, mode: ReadMode) -> Self {
        let writer = match direction {
            Direction::Output => Some(Writer::new()),
            Direction::Input => None,
        };
        Self { listeners, direction, mode, clients: Vec::new(), writer, ascii_separator: Vec::new() }
    }

    pub fn has_token(&self, token: Token) -> bool {
        self.listeners.iter().any(|(t, _)| *t == token)
    }
}
