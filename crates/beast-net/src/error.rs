use std::{io, net::SocketAddr};

use thiserror::Error;

/// Fallible engine operations. Nothing in the tick itself returns these —
/// peer misbehavior is handled locally (§7) — these surface only
/// configuration-time failures to the caller.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("failed to bind listener at {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to register listener at {addr} with the poller: {source}")]
    Register {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("unknown token {0:?}")]
    UnknownToken(mio::Token),
}
