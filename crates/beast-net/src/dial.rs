use std::net::SocketAddr;

use crate::timing::Repeater;

/// Whether a dialed connection feeds frames into the engine (`Input`) or
/// only receives broadcast output (`Output`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// An outbound connection the engine is responsible for establishing and, on
/// failure or disconnect, re-establishing after a backoff.
///
/// `client` is the index into `Engine::clients` of the live connection, when
/// one exists. It is explicitly cleared by the prune phase when that client
/// closes — the registry never infers liveness from the client list, so a
/// target dangling a stale index is a bug class that can't happen here.
pub struct DialTarget {
    pub addr: SocketAddr,
    pub direction: Direction,
    pub client: Option<usize>,
    pub backoff: Repeater,
}

impl DialTarget {
    pub fn new(addr: SocketAddr, direction: Direction, reconnect_interval: std::time::Duration) -> Self {
        let mut backoff = Repeater::every(reconnect_interval);
        backoff.force_fire();
        Self { addr, direction, client: None, backoff }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}
