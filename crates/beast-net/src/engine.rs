use std::{
    io::{self, Write},
    net::SocketAddr,
    time::{Duration, Instant},
};

use mio::{net::TcpListener, Events, Interest, Poll, Token};

use crate::{
    client::{Client, ReadStatus},
    config::Config,
    dial::{DialTarget, Direction},
    error::NetError,
    framer::{scan_ascii, scan_beast, scan_beast_command, ScanOutcome, MAX_FRAME_LEN},
    safe_assert,
    service::{ReadMode, Service},
    writer::BEAST_HEARTBEAT,
};

/// Ties together every listener, accepted client, dial target and poller
/// into a single value threaded through each tick — no global state.
///
/// `services` holds listening sockets (accept-many, possibly several ports
/// per service); `dial_targets` holds outbound connection intents (one
/// client each); `clients` holds every live TCP connection regardless of how
/// it was established, indexed by a stable slot that survives other clients
/// closing — a tombstoned slot is `None` until its index is reused, so
/// `Service::clients` and `DialTarget::client` never need renumbering after
/// a prune.
pub struct Engine {
    poll: Poll,
    events: Events,
    config: Config,
    services: Vec<Service>,
    clients: Vec<Option<Client>>,
    free_slots: Vec<usize>,
    dial_targets: Vec<DialTarget>,
    next_token: usize,
}

enum Handle {
    Service(usize),
    Client(usize),
}

impl Engine {
    pub fn new(config: Config) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            config,
            services: Vec::new(),
            clients: Vec::new(),
            free_slots: Vec::new(),
            dial_targets: Vec::new(),
            next_token: 0,
        })
    }

    fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn client(&self, idx: usize) -> &Client {
        self.clients[idx].as_ref().expect("live client index")
    }

    fn client_mut(&mut self, idx: usize) -> &mut Client {
        self.clients[idx].as_mut().expect("live client index")
    }

    fn find_token(&self, token: Token) -> Option<Handle> {
        if let Some(idx) = self.services.iter().position(|s| s.has_token(token)) {
            return Some(Handle::Service(idx));
        }
        self.clients
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| c.token == token))
            .map(Handle::Client)
    }

    /// Binds and registers one listener per address, adding them all as a
    /// single service (mirrors `--in-server`/`--out-server` accepting a
    /// comma-separated port list under one role).
    pub fn add_service(
        &mut self,
        addrs: &[SocketAddr],
        direction: Direction,
        mode: ReadMode,
    ) -> Result<usize, NetError> {
        let mut listeners = Vec::with_capacity(addrs.len());
        for &addr in addrs {
            let mut listener = TcpListener::bind(addr).map_err(|source| NetError::Bind { addr, source })?;
            let token = self.alloc_token();
            self.poll
                .registry()
                .register(&mut listener, token, Interest::READABLE)
                .map_err(|source| NetError::Register { addr, source })?;
            listeners.push((token, listener));
        }
        self.services.push(Service::new(listeners, direction, mode));
        Ok(self.services.len() - 1)
    }

    /// Registers an outbound connection intent. The first attempt happens on
    /// the next `reconnect` phase.
    pub fn add_dial_target(&mut self, addr: SocketAddr, direction: Direction) {
        self.dial_targets.push(DialTarget::new(addr, direction, self.config.reconnect_interval));
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.iter().filter(|c| c.is_some()).count()
    }

    /// Local address of one of a service's listeners, by position in the
    /// address list it was created with. Mainly useful for tests that bind
    /// to port 0 and need the OS-assigned port back.
    pub fn service_local_addr(&self, service_idx: usize, listener_idx: usize) -> io::Result<SocketAddr> {
        self.services[service_idx].listeners[listener_idx].1.local_addr()
    }

    /// Moves a client from its current service (if any) to a new one,
    /// flushing the old and new writers first to keep frame boundaries
    /// intact on both sides (§4.3). A no-op if already attached to
    /// `new_service_idx`. Nothing in this engine currently triggers this
    /// automatically — received BEAST commands have no semantic effect —
    /// but it's exercised directly by tests as a first-class operation.
    pub fn reattach_client(&mut self, client_idx: usize, new_service_idx: usize) {
        let now = Instant::now();
        if self.client(client_idx).service == Some(new_service_idx) {
            return;
        }
        if let Some(old_idx) = self.client(client_idx).service {
            self.flush_service(old_idx, now);
            self.services[old_idx].clients.retain(|&i| i != client_idx);
        }
        self.flush_service(new_service_idx, now);
        self.services[new_service_idx].clients.push(client_idx);
        let new_mode = self.services[new_service_idx].mode;
        let client = self.client_mut(client_idx);
        client.service = Some(new_service_idx);
        client.mode = new_mode;
    }

    /// Runs one pass of the six tick phases: accept, read/frame, heartbeat,
    /// time-based flush, prune, reconnect. Returns once all ready I/O has
    /// been drained; the caller sleeps between calls (see `beast-splitter`).
    pub fn tick(&mut self) -> io::Result<()> {
        let now = Instant::now();
        self.poll.poll(&mut self.events, Some(Duration::from_millis(0)))?;

        let ready: Vec<Token> = self.events.iter().filter(|e| e.is_readable()).map(|e| e.token()).collect();
        for token in ready {
            match self.find_token(token) {
                Some(Handle::Service(idx)) => self.accept_all(idx),
                Some(Handle::Client(idx)) => self.read_client(idx, now),
                None => {
                    let err = NetError::UnknownToken(token);
                    tracing::error!(%err, "received a poll event for a token that resolves to no service or client");
                }
            }
        }

        self.flush_heartbeats_and_timers(now);
        self.prune(now);
        self.reconnect(now);
        Ok(())
    }

    fn insert_client(&mut self, mut stream: mio::net::TcpStream, service: Option<usize>, mode: ReadMode) -> Option<usize> {
        if let Some(size) = self.config.sndbuf_size {
            set_socket_buf_size(&stream, size);
        }
        let token = self.alloc_token();
        if self.poll.registry().register(&mut stream, token, Interest::READABLE).is_err() {
            return None;
        }
        let client = Client::new(token, stream, service, mode);
        if let Some(idx) = self.free_slots.pop() {
            self.clients[idx] = Some(client);
            Some(idx)
        } else {
            self.clients.push(Some(client));
            Some(self.clients.len() - 1)
        }
    }

    fn accept_all(&mut self, service_idx: usize) {
        let mode = self.services[service_idx].mode;
        for listener_idx in 0..self.services[service_idx].listeners.len() {
            loop {
                let accepted = self.services[service_idx].listeners[listener_idx].1.accept();
                match accepted {
                    Ok((stream, _peer)) => {
                        if let Some(idx) = self.insert_client(stream, Some(service_idx), mode) {
                            self.services[service_idx].clients.push(idx);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        }
    }

    fn read_client(&mut self, client_idx: usize, now: Instant) {
        let status = self.client_mut(client_idx).read_into_buf();
        match status {
            Ok(ReadStatus::WouldBlock) => {}
            Ok(ReadStatus::Eof) | Err(_) => {
                self.client_mut(client_idx).close();
                return;
            }
            Ok(ReadStatus::Data(_)) => {}
        }

        match self.client(client_idx).mode {
            ReadMode::Ignore => {
                // IGNORE framing: discard all buffered bytes unconditionally.
                self.client_mut(client_idx).inbuf.clear();
            }
            ReadMode::BeastData => self.drain_frames(client_idx, now, scan_beast, true),
            ReadMode::BeastCommand => self.drain_frames(client_idx, now, scan_beast_command, false),
            ReadMode::AsciiDelimited => {
                let separator = self.client(client_idx).service.map(|s| self.services[s].ascii_separator.clone());
                let Some(separator) = separator else { return };
                loop {
                    let outcome = scan_ascii(&self.client(client_idx).inbuf, &separator);
                    match outcome {
                        ScanOutcome::NeedMoreData => break,
                        ScanOutcome::Skip { len } | ScanOutcome::Frame { len } => {
                            // ASCII records have no wired handler in this
                            // engine; they're consumed and dropped.
                            self.client_mut(client_idx).consume(len);
                        }
                    }
                }
            }
        }
    }

    /// Scans complete frames out of a client's inbuf with `scanner`,
    /// optionally broadcasting each one (`BEAST_DATA`'s input role) and
    /// always dropping consumed bytes from the buffer. `BEAST_COMMAND`
    /// frames are extracted but not broadcast — they have no semantic
    /// effect in this splitter.
    fn drain_frames(&mut self, client_idx: usize, now: Instant, scanner: fn(&[u8]) -> ScanOutcome, broadcast: bool) {
        let mut frame = [0u8; MAX_FRAME_LEN];
        loop {
            let outcome = scanner(&self.client(client_idx).inbuf);
            match outcome {
                ScanOutcome::NeedMoreData => break,
                ScanOutcome::Skip { len } => {
                    self.client_mut(client_idx).consume(len);
                }
                ScanOutcome::Frame { len } => {
                    if broadcast {
                        let slice = &mut frame[..len];
                        slice.copy_from_slice(&self.client(client_idx).inbuf[..len]);
                        self.client_mut(client_idx).consume(len);
                        self.broadcast(slice, now);
                    } else {
                        self.client_mut(client_idx).consume(len);
                    }
                }
            }
        }
    }

    /// Fans a frame out to every output-direction sink: buffered through
    /// each output service's `Writer`, and written straight through to each
    /// connected output dial target (which has no `Writer` of its own).
    fn broadcast(&mut self, frame: &[u8], now: Instant) {
        for service_idx in 0..self.services.len() {
            if self.services[service_idx].direction != Direction::Output {
                continue;
            }
            let must_flush = {
                let writer = self.services[service_idx].writer.as_mut().expect("output service has a writer");
                writer.push(frame, self.config.flush_size_bytes, now)
            };
            if must_flush {
                self.flush_service(service_idx, now);
                let writer = self.services[service_idx].writer.as_mut().expect("output service has a writer");
                writer.push(frame, self.config.flush_size_bytes, now);
            }
        }

        let dial_clients: Vec<usize> = self
            .dial_targets
            .iter()
            .filter(|d| d.direction == Direction::Output)
            .filter_map(|d| d.client)
            .collect();
        for idx in dial_clients {
            self.write_raw(idx, frame);
        }
    }

    fn write_raw(&mut self, client_idx: usize, bytes: &[u8]) {
        let client = match self.clients[client_idx].as_mut() {
            Some(c) if !c.closed => c,
            _ => return,
        };
        match client.stream.write(bytes) {
            Ok(n) if n == bytes.len() => {}
            // A short write or any error means the peer can't keep up or is
            // gone; per the no-throttling backpressure policy it's evicted
            // outright rather than queued or retried.
            _ => client.close(),
        }
    }

    fn flush_service(&mut self, service_idx: usize, now: Instant) {
        let bytes = {
            let Some(writer) = self.services[service_idx].writer.as_mut() else { return };
            if writer.is_empty() {
                return;
            }
            writer.take(now)
        };
        let targets = self.services[service_idx].clients.clone();
        for idx in targets {
            self.write_raw(idx, &bytes);
        }
    }

    /// Enqueues the heartbeat frame through the same prepareWrite/
    /// completeWrite-equivalent path as any broadcast frame (§4.1), rather
    /// than writing straight to each socket, then flushes it immediately —
    /// a heartbeat only fires while the writer is otherwise idle.
    fn send_heartbeat(&mut self, service_idx: usize, now: Instant) {
        {
            let writer = self.services[service_idx].writer.as_mut().expect("output service has a writer");
            writer.push(&BEAST_HEARTBEAT, self.config.flush_size_bytes, now);
        }
        self.flush_service(service_idx, now);
        if let Some(writer) = self.services[service_idx].writer.as_mut() {
            writer.note_heartbeat_sent(now);
        }
    }

    fn flush_heartbeats_and_timers(&mut self, now: Instant) {
        for service_idx in 0..self.services.len() {
            if self.services[service_idx].direction != Direction::Output {
                continue;
            }
            let (due_flush, due_heartbeat) = {
                let writer = self.services[service_idx].writer.as_ref().expect("output service has a writer");
                (
                    writer.due_for_time_flush(self.config.flush_interval, now),
                    writer.due_for_heartbeat(self.config.heartbeat_interval, now),
                )
            };
            if due_flush {
                self.flush_service(service_idx, now);
            }
            if due_heartbeat {
                self.send_heartbeat(service_idx, now);
            }
        }
    }

    /// Drops closed clients from every service's roster, clears any dial
    /// target pointing at one that just closed, and tombstones the slot in
    /// `clients` so every other stored index stays valid. Runs every tick so
    /// the invariant "no closed client survives a tick" always holds by the
    /// time it returns.
    fn prune(&mut self, _now: Instant) {
        let closed_idxs: Vec<usize> = self
            .clients
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| c.as_ref().filter(|c| c.closed).map(|_| idx))
            .collect();

        for &idx in &closed_idxs {
            if let Some(mut client) = self.clients[idx].take() {
                let _ = self.poll.registry().deregister(&mut client.stream);
            }
            self.free_slots.push(idx);
        }

        for service in &mut self.services {
            service.clients.retain(|idx| self.clients[*idx].is_some());
        }
        for dial in &mut self.dial_targets {
            if let Some(idx) = dial.client {
                if self.clients[idx].is_none() {
                    dial.client = None;
                }
            }
        }

        safe_assert!(
            self.clients.iter().all(|c| c.as_ref().is_none_or(|c| !c.closed)),
            "closed client survived prune"
        );
    }

    fn reconnect(&mut self, now: Instant) {
        for i in 0..self.dial_targets.len() {
            if self.dial_targets[i].is_connected() {
                continue;
            }
            if !self.dial_targets[i].backoff.fired_at(now) {
                continue;
            }
            let addr = self.dial_targets[i].addr;
            let direction = self.dial_targets[i].direction;
            match mio::net::TcpStream::connect(addr) {
                Ok(stream) => {
                    let mode = match direction {
                        Direction::Input => ReadMode::BeastData,
                        Direction::Output => ReadMode::Ignore,
                    };
                    if let Some(idx) = self.insert_client(stream, None, mode) {
                        self.dial_targets[i].client = Some(idx);
                    }
                }
                Err(_) => {
                    self.dial_targets[i].backoff.reset_at(now);
                }
            }
        }
    }
}

fn set_socket_buf_size(stream: &mio::net::TcpStream, size: usize) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let size = size as libc::c_int;
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Read, net::TcpStream, thread};

    #[test]
    fn reattach_moves_a_client_between_services() {
        let mut engine = Engine::new(Config::default()).expect("engine");
        let a = engine
            .add_service(&["127.0.0.1:0".parse().unwrap()], Direction::Output, ReadMode::Ignore)
            .expect("service a");
        let b = engine
            .add_service(&["127.0.0.1:0".parse().unwrap()], Direction::Output, ReadMode::Ignore)
            .expect("service b");
        let addr_a = engine.service_local_addr(a, 0).unwrap();

        let client_thread = thread::spawn(move || {
            let mut s = TcpStream::connect(addr_a).expect("connect");
            s.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
            let mut buf = [0u8; 64];
            let _ = s.read(&mut buf);
        });

        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline && engine.services[a].clients.is_empty() {
            engine.tick().expect("tick");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(engine.services[a].clients.len(), 1);
        let client_idx = engine.services[a].clients[0];

        engine.reattach_client(client_idx, b);

        assert!(engine.services[a].clients.is_empty());
        assert_eq!(engine.services[b].clients, vec![client_idx]);
        assert_eq!(engine.client(client_idx).service, Some(b));

        client_thread.join().unwrap();
    }
}
