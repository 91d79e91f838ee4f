use std::{net::Ipv4Addr, time::Duration};

use beast_net::Config;
use clap::Parser;

/// Splits and aggregates BEAST-framed Mode-S streams across any number of
/// listeners and dialed peers.
#[derive(Parser, Debug)]
#[command(name = "beast-splitter", version, about)]
pub struct Cli {
    /// Dial a BEAST_DATA input peer at host:port (repeatable).
    #[arg(long = "in-connect", value_name = "HOST:PORT")]
    pub in_connect: Vec<std::net::SocketAddr>,

    /// Dial an output peer at host:port (repeatable).
    #[arg(long = "out-connect", value_name = "HOST:PORT")]
    pub out_connect: Vec<std::net::SocketAddr>,

    /// Bind a beast-server-input listener on each port in this
    /// comma-separated list, as one new service (repeatable).
    #[arg(long = "in-server", value_name = "PORT[,PORT...]")]
    pub in_server: Vec<String>,

    /// Bind a beast-server-output listener on each port in this
    /// comma-separated list, as one new service (repeatable).
    #[arg(long = "out-server", value_name = "PORT[,PORT...]")]
    pub out_server: Vec<String>,

    /// Bind address used by listeners created from `--in-server`/`--out-server`.
    #[arg(long = "net-bind-address", default_value = "0.0.0.0")]
    pub net_bind_address: Ipv4Addr,

    /// Milliseconds of output-service idle time before a heartbeat is sent.
    #[arg(long, default_value_t = 60_000)]
    pub heartbeat_interval_ms: u64,

    /// Output writer flush threshold, in bytes.
    #[arg(long, default_value_t = 1024)]
    pub flush_size_bytes: usize,

    /// Output writer flush threshold, in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub flush_interval_ms: u64,

    /// Milliseconds between reconnect attempts for a dial target.
    #[arg(long, default_value_t = 10_000)]
    pub reconnect_interval_ms: u64,

    /// Override SO_SNDBUF/SO_RCVBUF on every socket the engine opens.
    #[arg(long)]
    pub sndbuf_size: Option<usize>,

    /// Log level passed through to `tracing_subscriber::EnvFilter`.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn engine_config(&self) -> Config {
        Config {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            flush_size_bytes: self.flush_size_bytes,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            sndbuf_size: self.sndbuf_size,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            ..Config::default()
        }
    }

    /// Parses one `--in-server`/`--out-server` occurrence's comma-separated
    /// port list into bind addresses under `net_bind_address`.
    pub fn server_group(&self, raw: &str) -> Result<Vec<std::net::SocketAddr>, String> {
        raw.split(',')
            .map(|p| {
                p.trim()
                    .parse::<u16>()
                    .map(|port| std::net::SocketAddr::new(self.net_bind_address.into(), port))
                    .map_err(|_| format!("invalid port in --in-server/--out-server list: {p:?}"))
            })
            .collect()
    }

    pub fn endpoint_count(&self) -> usize {
        self.in_connect.len() + self.out_connect.len() + self.in_server.len() + self.out_server.len()
    }
}
