//! Non-blocking engine for splitting and aggregating BEAST-framed Mode-S
//! radar message streams across any number of TCP listeners and dialed
//! peers.
//!
//! The engine itself knows nothing about decoding ADS-B payloads — it moves
//! already-framed bytes between sockets. `Engine::tick` runs one pass of the
//! accept/read/heartbeat/flush/prune/reconnect phases; callers (see the
//! `beast-splitter` binary) drive it in a loop.

pub mod assert;
pub mod client;
pub mod config;
pub mod dial;
pub mod engine;
pub mod error;
pub mod framer;
pub mod service;
pub mod timing;
pub mod writer;

pub use client::Client;
pub use config::Config;
pub use dial::{DialTarget, Direction};
pub use engine::Engine;
pub use error::NetError;
pub use service::{ReadMode, Service};
