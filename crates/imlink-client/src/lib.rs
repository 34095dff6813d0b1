//! imlink client engine.
//!
//! Wires the transport codec, token handshake, delivery tracker, sync engine,
//! and keepalive supervisor into sessions over any async byte stream. It is
//! consumed by the binary (`main.rs`) and by integration tests, which drive
//! sessions against in-memory fake servers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod delivery;
pub mod keepalive;
pub mod session;
pub mod sync;
pub mod token;
pub mod transport;

pub use client::Client;
pub use session::{ConnState, Event, Origin, Session, SessionHandle};
pub use sync::SyncScope;
pub use token::{StaticToken, TokenProvider};
