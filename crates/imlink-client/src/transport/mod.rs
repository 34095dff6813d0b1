//! Transport layer (length-prefixed frames over a byte stream).
//!
//! The codec turns any `AsyncRead`/`AsyncWrite` pair into a frame source and
//! sink; `handshake` runs the token authentication on a fresh connection.

pub mod codec;
pub mod handshake;

use std::time::Duration;

use tokio::net::TcpStream;

use imlink_core::error::{ImlinkError, Result};

/// Open a TCP connection to `addr` within `timeout`.
pub async fn connect_tcp(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ImlinkError::Timeout("tcp connect"))??;
    stream.set_nodelay(true)?;
    tracing::debug!(%addr, "tcp connected");
    Ok(stream)
}
