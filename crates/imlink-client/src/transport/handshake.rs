//! Token authentication on a fresh connection.
//!
//! Exactly one `auth_token` frame goes out with sequence 1 and exactly one
//! reply is read. No retries happen here; the caller decides whether to
//! reconnect.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::{AuthToken, Frame, Message};

use super::codec::{FrameReader, FrameWriter};

/// Sequence carried by the auth frame; regular sends continue after it.
pub const HANDSHAKE_SEQ: i32 = 1;

pub async fn authenticate<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    auth: AuthToken,
    version: u8,
    timeout: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let frame = Frame::new(HANDSHAKE_SEQ, Message::AuthToken(auth)).with_version(version);
    writer.write_frame(&frame).await?;

    let reply = tokio::time::timeout(timeout, reader.next_frame())
        .await
        .map_err(|_| ImlinkError::Timeout("auth_status"))??;

    match reply.message {
        Message::AuthStatus(0) => Ok(()),
        Message::AuthStatus(status) => {
            tracing::warn!(status, "authentication rejected");
            Err(ImlinkError::AuthFailed(status))
        }
        other => Err(ImlinkError::UnexpectedCommand {
            expected: "auth_status",
            got: other.name(),
        }),
    }
}
