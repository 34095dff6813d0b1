//! Frame reader/writer over async byte streams.
//!
//! `FrameReader` keeps unconsumed bytes in its own buffer, so a pending
//! `next_raw` can be dropped (e.g. by a `select!` timer) without losing data.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::{split_frame, Frame, FrameHeader, RawFrame, HEADER_SIZE};

const READ_CHUNK: usize = 8 * 1024;

pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_body: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_body: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            max_body,
        }
    }

    /// Next complete frame, body undecoded. Cancel-safe.
    ///
    /// EOF on a frame boundary is `ConnectionClosed`; EOF inside a frame is
    /// `ShortRead`. Both are transport faults.
    pub async fn next_raw(&mut self) -> Result<RawFrame> {
        loop {
            if let Some(raw) = split_frame(&mut self.buf, self.max_body)? {
                return Ok(raw);
            }
            if self.buf.capacity() - self.buf.len() < READ_CHUNK / 2 {
                self.buf.reserve(READ_CHUNK);
            }
            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(self.eof_error());
            }
        }
    }

    /// Next frame with its body decoded.
    pub async fn next_frame(&mut self) -> Result<Frame> {
        self.next_raw().await?.decode()
    }

    fn eof_error(&self) -> ImlinkError {
        if self.buf.is_empty() {
            return ImlinkError::ConnectionClosed;
        }
        let needed = match FrameHeader::decode(&self.buf) {
            Ok(h) => HEADER_SIZE + h.body_len as usize,
            Err(_) => HEADER_SIZE,
        };
        ImlinkError::ShortRead {
            needed,
            got: self.buf.len(),
        }
    }
}

pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Encode and write one frame as a single contiguous write.
    ///
    /// Encoding errors leave the stream untouched; I/O errors are transport
    /// faults.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        frame.encode_into(&mut self.buf)?;
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
