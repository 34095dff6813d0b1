//! Frame codec: header + typed body.
//!
//! Decoding is two-phase. The header is read first; `body_len` then decides
//! how many further bytes belong to the frame. A buffer that ends inside
//! either phase is a transport failure (`ShortRead`), not a malformed body:
//! once the byte stream is desynchronized there is nothing to resync on.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ImlinkError, Result};

use super::header::{FrameHeader, HEADER_SIZE};
use super::message::Message;
use super::{flags, DEFAULT_VERSION};

/// A complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: i32,
    pub version: u8,
    pub flags: u8,
    pub message: Message,
}

impl Frame {
    pub fn new(seq: i32, message: Message) -> Self {
        Self {
            seq,
            version: DEFAULT_VERSION,
            flags: 0,
            message,
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Server delivered this proactively, outside a sync window.
    pub fn is_push(&self) -> bool {
        self.has_flag(flags::PUSH)
    }

    /// Append header + body to `dst`. The header's `body_len` is patched in
    /// after the body is written, so it always equals the serialized length.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        dst.put_bytes(0, HEADER_SIZE);
        if let Err(e) = self.message.encode_body(self.version, dst) {
            dst.truncate(start);
            return Err(e);
        }

        let body_len = dst.len() - start - HEADER_SIZE;
        let body_len = u32::try_from(body_len).map_err(|_| ImlinkError::FrameTooLarge {
            len: body_len,
            max: u32::MAX as usize,
        })?;
        let header = FrameHeader {
            body_len,
            seq: self.seq,
            cmd: self.message.cmd_byte(),
            version: self.version,
            flags: self.flags | self.message.implied_flags(),
            reserved: 0,
        };
        dst[start..start + HEADER_SIZE].copy_from_slice(&header.to_bytes());
        Ok(())
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + 32);
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Header plus undecoded body, as cut from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl RawFrame {
    /// Decode the body. Unknown commands succeed as `Message::Unknown`.
    pub fn decode(self) -> Result<Frame> {
        let h = self.header;
        let message = Message::decode_body(h.cmd, h.version, h.flags, self.body)?;
        Ok(Frame {
            seq: h.seq,
            version: h.version,
            flags: h.flags,
            message,
        })
    }
}

/// Cut one frame off the front of `buf` if it is complete.
///
/// Returns `Ok(None)` while more bytes are needed; nothing is consumed in
/// that case. Header-only frames (`body_len == 0`) are returned as soon as
/// the header is present.
pub fn split_frame(buf: &mut BytesMut, max_body: usize) -> Result<Option<RawFrame>> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }
    let header = FrameHeader::decode(&buf[..HEADER_SIZE])?;
    let body_len = header.body_len as usize;
    if body_len > max_body {
        return Err(ImlinkError::FrameTooLarge {
            len: body_len,
            max: max_body,
        });
    }

    if body_len == 0 {
        buf.advance(HEADER_SIZE);
        return Ok(Some(RawFrame {
            header,
            body: Bytes::new(),
        }));
    }

    let total = HEADER_SIZE + body_len;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    buf.advance(HEADER_SIZE);
    let body = buf.split_to(body_len).freeze();
    Ok(Some(RawFrame { header, body }))
}

/// Decode a buffer holding exactly one frame (trailing bytes are ignored).
pub fn decode_frame(mut buf: Bytes) -> Result<Frame> {
    let header = FrameHeader::decode(&buf)?;
    buf.advance(HEADER_SIZE);
    let body_len = header.body_len as usize;
    if buf.remaining() < body_len {
        return Err(ImlinkError::ShortRead {
            needed: body_len,
            got: buf.remaining(),
        });
    }
    let body = buf.split_to(body_len);
    RawFrame { header, body }.decode()
}
