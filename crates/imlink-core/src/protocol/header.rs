//! Fixed 12-byte frame header.
//!
//! ```text
//! +----------------+----------------+-----+---------+-------+----------+
//! | body_len (u32) | seq (i32)      | cmd | version | flags | reserved |
//! +----------------+----------------+-----+---------+-------+----------+
//! ```
//! All multi-byte fields are big-endian.

use bytes::{Buf, BufMut};

use crate::error::{ImlinkError, Result};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 12;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Number of body bytes following the header.
    pub body_len: u32,
    /// Per-connection sequence number.
    pub seq: i32,
    /// Raw command byte.
    pub cmd: u8,
    /// Protocol version.
    pub version: u8,
    /// Flag bits (see `protocol::flags`).
    pub flags: u8,
    /// Always zero on send; ignored on receive.
    pub reserved: u8,
}

impl FrameHeader {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32(self.body_len);
        dst.put_i32(self.seq);
        dst.put_u8(self.cmd);
        dst.put_u8(self.version);
        dst.put_u8(self.flags);
        dst.put_u8(self.reserved);
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut dst = &mut out[..];
        self.encode(&mut dst);
        out
    }

    /// Decode from the first 12 bytes of `buf`.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < HEADER_SIZE {
            return Err(ImlinkError::ShortRead {
                needed: HEADER_SIZE,
                got: buf.remaining(),
            });
        }
        Ok(Self {
            body_len: buf.get_u32(),
            seq: buf.get_i32(),
            cmd: buf.get_u8(),
            version: buf.get_u8(),
            flags: buf.get_u8(),
            reserved: buf.get_u8(),
        })
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}
