//! Auth token sub-codec.
//!
//! Unlike every other body, the auth token is a sequence of 1-byte
//! length-prefixed strings:
//!
//! ```text
//! platform_id (u8) | token_len (u8) | token | device_len (u8) | device_id
//! ```

use bytes::{Buf, BufMut, Bytes};

use crate::error::{ImlinkError, Result};

const CMD: &str = "auth_token";

/// Longest string a 1-byte length prefix can describe.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub platform_id: u8,
    pub token: String,
    pub device_id: String,
}

impl AuthToken {
    pub fn new(platform_id: u8, token: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            platform_id,
            token: token.into(),
            device_id: device_id.into(),
        }
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) -> Result<()> {
        dst.put_u8(self.platform_id);
        put_short_str(dst, "token", &self.token)?;
        put_short_str(dst, "device_id", &self.device_id)?;
        Ok(())
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if buf.remaining() < 3 {
            return Err(ImlinkError::malformed(CMD, "body shorter than 3 bytes"));
        }
        let platform_id = buf.get_u8();
        let token = get_short_str(&mut buf, "token")?;
        let device_id = get_short_str(&mut buf, "device_id")?;
        Ok(Self {
            platform_id,
            token,
            device_id,
        })
    }
}

fn put_short_str<B: BufMut>(dst: &mut B, field: &'static str, s: &str) -> Result<()> {
    let len = s.len();
    let prefix = u8::try_from(len).map_err(|_| ImlinkError::AuthFieldTooLong { field, len })?;
    dst.put_u8(prefix);
    dst.put_slice(s.as_bytes());
    Ok(())
}

fn get_short_str(buf: &mut Bytes, field: &'static str) -> Result<String> {
    if !buf.has_remaining() {
        return Err(ImlinkError::malformed(CMD, format!("missing {field} length")));
    }
    let len = buf.get_u8() as usize;
    if buf.remaining() < len {
        return Err(ImlinkError::malformed(
            CMD,
            format!("{field} length {len} exceeds remaining {}", buf.remaining()),
        ));
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| ImlinkError::malformed(CMD, format!("{field} not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use bytes::BytesMut;

    #[test]
    fn max_length_fields_fit() {
        let auth = AuthToken::new(2, "t".repeat(MAX_FIELD_LEN), "d".repeat(MAX_FIELD_LEN));
        let mut buf = BytesMut::new();
        auth.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 1 + 1 + MAX_FIELD_LEN + 1 + MAX_FIELD_LEN);
        assert_eq!(AuthToken::decode(buf.freeze()).unwrap(), auth);
    }

    #[test]
    fn overlong_token_is_rejected() {
        let auth = AuthToken::new(2, "t".repeat(MAX_FIELD_LEN + 1), "dev");
        let mut buf = BytesMut::new();
        let err = auth.encode(&mut buf).unwrap_err();
        assert!(matches!(err, ImlinkError::AuthFieldTooLong { field: "token", len: 256 }));
    }

    #[test]
    fn empty_strings() {
        let auth = AuthToken::new(4, "", "");
        let mut buf = BytesMut::new();
        auth.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[4, 0, 0]);
        assert_eq!(AuthToken::decode(buf.freeze()).unwrap(), auth);
    }

    #[test]
    fn truncated_device_id() {
        // platform 2, token "ab", device length 5 but only 2 bytes follow
        let raw = Bytes::from_static(&[2, 2, b'a', b'b', 5, b'x', b'y']);
        let err = AuthToken::decode(raw).unwrap_err();
        assert_eq!(err.code().as_str(), "MALFORMED");
    }
}
