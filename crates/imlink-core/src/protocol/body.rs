//! Fixed-width command bodies.
//!
//! Each body reads its fixed prefix and, where the layout has one, takes
//! "everything remaining" as content. A body shorter than its fixed prefix
//! is reported as `ImlinkError::Malformed`.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{ImlinkError, Result};

/// Ack status codes (protocol version 2 and later).
pub mod ack_status {
    pub const SUCCESS: i8 = 0;
    pub const NOT_MY_FRIEND: i8 = 1;
    pub const NOT_YOUR_FRIEND: i8 = 2;
    pub const IN_YOUR_BLACKLIST: i8 = 3;
    pub const NOT_GROUP_MEMBER: i8 = 64;
    pub const GROUP_NONEXIST: i8 = 65;
}

fn need(buf: &Bytes, n: usize, cmd: &'static str) -> Result<()> {
    if buf.remaining() < n {
        return Err(ImlinkError::malformed(
            cmd,
            format!("need {n} bytes, got {}", buf.remaining()),
        ));
    }
    Ok(())
}

fn rest(buf: &mut Bytes) -> Bytes {
    buf.copy_to_bytes(buf.remaining())
}

/// Peer or group message. The timestamp and message id are provisional
/// until the server stamps them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImMessage {
    pub sender: i64,
    pub receiver: i64,
    /// Absent on the wire in protocol version 0.
    pub timestamp: i32,
    pub msgid: i32,
    pub content: Bytes,
}

impl ImMessage {
    pub fn new(sender: i64, receiver: i64, content: impl Into<Bytes>) -> Self {
        Self {
            sender,
            receiver,
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn encode<B: BufMut>(&self, version: u8, dst: &mut B) {
        dst.put_i64(self.sender);
        dst.put_i64(self.receiver);
        if version > 0 {
            dst.put_i32(self.timestamp);
        }
        dst.put_i32(self.msgid);
        dst.put_slice(&self.content);
    }

    pub fn decode(version: u8, mut buf: Bytes, cmd: &'static str) -> Result<Self> {
        if version == 0 {
            need(&buf, 20, cmd)?;
            Ok(Self {
                sender: buf.get_i64(),
                receiver: buf.get_i64(),
                timestamp: 0,
                msgid: buf.get_i32(),
                content: rest(&mut buf),
            })
        } else {
            need(&buf, 24, cmd)?;
            Ok(Self {
                sender: buf.get_i64(),
                receiver: buf.get_i64(),
                timestamp: buf.get_i32(),
                msgid: buf.get_i32(),
                content: rest(&mut buf),
            })
        }
    }
}

/// Server receipt for a client frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Sequence of the frame being acknowledged.
    pub seq: i32,
    /// Only carried by protocol version 2 and later; `SUCCESS` otherwise.
    pub status: i8,
}

impl Ack {
    pub fn new(seq: i32) -> Self {
        Self {
            seq,
            status: ack_status::SUCCESS,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ack_status::SUCCESS
    }

    pub fn encode<B: BufMut>(&self, version: u8, dst: &mut B) {
        dst.put_i32(self.seq);
        if version > 1 {
            dst.put_i8(self.status);
        }
    }

    pub fn decode(version: u8, mut buf: Bytes) -> Result<Self> {
        need(&buf, 4, "ack")?;
        let seq = buf.get_i32();
        // Older servers send 4 bytes even when the header says version 2.
        let status = if version > 1 && buf.has_remaining() {
            buf.get_i8()
        } else {
            ack_status::SUCCESS
        };
        Ok(Self { seq, status })
    }
}

/// Recipient-side delivery notice for a peer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAck {
    pub sender: i64,
    pub receiver: i64,
    pub msgid: i32,
}

impl PeerAck {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.sender);
        dst.put_i64(self.receiver);
        dst.put_i32(self.msgid);
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        need(&buf, 20, "peer_ack")?;
        Ok(Self {
            sender: buf.get_i64(),
            receiver: buf.get_i64(),
            msgid: buf.get_i32(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typing {
    pub sender: i64,
    pub receiver: i64,
}

impl Typing {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.sender);
        dst.put_i64(self.receiver);
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        need(&buf, 16, "typing")?;
        Ok(Self {
            sender: buf.get_i64(),
            receiver: buf.get_i64(),
        })
    }
}

/// `count (i32)` followed by `count` user ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscribePresence {
    pub uids: Vec<i64>,
}

impl SubscribePresence {
    pub fn encode<B: BufMut>(&self, dst: &mut B) -> Result<()> {
        let count = i32::try_from(self.uids.len())
            .map_err(|_| ImlinkError::malformed("subscribe_presence", "too many uids"))?;
        dst.put_i32(count);
        for uid in &self.uids {
            dst.put_i64(*uid);
        }
        Ok(())
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        need(&buf, 4, "subscribe_presence")?;
        let count = buf.get_i32();
        let count = usize::try_from(count)
            .map_err(|_| ImlinkError::malformed("subscribe_presence", "negative count"))?;
        need(&buf, count.saturating_mul(8), "subscribe_presence")?;
        let uids = (0..count).map(|_| buf.get_i64()).collect();
        Ok(Self { uids })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub uid: i64,
    /// Non-zero when online.
    pub online: i32,
}

impl PresenceUpdate {
    pub fn is_online(&self) -> bool {
        self.online != 0
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.uid);
        dst.put_i32(self.online);
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        need(&buf, 12, "presence_update")?;
        Ok(Self {
            uid: buf.get_i64(),
            online: buf.get_i32(),
        })
    }
}

/// Another device of the same user logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPoint {
    pub up_timestamp: i32,
    pub platform_id: u8,
    pub device_id: String,
}

impl LoginPoint {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i32(self.up_timestamp);
        dst.put_u8(self.platform_id);
        dst.put_slice(self.device_id.as_bytes());
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        need(&buf, 5, "login_point")?;
        let up_timestamp = buf.get_i32();
        let platform_id = buf.get_u8();
        let device_id = String::from_utf8(rest(&mut buf).to_vec())
            .map_err(|e| ImlinkError::malformed("login_point", format!("device id not utf-8: {e}")))?;
        Ok(Self {
            up_timestamp,
            platform_id,
            device_id,
        })
    }
}

/// RT and room messages. Never persisted, so no timestamp or id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RtMessage {
    pub sender: i64,
    /// Peer uid for RT, room id for room messages.
    pub receiver: i64,
    pub content: Bytes,
}

impl RtMessage {
    pub fn new(sender: i64, receiver: i64, content: impl Into<Bytes>) -> Self {
        Self {
            sender,
            receiver,
            content: content.into(),
        }
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.sender);
        dst.put_i64(self.receiver);
        dst.put_slice(&self.content);
    }

    pub fn decode(mut buf: Bytes, cmd: &'static str) -> Result<Self> {
        need(&buf, 16, cmd)?;
        Ok(Self {
            sender: buf.get_i64(),
            receiver: buf.get_i64(),
            content: rest(&mut buf),
        })
    }
}

/// Customer <-> customer-support message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerMessage {
    pub customer_appid: i64,
    pub customer_id: i64,
    pub store_id: i64,
    pub seller_id: i64,
    pub timestamp: i32,
    /// Mirrors the absence of the header's `UNPERSISTENT` flag.
    pub persistent: bool,
    pub content: Bytes,
}

impl CustomerMessage {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.customer_appid);
        dst.put_i64(self.customer_id);
        dst.put_i64(self.store_id);
        dst.put_i64(self.seller_id);
        dst.put_i32(self.timestamp);
        dst.put_slice(&self.content);
    }

    pub fn decode(mut buf: Bytes, persistent: bool, cmd: &'static str) -> Result<Self> {
        need(&buf, 36, cmd)?;
        Ok(Self {
            customer_appid: buf.get_i64(),
            customer_id: buf.get_i64(),
            store_id: buf.get_i64(),
            seller_id: buf.get_i64(),
            timestamp: buf.get_i32(),
            persistent,
            content: rest(&mut buf),
        })
    }
}

/// Group-scoped sync cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSyncKey {
    pub group_id: i64,
    pub sync_key: i64,
}

impl GroupSyncKey {
    pub fn new(group_id: i64, sync_key: i64) -> Self {
        Self { group_id, sync_key }
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.group_id);
        dst.put_i64(self.sync_key);
    }

    pub fn decode(mut buf: Bytes, cmd: &'static str) -> Result<Self> {
        need(&buf, 16, cmd)?;
        Ok(Self {
            group_id: buf.get_i64(),
            sync_key: buf.get_i64(),
        })
    }
}

pub(crate) fn decode_i64(mut buf: Bytes, cmd: &'static str) -> Result<i64> {
    need(&buf, 8, cmd)?;
    Ok(buf.get_i64())
}

pub(crate) fn decode_i32(mut buf: Bytes, cmd: &'static str) -> Result<i32> {
    need(&buf, 4, cmd)?;
    Ok(buf.get_i32())
}

/// Sync position of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub sync_key: i64,
    pub prev_sync_key: i64,
}

impl Metadata {
    const PADDING: usize = 16;

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64(self.sync_key);
        dst.put_i64(self.prev_sync_key);
        dst.put_bytes(0, Self::PADDING);
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        need(&buf, 16 + Self::PADDING, "metadata")?;
        Ok(Self {
            sync_key: buf.get_i64(),
            prev_sync_key: buf.get_i64(),
        })
    }
}
