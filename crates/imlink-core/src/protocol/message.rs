//! Typed message variants and the command-keyed body dispatch.

use bytes::{BufMut, Bytes};

use crate::error::Result;

use super::auth::AuthToken;
use super::body::{
    decode_i32, decode_i64, Ack, CustomerMessage, GroupSyncKey, ImMessage, LoginPoint,
    Metadata, PeerAck, PresenceUpdate, RtMessage, SubscribePresence, Typing,
};
use super::command::Command;
use super::flags;

/// One decoded body, tagged by its command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Heartbeat,
    AuthToken(AuthToken),
    /// `0` means success.
    AuthStatus(i32),
    Im(ImMessage),
    Ack(Ack),
    Rst,
    GroupNotification(Bytes),
    GroupIm(ImMessage),
    PeerAck(PeerAck),
    Typing(Typing),
    SubscribePresence(SubscribePresence),
    PresenceUpdate(PresenceUpdate),
    Ping,
    Pong,
    LoginPoint(LoginPoint),
    Rt(RtMessage),
    EnterRoom(i64),
    LeaveRoom(i64),
    RoomIm(RtMessage),
    System(Bytes),
    UnreadCount(i32),
    Customer(CustomerMessage),
    CustomerSupport(CustomerMessage),
    /// Client asks for everything after `sync_key`.
    Sync { sync_key: i64 },
    SyncBegin { sync_key: i64 },
    SyncEnd { sync_key: i64 },
    SyncNotify { sync_key: i64 },
    SyncGroup(GroupSyncKey),
    SyncGroupBegin(GroupSyncKey),
    SyncGroupEnd(GroupSyncKey),
    SyncGroupNotify(GroupSyncKey),
    /// Client confirms a persisted cursor so the server can prune.
    SyncKey { sync_key: i64 },
    GroupSyncKey(GroupSyncKey),
    Notification(Bytes),
    Metadata(Metadata),
    /// Well-framed but unrecognized command, kept opaque.
    Unknown { cmd: u8, body: Bytes },
}

impl Message {
    /// Known command, `None` for `Unknown`.
    pub fn command(&self) -> Option<Command> {
        let cmd = match self {
            Message::Heartbeat => Command::Heartbeat,
            Message::AuthToken(_) => Command::AuthToken,
            Message::AuthStatus(_) => Command::AuthStatus,
            Message::Im(_) => Command::Im,
            Message::Ack(_) => Command::Ack,
            Message::Rst => Command::Rst,
            Message::GroupNotification(_) => Command::GroupNotification,
            Message::GroupIm(_) => Command::GroupIm,
            Message::PeerAck(_) => Command::PeerAck,
            Message::Typing(_) => Command::Typing,
            Message::SubscribePresence(_) => Command::SubscribePresence,
            Message::PresenceUpdate(_) => Command::PresenceUpdate,
            Message::Ping => Command::Ping,
            Message::Pong => Command::Pong,
            Message::LoginPoint(_) => Command::LoginPoint,
            Message::Rt(_) => Command::Rt,
            Message::EnterRoom(_) => Command::EnterRoom,
            Message::LeaveRoom(_) => Command::LeaveRoom,
            Message::RoomIm(_) => Command::RoomIm,
            Message::System(_) => Command::System,
            Message::UnreadCount(_) => Command::UnreadCount,
            Message::Customer(_) => Command::Customer,
            Message::CustomerSupport(_) => Command::CustomerSupport,
            Message::Sync { .. } => Command::Sync,
            Message::SyncBegin { .. } => Command::SyncBegin,
            Message::SyncEnd { .. } => Command::SyncEnd,
            Message::SyncNotify { .. } => Command::SyncNotify,
            Message::SyncGroup(_) => Command::SyncGroup,
            Message::SyncGroupBegin(_) => Command::SyncGroupBegin,
            Message::SyncGroupEnd(_) => Command::SyncGroupEnd,
            Message::SyncGroupNotify(_) => Command::SyncGroupNotify,
            Message::SyncKey { .. } => Command::SyncKey,
            Message::GroupSyncKey(_) => Command::GroupSyncKey,
            Message::Notification(_) => Command::Notification,
            Message::Metadata(_) => Command::Metadata,
            Message::Unknown { .. } => return None,
        };
        Some(cmd)
    }

    /// Raw command byte written to the header.
    pub fn cmd_byte(&self) -> u8 {
        match self {
            Message::Unknown { cmd, .. } => *cmd,
            other => other.command().map(Command::as_u8).unwrap_or_default(),
        }
    }

    /// Name for logs.
    pub fn name(&self) -> String {
        match self.command() {
            Some(c) => c.name().to_string(),
            None => format!("unknown({})", self.cmd_byte()),
        }
    }

    /// Flag bits implied by the body itself, OR-ed into the header on send.
    pub fn implied_flags(&self) -> u8 {
        match self {
            Message::Customer(m) | Message::CustomerSupport(m) if !m.persistent => {
                flags::UNPERSISTENT
            }
            _ => 0,
        }
    }

    pub fn encode_body<B: BufMut>(&self, version: u8, dst: &mut B) -> Result<()> {
        match self {
            Message::Heartbeat | Message::Rst | Message::Ping | Message::Pong => {}
            Message::AuthToken(a) => a.encode(dst)?,
            Message::AuthStatus(status) => dst.put_i32(*status),
            Message::Im(m) | Message::GroupIm(m) => m.encode(version, dst),
            Message::Ack(a) => a.encode(version, dst),
            Message::GroupNotification(b)
            | Message::System(b)
            | Message::Notification(b) => dst.put_slice(b),
            Message::PeerAck(p) => p.encode(dst),
            Message::Typing(t) => t.encode(dst),
            Message::SubscribePresence(s) => s.encode(dst)?,
            Message::PresenceUpdate(p) => p.encode(dst),
            Message::LoginPoint(l) => l.encode(dst),
            Message::Rt(m) | Message::RoomIm(m) => m.encode(dst),
            Message::EnterRoom(room) | Message::LeaveRoom(room) => dst.put_i64(*room),
            Message::UnreadCount(n) => dst.put_i32(*n),
            Message::Customer(m) | Message::CustomerSupport(m) => m.encode(dst),
            Message::Sync { sync_key }
            | Message::SyncBegin { sync_key }
            | Message::SyncEnd { sync_key }
            | Message::SyncNotify { sync_key }
            | Message::SyncKey { sync_key } => dst.put_i64(*sync_key),
            Message::SyncGroup(k)
            | Message::SyncGroupBegin(k)
            | Message::SyncGroupEnd(k)
            | Message::SyncGroupNotify(k)
            | Message::GroupSyncKey(k) => k.encode(dst),
            Message::Metadata(m) => m.encode(dst),
            Message::Unknown { body, .. } => dst.put_slice(body),
        }
        Ok(())
    }

    /// Decode a body according to its command byte.
    pub fn decode_body(cmd: u8, version: u8, frame_flags: u8, body: Bytes) -> Result<Self> {
        let Some(command) = Command::from_u8(cmd) else {
            return Ok(Message::Unknown { cmd, body });
        };
        let name = command.name();
        let persistent = frame_flags & flags::UNPERSISTENT == 0;

        let msg = match command {
            Command::Heartbeat => Message::Heartbeat,
            Command::Rst => Message::Rst,
            Command::Ping => Message::Ping,
            Command::Pong => Message::Pong,
            Command::AuthToken => Message::AuthToken(AuthToken::decode(body)?),
            Command::AuthStatus => Message::AuthStatus(decode_i32(body, name)?),
            Command::Im => Message::Im(ImMessage::decode(version, body, name)?),
            Command::GroupIm => Message::GroupIm(ImMessage::decode(version, body, name)?),
            Command::Ack => Message::Ack(Ack::decode(version, body)?),
            Command::GroupNotification => Message::GroupNotification(body),
            Command::System => Message::System(body),
            Command::Notification => Message::Notification(body),
            Command::PeerAck => Message::PeerAck(PeerAck::decode(body)?),
            Command::Typing => Message::Typing(Typing::decode(body)?),
            Command::SubscribePresence => {
                Message::SubscribePresence(SubscribePresence::decode(body)?)
            }
            Command::PresenceUpdate => Message::PresenceUpdate(PresenceUpdate::decode(body)?),
            Command::LoginPoint => Message::LoginPoint(LoginPoint::decode(body)?),
            Command::Rt => Message::Rt(RtMessage::decode(body, name)?),
            Command::RoomIm => Message::RoomIm(RtMessage::decode(body, name)?),
            Command::EnterRoom => Message::EnterRoom(decode_i64(body, name)?),
            Command::LeaveRoom => Message::LeaveRoom(decode_i64(body, name)?),
            Command::UnreadCount => Message::UnreadCount(decode_i32(body, name)?),
            Command::Customer => {
                Message::Customer(CustomerMessage::decode(body, persistent, name)?)
            }
            Command::CustomerSupport => {
                Message::CustomerSupport(CustomerMessage::decode(body, persistent, name)?)
            }
            Command::Sync => Message::Sync {
                sync_key: decode_i64(body, name)?,
            },
            Command::SyncBegin => Message::SyncBegin {
                sync_key: decode_i64(body, name)?,
            },
            Command::SyncEnd => Message::SyncEnd {
                sync_key: decode_i64(body, name)?,
            },
            Command::SyncNotify => Message::SyncNotify {
                sync_key: decode_i64(body, name)?,
            },
            Command::SyncKey => Message::SyncKey {
                sync_key: decode_i64(body, name)?,
            },
            Command::SyncGroup => Message::SyncGroup(GroupSyncKey::decode(body, name)?),
            Command::SyncGroupBegin => Message::SyncGroupBegin(GroupSyncKey::decode(body, name)?),
            Command::SyncGroupEnd => Message::SyncGroupEnd(GroupSyncKey::decode(body, name)?),
            Command::SyncGroupNotify => {
                Message::SyncGroupNotify(GroupSyncKey::decode(body, name)?)
            }
            Command::GroupSyncKey => Message::GroupSyncKey(GroupSyncKey::decode(body, name)?),
            Command::Metadata => Message::Metadata(Metadata::decode(body)?),
        };
        Ok(msg)
    }
}
