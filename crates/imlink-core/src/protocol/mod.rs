//! Wire protocol: frame header, commands, typed bodies, frame codec.
//!
//! Every frame is a fixed 12-byte big-endian header followed by a
//! command-specific body of exactly `body_len` bytes. Bodies are fixed-width
//! prefixes with an optional "rest of the body" tail; the tail is never
//! length-prefixed. The auth token body is the one exception and has its own
//! sub-codec in [`auth`].
//!
//! All parsers are panic-free and go through `bytes::Buf` with explicit
//! `remaining()` checks.

pub mod auth;
pub mod body;
pub mod command;
pub mod frame;
pub mod header;
pub mod message;

pub use auth::AuthToken;
pub use command::Command;
pub use frame::{decode_frame, split_frame, Frame, RawFrame};
pub use header::{FrameHeader, HEADER_SIZE};
pub use message::Message;

/// Latest protocol revision (explicit version byte, ack carries a status).
pub const DEFAULT_VERSION: u8 = 2;

/// Oldest revision still understood (peer messages without timestamp).
pub const MIN_VERSION: u8 = 0;

/// Default upper bound for a server-to-client body.
pub const DEFAULT_MAX_BODY: usize = 32 * 1024;

/// Header flag bits (byte 10 of the header).
pub mod flags {
    /// Content is plain text.
    pub const TEXT: u8 = 0x01;
    /// Server must not persist the message.
    pub const UNPERSISTENT: u8 = 0x02;
    /// Group message.
    pub const GROUP: u8 = 0x04;
    /// Offline message sent by this user from another device.
    pub const SELF: u8 = 0x08;
    /// Pushed proactively by the server, outside any sync window.
    pub const PUSH: u8 = 0x10;
    /// Super-group message.
    pub const SUPER_GROUP: u8 = 0x20;
}

/// Platform identifiers carried in the auth token and login-point notices.
pub mod platform {
    pub const IOS: u8 = 1;
    pub const ANDROID: u8 = 2;
    pub const WEB: u8 = 3;
    pub const SERVER: u8 = 4;
}
