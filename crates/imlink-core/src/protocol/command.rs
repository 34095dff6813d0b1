//! Command enumeration.
//!
//! The command byte selects the body layout. Bytes outside this table are
//! not a framing error: they decode to `Message::Unknown` so the stream
//! stays synchronized.

macro_rules! commands {
    ($($(#[$doc:meta])* $name:ident = $code:literal => $label:literal,)*) => {
        /// Every command this client understands.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Command {
            $($(#[$doc])* $name = $code,)*
        }

        impl Command {
            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($code => Some(Command::$name),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Command::$name => $label,)*
                }
            }
        }
    };
}

commands! {
    Heartbeat = 1 => "heartbeat",
    AuthStatus = 3 => "auth_status",
    /// Persistent peer-to-peer message.
    Im = 4 => "im",
    Ack = 5 => "ack",
    /// Another login of the same user reset this connection.
    Rst = 6 => "rst",
    GroupNotification = 7 => "group_notification",
    GroupIm = 8 => "group_im",
    /// The recipient (not the server) received a message.
    PeerAck = 9 => "peer_ack",
    Typing = 10 => "typing",
    SubscribePresence = 11 => "subscribe_presence",
    PresenceUpdate = 12 => "presence_update",
    Ping = 13 => "ping",
    Pong = 14 => "pong",
    AuthToken = 15 => "auth_token",
    LoginPoint = 16 => "login_point",
    /// Non-persistent realtime message.
    Rt = 17 => "rt",
    EnterRoom = 18 => "enter_room",
    LeaveRoom = 19 => "leave_room",
    RoomIm = 20 => "room_im",
    System = 21 => "system",
    UnreadCount = 22 => "unread_count",
    Customer = 24 => "customer",
    CustomerSupport = 25 => "customer_support",
    Sync = 26 => "sync",
    SyncBegin = 27 => "sync_begin",
    SyncEnd = 28 => "sync_end",
    SyncNotify = 29 => "sync_notify",
    SyncGroup = 30 => "sync_group",
    SyncGroupBegin = 31 => "sync_group_begin",
    SyncGroupEnd = 32 => "sync_group_end",
    SyncGroupNotify = 33 => "sync_group_notify",
    SyncKey = 34 => "sync_key",
    GroupSyncKey = 35 => "group_sync_key",
    Notification = 36 => "notification",
    Metadata = 37 => "metadata",
}

impl Command {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Persistent content the server keeps until the client acknowledges the
    /// frame's sequence.
    pub fn requires_receipt(self) -> bool {
        matches!(
            self,
            Command::Im
                | Command::GroupIm
                | Command::PeerAck
                | Command::GroupNotification
                | Command::System
                | Command::Customer
                | Command::CustomerSupport
        )
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
