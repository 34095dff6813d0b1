use imlink_core::protocol::Frame;

use crate::sync::SyncScope;

/// How a content frame reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Regular delivery while no sync window is open.
    Live,
    /// Carries the push flag: sent proactively, never catch-up data.
    Push,
    /// Arrived inside a sync window.
    Catchup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message { frame: Frame, origin: Origin },
    SyncBegin { scope: SyncScope },
    /// `caught_up` is true once no scope has a window outstanding.
    SyncEnd {
        scope: SyncScope,
        cursor: i64,
        caught_up: bool,
    },
    Disconnected { reason: String },
}
