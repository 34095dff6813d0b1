//! Sync state machine.
//!
//! One scope per stream: the direct inbox plus one per tracked group. Each
//! scope cycles `Idle -> Requested -> InProgress -> Idle`. Begin/end frames
//! are demultiplexed by command and group id, so windows of different
//! scopes may interleave freely.
//!
//! The held cursor only moves forward, and only on an end frame. A notify
//! with a higher key triggers a request carrying the *held* key; requesting
//! from the notified key would skip everything in between.
//!
//! The engine is pure: it returns the frames to send and never touches I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use imlink_core::protocol::body::GroupSyncKey;
use imlink_core::protocol::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncScope {
    Direct,
    Group(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Idle,
    /// Request sent, begin not yet seen.
    Requested,
    /// Begin seen, waiting for end.
    InProgress,
}

/// Persisted cursor snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursors {
    pub direct: i64,
    #[serde(default)]
    pub groups: BTreeMap<i64, i64>,
}

#[derive(Debug, Clone)]
struct ScopeState {
    key: i64,
    window: Window,
    /// Highest key notified while a window was open.
    deferred: Option<i64>,
}

impl ScopeState {
    fn new(key: i64) -> Self {
        Self {
            key,
            window: Window::Idle,
            deferred: None,
        }
    }
}

/// Result of processing an end frame.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EndOutcome {
    /// New cursor when the end advanced it and was persisted.
    pub advanced: Option<i64>,
    /// Cursor ack to send (only when advanced).
    pub ack: Option<Message>,
    /// Follow-up request for a notify deferred during the window.
    pub follow_up: Option<Message>,
}

#[derive(Debug)]
pub struct SyncEngine {
    direct: ScopeState,
    groups: BTreeMap<i64, ScopeState>,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::from_cursors(&Cursors::default())
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cursors(c: &Cursors) -> Self {
        Self {
            direct: ScopeState::new(c.direct),
            groups: c
                .groups
                .iter()
                .map(|(gid, key)| (*gid, ScopeState::new(*key)))
                .collect(),
        }
    }

    pub fn cursors(&self) -> Cursors {
        Cursors {
            direct: self.direct.key,
            groups: self.groups.iter().map(|(g, s)| (*g, s.key)).collect(),
        }
    }

    /// Held cursor, `None` for an untracked group.
    pub fn cursor(&self, scope: SyncScope) -> Option<i64> {
        self.get(scope).map(|s| s.key)
    }

    pub fn window(&self, scope: SyncScope) -> Option<Window> {
        self.get(scope).map(|s| s.window)
    }

    pub fn tracked_groups(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups.keys().copied()
    }

    /// Connection reached `Ready`: request every scope from its held cursor.
    pub fn on_ready(&mut self) -> Vec<Message> {
        self.reset_windows();
        let mut out = Vec::with_capacity(1 + self.groups.len());
        out.push(request(SyncScope::Direct, self.direct.key));
        self.direct.window = Window::Requested;
        for (gid, s) in self.groups.iter_mut() {
            s.window = Window::Requested;
            out.push(request(SyncScope::Group(*gid), s.key));
        }
        out
    }

    /// Start tracking a group at cursor zero. Returns the initial request,
    /// or `None` when the group is already tracked.
    pub fn track_group(&mut self, group_id: i64) -> Option<Message> {
        if self.groups.contains_key(&group_id) {
            return None;
        }
        let mut s = ScopeState::new(0);
        s.window = Window::Requested;
        self.groups.insert(group_id, s);
        Some(request(SyncScope::Group(group_id), 0))
    }

    /// A notify carrying `key`. Returns a request when one should go out now.
    pub fn handle_notify(&mut self, scope: SyncScope, key: i64) -> Option<Message> {
        let s = self.entry(scope);
        if key <= s.key {
            return None;
        }
        match s.window {
            Window::Idle => {
                s.window = Window::Requested;
                Some(request(scope, s.key))
            }
            Window::Requested | Window::InProgress => {
                s.deferred = Some(s.deferred.map_or(key, |d| d.max(key)));
                None
            }
        }
    }

    pub fn handle_begin(&mut self, scope: SyncScope) {
        let s = self.entry(scope);
        if s.window == Window::InProgress {
            tracing::debug!(?scope, "sync begin while already in progress");
        }
        s.window = Window::InProgress;
    }

    /// First half of an end frame: closes the window and returns the
    /// snapshot to persist when `key` would advance the cursor. The cursor
    /// itself only moves in [`commit_end`](Self::commit_end).
    pub fn handle_end(&mut self, scope: SyncScope, key: i64) -> Option<Cursors> {
        let s = self.entry(scope);
        s.window = Window::Idle;
        if key <= s.key {
            return None;
        }
        let mut snapshot = self.cursors();
        match scope {
            SyncScope::Direct => snapshot.direct = key,
            SyncScope::Group(gid) => {
                snapshot.groups.insert(gid, key);
            }
        }
        Some(snapshot)
    }

    /// Second half of an end frame, once the persist attempt is known. An
    /// unpersisted key is neither held nor acked, so a later end carrying
    /// the same key advances again.
    pub fn commit_end(&mut self, scope: SyncScope, key: i64, persisted: bool) -> EndOutcome {
        let s = self.entry(scope);
        let mut out = EndOutcome::default();
        if persisted && key > s.key {
            s.key = key;
            out.advanced = Some(key);
            out.ack = Some(cursor_ack(scope, key));
        }
        if let Some(d) = s.deferred.take() {
            if d > s.key {
                s.window = Window::Requested;
                out.follow_up = Some(request(scope, s.key));
            }
        }
        out
    }

    /// True while any scope has begun but not ended.
    pub fn in_progress(&self) -> bool {
        self.scopes().any(|s| s.window == Window::InProgress)
    }

    /// True when no scope has a request or window outstanding.
    pub fn is_caught_up(&self) -> bool {
        self.scopes().all(|s| s.window == Window::Idle)
    }

    /// Connection lost: open windows will never close.
    pub fn reset_windows(&mut self) {
        self.direct.window = Window::Idle;
        self.direct.deferred = None;
        for s in self.groups.values_mut() {
            s.window = Window::Idle;
            s.deferred = None;
        }
    }

    fn scopes(&self) -> impl Iterator<Item = &ScopeState> {
        std::iter::once(&self.direct).chain(self.groups.values())
    }

    fn get(&self, scope: SyncScope) -> Option<&ScopeState> {
        match scope {
            SyncScope::Direct => Some(&self.direct),
            SyncScope::Group(gid) => self.groups.get(&gid),
        }
    }

    /// Untracked groups start at zero.
    fn entry(&mut self, scope: SyncScope) -> &mut ScopeState {
        match scope {
            SyncScope::Direct => &mut self.direct,
            SyncScope::Group(gid) => self
                .groups
                .entry(gid)
                .or_insert_with(|| ScopeState::new(0)),
        }
    }
}

fn request(scope: SyncScope, key: i64) -> Message {
    match scope {
        SyncScope::Direct => Message::Sync { sync_key: key },
        SyncScope::Group(gid) => Message::SyncGroup(GroupSyncKey::new(gid, key)),
    }
}

fn cursor_ack(scope: SyncScope, key: i64) -> Message {
    match scope {
        SyncScope::Direct => Message::SyncKey { sync_key: key },
        SyncScope::Group(gid) => Message::GroupSyncKey(GroupSyncKey::new(gid, key)),
    }
}
