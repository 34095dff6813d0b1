//! Ready-state session: one reader task, one writer task, and the handles
//! and event stream the application talks to.
//!
//! Ownership:
//! - the runtime task owns the read half, keepalive, and dispatch
//! - the writer task owns the write half and the sequence counter
//! - the sync engine is shared with the `Client` and survives reconnects

mod event;
mod handle;
mod runtime;

use std::collections::{BTreeSet, VecDeque};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::Frame;

use crate::sync::SyncScope;

pub use event::{Event, Origin};
pub use handle::SessionHandle;

pub(crate) use handle::Outbound;
pub(crate) use runtime::{write_loop, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

pub struct Session {
    events: mpsc::Receiver<Event>,
    stash: VecDeque<Event>,
    /// Windows begun but not yet ended, as seen on the event stream.
    open: BTreeSet<SyncScope>,
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl Session {
    pub(crate) fn new(
        events: mpsc::Receiver<Event>,
        handle: SessionHandle,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            stash: VecDeque::new(),
            open: BTreeSet::new(),
            handle,
            task,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Next event. `None` once the session ended and every event was read.
    pub async fn recv(&mut self) -> Option<Event> {
        if let Some(ev) = self.stash.pop_front() {
            return Some(ev);
        }
        let ev = self.events.recv().await?;
        self.observe(&ev);
        Some(ev)
    }

    fn observe(&mut self, ev: &Event) {
        match ev {
            Event::SyncBegin { scope } => {
                self.open.insert(*scope);
            }
            Event::SyncEnd { scope, .. } => {
                self.open.remove(scope);
            }
            Event::Disconnected { .. } => self.open.clear(),
            Event::Message { .. } => {}
        }
    }

    /// Wait until a non-push content frame matches `pred`.
    ///
    /// A match that arrives inside a sync window is held until every window
    /// open at that moment has ended. Windows that begin later, or scopes
    /// that were requested but never began, do not hold it. Events skipped
    /// along the way stay queued for `recv`.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Result<Frame>
    where
        F: FnMut(&Frame) -> bool,
    {
        let stashed = self.stash.iter().position(|ev| {
            matches!(ev, Event::Message { frame, origin } if *origin != Origin::Push && pred(frame))
        });
        if let Some(i) = stashed {
            if let Some(Event::Message { frame, .. }) = self.stash.remove(i) {
                return Ok(frame);
            }
        }

        let mut matched: Option<(Frame, BTreeSet<SyncScope>)> = None;
        loop {
            let Some(ev) = self.events.recv().await else {
                return Err(ImlinkError::ConnectionClosed);
            };
            self.observe(&ev);
            match ev {
                Event::Message { frame, origin }
                    if matched.is_none() && origin != Origin::Push && pred(&frame) =>
                {
                    if origin == Origin::Live || self.open.is_empty() {
                        return Ok(frame);
                    }
                    matched = Some((frame, self.open.clone()));
                }
                Event::SyncEnd { scope, .. } if matched.is_some() => {
                    self.stash.push_back(ev);
                    if let Some((frame, mut pending)) = matched.take() {
                        pending.remove(&scope);
                        if pending.is_empty() {
                            return Ok(frame);
                        }
                        matched = Some((frame, pending));
                    }
                }
                Event::Disconnected { ref reason } => {
                    tracing::debug!(%reason, "session ended while waiting");
                    self.stash.push_back(ev);
                    return matched
                        .map(|(frame, _)| frame)
                        .ok_or(ImlinkError::ConnectionClosed);
                }
                other => self.stash.push_back(other),
            }
        }
    }

    /// Stop the session and wait for its tasks to finish.
    pub async fn close(self) {
        let Session {
            events,
            handle,
            task,
            ..
        } = self;
        handle.close();
        // Unread events must not hold up teardown.
        drop(events);
        let _ = task.await;
    }
}
