//! Session runtime: the read/dispatch loop and the single writer task.
//!
//! Reads are strictly sequential. Every write, whether from an application
//! handle or from dispatch (receipt acks, sync requests, pings), goes through
//! the writer task, which also owns the sequence counter.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::body::Ack;
use imlink_core::protocol::{flags, Command, Frame, Message, RawFrame};

use crate::delivery::DeliveryTracker;
use crate::keepalive::Keepalive;
use crate::sync::{CursorStore, SyncEngine, SyncScope};
use crate::transport::codec::{FrameReader, FrameWriter};

use super::handle::Outbound;
use super::{ConnState, Event, Origin};

pub(crate) async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<Outbound>,
    tracker: Arc<DeliveryTracker>,
    version: u8,
    mut next_seq: i32,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(out) = rx.recv().await {
        let seq = next_seq;
        let frame = Frame::new(seq, out.message)
            .with_version(version)
            .with_flags(out.flags);
        if let Some(tx) = out.ack {
            tracker.register(seq, tx);
        }

        match writer.write_frame(&frame).await {
            Ok(()) => {
                next_seq = next_seq.wrapping_add(1);
                tracing::trace!(seq, cmd = %frame.message.name(), "frame sent");
                if let Some(a) = out.assigned {
                    let _ = a.send(Ok(seq));
                }
            }
            Err(e) if e.is_transport() => {
                tracker.forget(seq);
                if let Some(a) = out.assigned {
                    let _ = a.send(Err(ImlinkError::ConnectionClosed));
                }
                return Err(e);
            }
            Err(e) => {
                tracker.forget(seq);
                tracing::warn!(cmd = %frame.message.name(), error = %e, "frame not encodable");
                if let Some(a) = out.assigned {
                    let _ = a.send(Err(e));
                }
            }
        }
    }
    let _ = writer.shutdown().await;
    Ok(())
}

pub(crate) struct Runtime<R> {
    pub reader: FrameReader<R>,
    pub out_tx: mpsc::Sender<Outbound>,
    pub events: mpsc::Sender<Event>,
    /// Events the application has not made room for yet. The read loop
    /// keeps running while this drains, so acks and pings are never stuck
    /// behind a slow consumer.
    pub backlog: VecDeque<Event>,
    pub engine: Arc<Mutex<SyncEngine>>,
    pub store: Arc<dyn CursorStore>,
    pub tracker: Arc<DeliveryTracker>,
    pub keepalive: Keepalive,
    pub shutdown: Arc<Notify>,
    pub state: Arc<watch::Sender<ConnState>>,
}

impl<R> Runtime<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub async fn run(mut self, mut writer: JoinHandle<Result<()>>) {
        let reason = loop {
            let events = self.events.clone();
            tokio::select! {
                res = self.reader.next_raw() => match res {
                    Ok(raw) => {
                        self.keepalive.on_frame();
                        if let Err(e) = self.dispatch(raw).await {
                            break e.to_string();
                        }
                    }
                    Err(e) => break e.to_string(),
                },

                _ = tokio::time::sleep_until(self.keepalive.deadline()) => {
                    if self.keepalive.on_idle() {
                        tracing::debug!(pings = self.keepalive.pings_sent(), "idle, sending ping");
                        if let Err(e) = self.send(Message::Ping).await {
                            break e.to_string();
                        }
                    }
                }

                res = &mut writer => {
                    break match res {
                        Ok(Ok(())) => "writer stopped".to_string(),
                        Ok(Err(e)) => e.to_string(),
                        Err(e) => format!("writer task failed: {e}"),
                    };
                }

                permit = events.reserve(), if !self.backlog.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(ev) = self.backlog.pop_front() {
                            permit.send(ev);
                        }
                    }
                    Err(_) => break "event receiver dropped".to_string(),
                },

                _ = self.shutdown.notified() => break "closed by client".to_string(),
            }
        };

        writer.abort();
        self.teardown(reason).await;
    }

    async fn dispatch(&mut self, raw: RawFrame) -> Result<()> {
        let (seq, cmd) = (raw.header.seq, raw.header.cmd);
        let Frame {
            seq: _,
            version,
            flags: frame_flags,
            message,
        } = match raw.decode() {
            Ok(f) => f,
            Err(e) => {
                // Framing is intact, only this body is unusable.
                tracing::warn!(seq, cmd, error = %e, "dropping malformed frame");
                return Ok(());
            }
        };
        tracing::trace!(seq, cmd = %message.name(), flags = frame_flags, "frame received");

        if message.command().is_some_and(Command::requires_receipt) {
            self.send(Message::Ack(Ack::new(seq))).await?;
        }

        match message {
            Message::Ack(ack) => {
                if !self.tracker.complete(ack) {
                    tracing::debug!(seq = ack.seq, "ack without waiter");
                }
            }
            Message::Pong | Message::Heartbeat => {}
            Message::Ping => self.send(Message::Pong).await?,
            Message::SyncBegin { .. } => self.sync_begin(SyncScope::Direct).await?,
            Message::SyncGroupBegin(k) => self.sync_begin(SyncScope::Group(k.group_id)).await?,
            Message::SyncEnd { sync_key } => self.sync_end(SyncScope::Direct, sync_key).await?,
            Message::SyncGroupEnd(k) => {
                self.sync_end(SyncScope::Group(k.group_id), k.sync_key)
                    .await?
            }
            Message::SyncNotify { sync_key } => {
                self.sync_notify(SyncScope::Direct, sync_key).await?
            }
            Message::SyncGroupNotify(k) => {
                self.sync_notify(SyncScope::Group(k.group_id), k.sync_key)
                    .await?
            }
            message => {
                if let Message::Unknown { cmd, body } = &message {
                    tracing::debug!(cmd, len = body.len(), "unknown command");
                }
                let origin = if frame_flags & flags::PUSH != 0 {
                    Origin::Push
                } else if self.engine.lock().await.in_progress() {
                    Origin::Catchup
                } else {
                    Origin::Live
                };
                let frame = Frame {
                    seq,
                    version,
                    flags: frame_flags,
                    message,
                };
                self.emit(Event::Message { frame, origin })?;
            }
        }
        Ok(())
    }

    async fn sync_begin(&mut self, scope: SyncScope) -> Result<()> {
        self.engine.lock().await.handle_begin(scope);
        tracing::debug!(?scope, "sync begin");
        self.emit(Event::SyncBegin { scope })
    }

    async fn sync_end(&mut self, scope: SyncScope, key: i64) -> Result<()> {
        let snapshot = self.engine.lock().await.handle_end(scope, key);

        let persisted = match snapshot {
            Some(cursors) => match self.store.save(&cursors).await {
                Ok(()) => true,
                // Unpersisted cursors are not acked, so the server keeps the backlog.
                Err(e) => {
                    tracing::warn!(?scope, sync_key = key, error = %e, "cursor persist failed");
                    false
                }
            },
            None => false,
        };

        let (outcome, cursor, caught_up) = {
            let mut engine = self.engine.lock().await;
            let outcome = engine.commit_end(scope, key, persisted);
            let cursor = engine.cursor(scope).unwrap_or_default();
            (outcome, cursor, engine.is_caught_up())
        };

        match outcome.advanced {
            Some(advanced) => tracing::info!(?scope, sync_key = advanced, "sync cursor advanced"),
            None => {
                tracing::debug!(?scope, sync_key = key, held = cursor, "sync end without progress")
            }
        }
        if let Some(ack) = outcome.ack {
            self.send(ack).await?;
        }
        if let Some(req) = outcome.follow_up {
            self.send(req).await?;
        }
        self.emit(Event::SyncEnd {
            scope,
            cursor,
            caught_up,
        })
    }

    async fn sync_notify(&mut self, scope: SyncScope, key: i64) -> Result<()> {
        let req = self.engine.lock().await.handle_notify(scope, key);
        tracing::debug!(?scope, sync_key = key, requested = req.is_some(), "sync notify");
        if let Some(req) = req {
            self.send(req).await?;
        }
        Ok(())
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        self.out_tx
            .send(Outbound::fire(message))
            .await
            .map_err(|_| ImlinkError::ConnectionClosed)
    }

    /// Queue an event without blocking the read loop.
    fn emit(&mut self, ev: Event) -> Result<()> {
        if !self.backlog.is_empty() {
            self.backlog.push_back(ev);
            return Ok(());
        }
        match self.events.try_send(ev) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(ev)) => {
                tracing::debug!("event queue full, buffering");
                self.backlog.push_back(ev);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(ImlinkError::Internal("event receiver dropped".into()))
            }
        }
    }

    async fn teardown(mut self, reason: String) {
        self.state.send_replace(ConnState::Disconnected);
        let failed = self.tracker.fail_all();
        self.engine.lock().await.reset_windows();
        tracing::info!(
            %reason,
            failed_waits = failed,
            pending_events = self.backlog.len(),
            "session ended"
        );

        // Buffered events still go out in order, ahead of the disconnect.
        self.backlog.push_back(Event::Disconnected { reason });
        while let Some(ev) = self.backlog.pop_front() {
            if self.events.send(ev).await.is_err() {
                tracing::debug!("event receiver gone, dropping remaining events");
                break;
            }
        }
    }
}
