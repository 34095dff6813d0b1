use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex, Notify};

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::body::{
    Ack, CustomerMessage, ImMessage, RtMessage, SubscribePresence, Typing,
};
use imlink_core::protocol::Message;

use crate::delivery::{await_ack, DeliveryTracker};
use crate::sync::{SyncEngine, SyncScope};

use super::ConnState;

/// One queued send. The writer task assigns the sequence.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub message: Message,
    pub flags: u8,
    /// Reports the assigned sequence once the frame is written.
    pub assigned: Option<oneshot::Sender<Result<i32>>>,
    /// Registered with the delivery tracker before the write.
    pub ack: Option<oneshot::Sender<Ack>>,
}

impl Outbound {
    /// Send without waiting for anything.
    pub fn fire(message: Message) -> Self {
        Self {
            message,
            flags: 0,
            assigned: None,
            ack: None,
        }
    }
}

/// Clonable sending side of a session.
#[derive(Clone)]
pub struct SessionHandle {
    out_tx: mpsc::Sender<Outbound>,
    state: watch::Receiver<ConnState>,
    engine: Arc<Mutex<SyncEngine>>,
    tracker: Arc<DeliveryTracker>,
    shutdown: Arc<Notify>,
    ack_timeout: Duration,
}

impl SessionHandle {
    pub(crate) fn new(
        out_tx: mpsc::Sender<Outbound>,
        state: watch::Receiver<ConnState>,
        engine: Arc<Mutex<SyncEngine>>,
        tracker: Arc<DeliveryTracker>,
        shutdown: Arc<Notify>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            out_tx,
            state,
            engine,
            tracker,
            shutdown,
            ack_timeout,
        }
    }

    pub fn state(&self) -> ConnState {
        if self.out_tx.is_closed() {
            return ConnState::Disconnected;
        }
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnState::Ready
    }

    /// Queue a frame; resolves to its sequence once written.
    pub async fn send(&self, message: Message) -> Result<i32> {
        self.send_with_flags(message, 0).await
    }

    pub async fn send_with_flags(&self, message: Message, flags: u8) -> Result<i32> {
        self.enqueue(message, flags, None).await
    }

    /// Send and wait for the server's ack of this frame's sequence.
    ///
    /// Frames arriving in the meantime are dispatched as usual. A non-zero
    /// ack status is returned as-is; check `Ack::is_success`.
    pub async fn send_tracked(&self, message: Message, flags: u8) -> Result<Ack> {
        let (tx, rx) = oneshot::channel();
        let seq = self.enqueue(message, flags, Some(tx)).await?;
        await_ack(&self.tracker, seq, rx, self.ack_timeout).await
    }

    pub async fn send_peer_message(&self, msg: ImMessage) -> Result<Ack> {
        self.send_tracked(Message::Im(msg), 0).await
    }

    pub async fn send_group_message(&self, msg: ImMessage) -> Result<Ack> {
        self.send_tracked(Message::GroupIm(msg), 0).await
    }

    pub async fn send_customer_message(&self, msg: CustomerMessage) -> Result<Ack> {
        self.send_tracked(Message::Customer(msg), 0).await
    }

    pub async fn send_customer_support_message(&self, msg: CustomerMessage) -> Result<Ack> {
        self.send_tracked(Message::CustomerSupport(msg), 0).await
    }

    /// Fire-and-forget; room messages are never acked.
    pub async fn send_room_message(&self, msg: RtMessage) -> Result<i32> {
        self.send(Message::RoomIm(msg)).await
    }

    pub async fn send_rt(&self, msg: RtMessage) -> Result<i32> {
        self.send(Message::Rt(msg)).await
    }

    pub async fn enter_room(&self, room_id: i64) -> Result<i32> {
        self.send(Message::EnterRoom(room_id)).await
    }

    pub async fn leave_room(&self, room_id: i64) -> Result<i32> {
        self.send(Message::LeaveRoom(room_id)).await
    }

    pub async fn subscribe_presence(&self, uids: Vec<i64>) -> Result<i32> {
        self.send(Message::SubscribePresence(SubscribePresence { uids }))
            .await
    }

    pub async fn send_typing(&self, sender: i64, receiver: i64) -> Result<i32> {
        self.send(Message::Typing(Typing { sender, receiver })).await
    }

    /// Start syncing a group from cursor zero. A no-op for tracked groups.
    pub async fn track_group(&self, group_id: i64) -> Result<()> {
        let req = self.engine.lock().await.track_group(group_id);
        if let Some(req) = req {
            tracing::info!(group_id, "tracking group");
            self.send(req).await?;
        }
        Ok(())
    }

    pub async fn cursor(&self, scope: SyncScope) -> Option<i64> {
        self.engine.lock().await.cursor(scope)
    }

    /// Ask the session to shut down.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once the session's writer has stopped.
    pub async fn closed(&self) {
        self.out_tx.closed().await
    }

    async fn enqueue(
        &self,
        message: Message,
        flags: u8,
        ack: Option<oneshot::Sender<Ack>>,
    ) -> Result<i32> {
        if !self.is_ready() {
            return Err(ImlinkError::NotReady);
        }
        let (tx, rx) = oneshot::channel();
        let out = Outbound {
            message,
            flags,
            assigned: Some(tx),
            ack,
        };
        self.out_tx
            .send(out)
            .await
            .map_err(|_| ImlinkError::NotReady)?;
        rx.await.map_err(|_| ImlinkError::ConnectionClosed)?
    }
}
