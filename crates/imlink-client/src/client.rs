//! Long-lived client: config, token source, and the sync cursors that
//! outlive individual connections.
//!
//! Each `connect` runs the full lifecycle `Connecting -> Authenticating ->
//! Ready` on a fresh stream with a fresh sequence counter. Cursors are kept
//! in the shared engine and replayed as sync requests on every `Ready`.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tracing::Instrument;

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::AuthToken;

use crate::config::ClientConfig;
use crate::delivery::DeliveryTracker;
use crate::keepalive::Keepalive;
use crate::session::{write_loop, ConnState, Outbound, Runtime, Session, SessionHandle};
use crate::sync::{CursorStore, Cursors, FileCursorStore, MemoryCursorStore, SyncEngine, SyncScope};
use crate::token::TokenProvider;
use crate::transport::codec::{FrameReader, FrameWriter};
use crate::transport::handshake::{authenticate, HANDSHAKE_SEQ};
use crate::transport::connect_tcp;

pub struct Client {
    cfg: Arc<ClientConfig>,
    tokens: Arc<dyn TokenProvider>,
    store: Arc<dyn CursorStore>,
    engine: Arc<Mutex<SyncEngine>>,
    state: Arc<watch::Sender<ConnState>>,
}

impl Client {
    /// Build with the store named by `sync.cursor_file` (memory otherwise).
    pub async fn new(cfg: ClientConfig, tokens: impl TokenProvider) -> Result<Self> {
        let store: Arc<dyn CursorStore> = match &cfg.sync.cursor_file {
            Some(path) => Arc::new(FileCursorStore::new(path.clone())),
            None => Arc::new(MemoryCursorStore::default()),
        };
        Self::with_store(cfg, Arc::new(tokens), store).await
    }

    pub async fn with_store(
        cfg: ClientConfig,
        tokens: Arc<dyn TokenProvider>,
        store: Arc<dyn CursorStore>,
    ) -> Result<Self> {
        cfg.validate()?;
        let cursors = store.load().await?;
        let mut engine = SyncEngine::from_cursors(&cursors);
        for gid in &cfg.sync.groups {
            engine.track_group(*gid);
        }
        // Requests go out on `Ready`, not here.
        engine.reset_windows();
        tracing::debug!(direct = cursors.direct, groups = cursors.groups.len(), "cursors loaded");

        let (state, _) = watch::channel(ConnState::Disconnected);
        Ok(Self {
            cfg: Arc::new(cfg),
            tokens,
            store,
            engine: Arc::new(Mutex::new(engine)),
            state: Arc::new(state),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnState> {
        self.state.subscribe()
    }

    pub async fn cursor(&self, scope: SyncScope) -> Option<i64> {
        self.engine.lock().await.cursor(scope)
    }

    pub async fn cursors(&self) -> Cursors {
        self.engine.lock().await.cursors()
    }

    /// Connect over TCP to `connection.addr`.
    pub async fn connect(&self) -> Result<Session> {
        let conn = &self.cfg.connection;
        self.state.send_replace(ConnState::Connecting);
        let stream = match connect_tcp(&conn.addr, conn.connect_timeout()).await {
            Ok(s) => s,
            Err(e) => {
                self.state.send_replace(ConnState::Disconnected);
                tracing::warn!(addr = %conn.addr, error = %e, "connect failed");
                return Err(e);
            }
        };
        self.connect_stream(stream).await
    }

    /// Authenticate and start a session over an already open stream.
    pub async fn connect_stream<S>(&self, stream: S) -> Result<Session>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let span = tracing::info_span!(
            "session",
            device = %self.cfg.device.device_id,
            platform = self.cfg.device.platform_id
        );
        match self.establish(stream, span.clone()).instrument(span).await {
            Ok(s) => Ok(s),
            Err(e) => {
                self.state.send_replace(ConnState::Disconnected);
                tracing::warn!(error = %e, code = e.code().as_str(), "session setup failed");
                Err(e)
            }
        }
    }

    async fn establish<S>(&self, stream: S, span: tracing::Span) -> Result<Session>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let conn = &self.cfg.connection;
        let version = conn.protocol_version;

        self.state.send_replace(ConnState::Authenticating);
        let token = self.tokens.token().await?;
        let auth = AuthToken::new(self.cfg.device.platform_id, token, &*self.cfg.device.device_id);

        let (rd, wr) = tokio::io::split(stream);
        let mut reader = FrameReader::new(rd, conn.max_body_bytes);
        let mut writer = FrameWriter::new(wr);
        authenticate(&mut reader, &mut writer, auth, version, conn.auth_timeout()).await?;

        let delivery = &self.cfg.delivery;
        let (out_tx, out_rx) = mpsc::channel(delivery.outbound_queue);
        let (ev_tx, ev_rx) = mpsc::channel(delivery.event_queue);
        let tracker = Arc::new(DeliveryTracker::new());
        let shutdown = Arc::new(Notify::new());

        let writer_task = tokio::spawn(
            write_loop(writer, out_rx, tracker.clone(), version, HANDSHAKE_SEQ + 1)
                .instrument(span.clone()),
        );

        // Catch-up requests are the first frames after auth.
        let requests = self.engine.lock().await.on_ready();
        for m in requests {
            out_tx
                .send(Outbound::fire(m))
                .await
                .map_err(|_| ImlinkError::ConnectionClosed)?;
        }
        self.state.send_replace(ConnState::Ready);
        tracing::info!(version, "session ready");

        let runtime = Runtime {
            reader,
            out_tx: out_tx.clone(),
            events: ev_tx,
            backlog: VecDeque::new(),
            engine: self.engine.clone(),
            store: self.store.clone(),
            tracker: tracker.clone(),
            keepalive: Keepalive::new(self.cfg.keepalive.idle_interval()),
            shutdown: shutdown.clone(),
            state: self.state.clone(),
        };
        let task = tokio::spawn(runtime.run(writer_task).instrument(span));

        let handle = SessionHandle::new(
            out_tx,
            self.state.subscribe(),
            self.engine.clone(),
            tracker,
            shutdown,
            delivery.ack_timeout(),
        );
        Ok(Session::new(ev_rx, handle, task))
    }
}
