//! In-memory fake server for session tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

use imlink_client::config::{self, ClientConfig};
use imlink_client::sync::{CursorStore, Cursors, MemoryCursorStore};
use imlink_client::transport::codec::FrameReader;
use imlink_client::{Client, Session, StaticToken};
use imlink_core::protocol::{AuthToken, Frame, Message};

pub fn config(extra: &str) -> ClientConfig {
    let yaml = format!("version: 1\ndevice:\n  device_id: \"test-device\"\n{extra}");
    config::load_from_str(&yaml).unwrap()
}

pub async fn client_with(cfg: ClientConfig, cursors: Cursors) -> (Client, Arc<MemoryCursorStore>) {
    let store = Arc::new(MemoryCursorStore::new(cursors));
    let dyn_store: Arc<dyn CursorStore> = store.clone();
    let client = Client::with_store(cfg, Arc::new(StaticToken::new("tok")), dyn_store)
        .await
        .unwrap();
    (client, store)
}

pub struct FakeServer {
    reader: FrameReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    next_seq: i32,
}

impl FakeServer {
    pub fn new(io: DuplexStream) -> Self {
        let (rd, wr) = tokio::io::split(io);
        Self {
            reader: FrameReader::new(rd, 64 * 1024),
            writer: wr,
            next_seq: 1,
        }
    }

    pub async fn recv(&mut self) -> Frame {
        self.reader.next_frame().await.unwrap()
    }

    pub async fn recv_message(&mut self) -> Message {
        self.recv().await.message
    }

    /// Read the auth frame and answer with `status`.
    pub async fn auth(&mut self, status: i32) -> (i32, AuthToken) {
        let f = self.recv().await;
        let Message::AuthToken(token) = f.message else {
            panic!("expected auth token, got {:?}", f.message);
        };
        self.send(Message::AuthStatus(status)).await;
        (f.seq, token)
    }

    /// Send with the next server sequence; returns it.
    pub async fn send(&mut self, message: Message) -> i32 {
        self.send_flagged(message, 0).await
    }

    pub async fn send_flagged(&mut self, message: Message, flags: u8) -> i32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let raw = Frame::new(seq, message).with_flags(flags).encode().unwrap();
        self.write_raw(&raw).await;
        seq
    }

    pub async fn write_raw(&mut self, raw: &[u8]) {
        self.writer.write_all(raw).await.unwrap();
    }
}

/// Connect `client` to a fresh fake server that accepts the token.
pub async fn connect(client: &Client) -> (Session, FakeServer) {
    let (c, s) = tokio::io::duplex(64 * 1024);
    let mut server = FakeServer::new(s);
    let (session, _) = tokio::join!(client.connect_stream(c), server.auth(0));
    (session.unwrap(), server)
}
