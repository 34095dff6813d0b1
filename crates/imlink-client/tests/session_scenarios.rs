#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use imlink_client::sync::{CursorStore, Cursors, MemoryCursorStore};
use imlink_client::{Client, ConnState, Event, Origin, StaticToken, SyncScope};
use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::body::{Ack, GroupSyncKey, ImMessage, PeerAck};
use imlink_core::protocol::{flags, Frame, Message};

use common::{client_with, config, connect, FakeServer};

fn im(sender: i64, receiver: i64, msgid: i32, content: &'static str) -> Message {
    Message::Im(ImMessage {
        sender,
        receiver,
        timestamp: 1_700_000_000,
        msgid,
        content: Bytes::from_static(content.as_bytes()),
    })
}

async fn next_event(session: &mut imlink_client::Session) -> Event {
    session.recv().await.expect("session ended")
}

#[tokio::test]
async fn handshake_uses_seq_one_and_requests_sync() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (c, s) = tokio::io::duplex(64 * 1024);
    let mut server = FakeServer::new(s);

    let (session, (seq, token)) = tokio::join!(client.connect_stream(c), server.auth(0));
    let session = session.unwrap();
    assert_eq!(seq, 1);
    assert_eq!(token.token, "tok");
    assert_eq!(token.device_id, "test-device");
    assert_eq!(token.platform_id, 2);

    let first = server.recv().await;
    assert_eq!(first.seq, 2);
    assert_eq!(first.message, Message::Sync { sync_key: 0 });
    assert_eq!(client.state(), ConnState::Ready);
    assert!(session.handle().is_ready());
}

#[tokio::test]
async fn direct_message_round_trip() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    assert_eq!(server.recv().await.seq, 2); // sync request

    let handle = session.handle();
    assert_eq!(handle.send_typing(1, 2).await.unwrap(), 3);
    assert_eq!(handle.enter_room(500).await.unwrap(), 4);

    let sender = handle.clone();
    let pending = tokio::spawn(async move {
        sender
            .send_peer_message(ImMessage::new(1, 2, "hi"))
            .await
    });

    assert_eq!(server.recv().await.seq, 3);
    assert_eq!(server.recv().await.seq, 4);
    let sent = server.recv().await;
    assert_eq!(sent.seq, 5);
    let Message::Im(m) = &sent.message else {
        panic!("expected im, got {:?}", sent.message);
    };
    assert_eq!((m.sender, m.receiver, &m.content[..]), (1, 2, &b"hi"[..]));

    // An ack for another sequence and an unrelated frame do not satisfy the send.
    server.send(Message::Ack(Ack::new(4))).await;
    let notice_seq = server
        .send(Message::GroupNotification(Bytes::from_static(b"{}")))
        .await;
    server.send(Message::Ack(Ack::new(5))).await;

    let ack = pending.await.unwrap().unwrap();
    assert_eq!(ack.seq, 5);
    assert!(ack.is_success());

    // The notification is still delivered and acknowledged.
    match next_event(&mut session).await {
        Event::Message { frame, origin } => {
            assert!(matches!(frame.message, Message::GroupNotification(_)));
            assert_eq!(origin, Origin::Live);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        server.recv_message().await,
        Message::Ack(Ack::new(notice_seq))
    );
}

#[tokio::test]
async fn offline_catch_up_persists_and_acks_cursor() {
    let cursors = Cursors {
        direct: 100,
        ..Cursors::default()
    };
    let (client, store) = client_with(config(""), cursors).await;
    let (mut session, mut server) = connect(&client).await;
    assert_eq!(
        server.recv_message().await,
        Message::Sync { sync_key: 100 }
    );

    server.send(Message::SyncBegin { sync_key: 100 }).await;
    let a = server.send(im(2, 1, 101, "one")).await;
    let b = server.send(im(2, 1, 102, "two")).await;
    server.send(Message::SyncEnd { sync_key: 140 }).await;

    assert_eq!(server.recv_message().await, Message::Ack(Ack::new(a)));
    assert_eq!(server.recv_message().await, Message::Ack(Ack::new(b)));
    assert_eq!(
        server.recv_message().await,
        Message::SyncKey { sync_key: 140 }
    );

    assert_eq!(
        next_event(&mut session).await,
        Event::SyncBegin {
            scope: SyncScope::Direct
        }
    );
    for _ in 0..2 {
        match next_event(&mut session).await {
            Event::Message { origin, .. } => assert_eq!(origin, Origin::Catchup),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(
        next_event(&mut session).await,
        Event::SyncEnd {
            scope: SyncScope::Direct,
            cursor: 140,
            caught_up: true,
        }
    );

    assert_eq!(store.snapshot().await.direct, 140);
    assert_eq!(client.cursor(SyncScope::Direct).await, Some(140));
}

#[tokio::test]
async fn group_notify_requests_only_that_group() {
    let cursors = Cursors {
        direct: 0,
        groups: [(10, 10), (20, 0)].into_iter().collect(),
    };
    let (client, _) = client_with(config(""), cursors).await;
    let (_session, mut server) = connect(&client).await;

    assert_eq!(server.recv_message().await, Message::Sync { sync_key: 0 });
    assert_eq!(
        server.recv_message().await,
        Message::SyncGroup(GroupSyncKey::new(10, 10))
    );
    assert_eq!(
        server.recv_message().await,
        Message::SyncGroup(GroupSyncKey::new(20, 0))
    );

    // Close every window without progress.
    server.send(Message::SyncGroupBegin(GroupSyncKey::new(10, 10))).await;
    server.send(Message::SyncBegin { sync_key: 0 }).await;
    server.send(Message::SyncGroupEnd(GroupSyncKey::new(10, 10))).await;
    server.send(Message::SyncGroupBegin(GroupSyncKey::new(20, 0))).await;
    server.send(Message::SyncEnd { sync_key: 0 }).await;
    server.send(Message::SyncGroupEnd(GroupSyncKey::new(20, 0))).await;

    server.send(Message::SyncGroupNotify(GroupSyncKey::new(20, 7))).await;
    assert_eq!(
        server.recv_message().await,
        Message::SyncGroup(GroupSyncKey::new(20, 0))
    );

    // Nothing else was queued ahead of the pong.
    server.send(Message::Ping).await;
    assert_eq!(server.recv_message().await, Message::Pong);

    server.send(Message::SyncGroupBegin(GroupSyncKey::new(20, 0))).await;
    let gm = server
        .send(Message::GroupIm(ImMessage {
            sender: 3,
            receiver: 20,
            timestamp: 1,
            msgid: 1,
            content: Bytes::from_static(b"g"),
        }))
        .await;
    server.send(Message::SyncGroupEnd(GroupSyncKey::new(20, 7))).await;
    assert_eq!(server.recv_message().await, Message::Ack(Ack::new(gm)));
    assert_eq!(
        server.recv_message().await,
        Message::GroupSyncKey(GroupSyncKey::new(20, 7))
    );

    assert_eq!(client.cursor(SyncScope::Group(10)).await, Some(10));
    assert_eq!(client.cursor(SyncScope::Group(20)).await, Some(7));
}

#[tokio::test]
async fn wait_for_holds_catch_up_match_until_window_ends() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;

    server.send(Message::SyncBegin { sync_key: 0 }).await;
    let first = server.send(im(2, 1, 1, "old")).await;
    server.send(im(2, 1, 2, "older")).await;
    server.send(Message::SyncEnd { sync_key: 2 }).await;

    let frame = session
        .wait_for(|f| matches!(f.message, Message::Im(_)))
        .await
        .unwrap();
    assert_eq!(frame.seq, first);

    // Everything skipped is still readable, window end included.
    assert!(matches!(next_event(&mut session).await, Event::SyncBegin { .. }));
    assert!(matches!(
        next_event(&mut session).await,
        Event::Message { origin: Origin::Catchup, .. }
    ));
    assert!(matches!(
        next_event(&mut session).await,
        Event::SyncEnd { caught_up: true, cursor: 2, .. }
    ));
}

#[tokio::test]
async fn wait_for_ignores_push_flagged_frames() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;
    server.send(Message::SyncEnd { sync_key: 0 }).await;

    server
        .send_flagged(im(2, 1, 1, "pushed"), flags::PUSH)
        .await;
    let live = server.send(im(2, 1, 2, "live")).await;

    let frame = session
        .wait_for(|f| matches!(f.message, Message::Im(_)))
        .await
        .unwrap();
    assert_eq!(frame.seq, live);

    assert!(matches!(next_event(&mut session).await, Event::SyncEnd { .. }));
    match next_event(&mut session).await {
        Event::Message { frame, origin } => {
            assert_eq!(origin, Origin::Push);
            assert!(frame.is_push());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn peer_ack_is_echoed() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;

    let seq = server
        .send(Message::PeerAck(PeerAck {
            sender: 2,
            receiver: 1,
            msgid: 99,
        }))
        .await;
    assert_eq!(server.recv_message().await, Message::Ack(Ack::new(seq)));
    assert!(matches!(
        next_event(&mut session).await,
        Event::Message { frame: Frame { message: Message::PeerAck(_), .. }, .. }
    ));
}

#[tokio::test]
async fn unknown_and_malformed_frames_keep_the_stream() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;

    server
        .send(Message::Unknown {
            cmd: 200,
            body: Bytes::from_static(b"\x01\x02\x03"),
        })
        .await;
    // cmd 4 (im) with a 3-byte body.
    server
        .write_raw(&[0, 0, 0, 3, 0, 0, 0, 9, 4, 2, 0, 0, 1, 2, 3])
        .await;
    server.send(Message::Ping).await;

    // Malformed im is dropped without a receipt ack.
    assert_eq!(server.recv_message().await, Message::Pong);
    match next_event(&mut session).await {
        Event::Message { frame, .. } => {
            assert_eq!(frame.message.cmd_byte(), 200);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(session.handle().is_ready());
}

#[tokio::test]
async fn auth_rejection_fails_connect() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (c, s) = tokio::io::duplex(4096);
    let mut server = FakeServer::new(s);

    let (res, _) = tokio::join!(client.connect_stream(c), server.auth(1));
    let err = res.err().expect("must fail");
    assert_eq!(err.code().as_str(), "AUTH_FAILED");
    assert_eq!(client.state(), ConnState::Disconnected);
}

#[tokio::test]
async fn unexpected_auth_reply_is_a_protocol_error() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (c, s) = tokio::io::duplex(4096);
    let mut server = FakeServer::new(s);

    let serve = async {
        server.recv().await;
        server.send(Message::Pong).await;
    };
    let (res, _) = tokio::join!(client.connect_stream(c), serve);
    let err = res.err().expect("must fail");
    assert_eq!(err.code().as_str(), "PROTOCOL");
}

#[tokio::test]
async fn missing_ack_times_out() {
    let (client, _) = client_with(
        config("delivery:\n  ack_timeout_ms: 100\n"),
        Cursors::default(),
    )
    .await;
    let (session, mut server) = connect(&client).await;
    server.recv().await;

    let err = session
        .handle()
        .send_peer_message(ImMessage::new(1, 2, "lost"))
        .await
        .unwrap_err();
    assert_eq!(err.code().as_str(), "TIMEOUT");
}

#[tokio::test]
async fn server_hangup_ends_session_and_fails_waiters() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;

    let handle = session.handle();
    let sender = handle.clone();
    let pending = tokio::spawn(async move {
        sender
            .send_peer_message(ImMessage::new(1, 2, "bye"))
            .await
    });
    server.recv().await;
    drop(server);

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(
        next_event(&mut session).await,
        Event::Disconnected { .. }
    ));

    handle.closed().await;
    assert_eq!(handle.state(), ConnState::Disconnected);
    let err = handle.enter_room(1).await.unwrap_err();
    assert_eq!(err.code().as_str(), "NOT_READY");
}

#[tokio::test]
async fn reconnect_restarts_sequence_and_replays_cursor() {
    let (client, _) = client_with(config("sync:\n  groups: [5]\n"), Cursors::default()).await;

    let (session, mut server) = connect(&client).await;
    server.recv().await;
    server.recv().await;
    server.send(Message::SyncBegin { sync_key: 0 }).await;
    server.send(Message::SyncEnd { sync_key: 140 }).await;
    assert_eq!(
        server.recv_message().await,
        Message::SyncKey { sync_key: 140 }
    );
    session.close().await;
    assert_eq!(client.state(), ConnState::Disconnected);

    let (c, s) = tokio::io::duplex(64 * 1024);
    let mut server = FakeServer::new(s);
    let (session, (auth_seq, _)) = tokio::join!(client.connect_stream(c), server.auth(0));
    let _session = session.unwrap();
    assert_eq!(auth_seq, 1);

    let f = server.recv().await;
    assert_eq!((f.seq, f.message), (2, Message::Sync { sync_key: 140 }));
    let f = server.recv().await;
    assert_eq!(
        (f.seq, f.message),
        (3, Message::SyncGroup(GroupSyncKey::new(5, 0)))
    );
}

#[tokio::test]
async fn track_group_requests_from_zero() {
    let (client, _) = client_with(config(""), Cursors::default()).await;
    let (session, mut server) = connect(&client).await;
    server.recv().await;

    let handle = session.handle();
    handle.track_group(77).await.unwrap();
    handle.track_group(77).await.unwrap();
    assert_eq!(
        server.recv_message().await,
        Message::SyncGroup(GroupSyncKey::new(77, 0))
    );
    server.send(Message::Ping).await;
    assert_eq!(server.recv_message().await, Message::Pong);
    assert_eq!(handle.cursor(SyncScope::Group(77)).await, Some(0));
}

#[tokio::test]
async fn wait_for_releases_once_its_own_window_ends() {
    let (client, _) = client_with(config("sync:\n  groups: [5]\n"), Cursors::default()).await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;
    server.recv().await;

    // Group 5 was requested but its window never begins.
    server.send(Message::SyncBegin { sync_key: 0 }).await;
    let old = server.send(im(2, 1, 1, "old")).await;
    server.send(Message::SyncEnd { sync_key: 1 }).await;

    let frame = tokio::time::timeout(
        Duration::from_secs(5),
        session.wait_for(|f| matches!(f.message, Message::Im(_))),
    )
    .await
    .expect("match held past its window")
    .unwrap();
    assert_eq!(frame.seq, old);

    assert!(matches!(next_event(&mut session).await, Event::SyncBegin { .. }));
    assert!(matches!(
        next_event(&mut session).await,
        Event::SyncEnd { caught_up: false, scope: SyncScope::Direct, .. }
    ));
}

#[tokio::test]
async fn slow_reader_does_not_stall_acks() {
    let (client, _) = client_with(
        config("delivery:\n  event_queue: 2\n  ack_timeout_ms: 2000\n"),
        Cursors::default(),
    )
    .await;
    let (mut session, mut server) = connect(&client).await;
    server.recv().await;

    let sender = session.handle();
    let pending = tokio::spawn(async move {
        sender
            .send_peer_message(ImMessage::new(1, 2, "hi"))
            .await
    });
    let sent = server.recv().await;

    let mut notices = Vec::new();
    for i in 0..4u8 {
        let body = Bytes::from(vec![b'0' + i]);
        notices.push(server.send(Message::GroupNotification(body)).await);
    }
    server.send(Message::Ack(Ack::new(sent.seq))).await;

    // Nobody reads events while the ack is outstanding.
    let ack = pending.await.unwrap().unwrap();
    assert_eq!(ack.seq, sent.seq);
    for seq in &notices {
        assert_eq!(server.recv_message().await, Message::Ack(Ack::new(*seq)));
    }

    for seq in notices {
        match next_event(&mut session).await {
            Event::Message { frame, .. } => assert_eq!(frame.seq, seq),
            other => panic!("unexpected {other:?}"),
        }
    }
}

/// Fails the first `failures` saves, then behaves like the memory store.
struct FlakyStore {
    failures: AtomicUsize,
    inner: MemoryCursorStore,
}

#[async_trait]
impl CursorStore for FlakyStore {
    async fn load(&self) -> Result<Cursors> {
        self.inner.load().await
    }

    async fn save(&self, cursors: &Cursors) -> Result<()> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ImlinkError::Internal("disk full".into()));
        }
        self.inner.save(cursors).await
    }
}

#[tokio::test]
async fn failed_cursor_persist_is_not_acked_or_held() {
    let store = Arc::new(FlakyStore {
        failures: AtomicUsize::new(1),
        inner: MemoryCursorStore::new(Cursors {
            direct: 100,
            ..Cursors::default()
        }),
    });
    let dyn_store: Arc<dyn CursorStore> = store.clone();
    let client = Client::with_store(config(""), Arc::new(StaticToken::new("tok")), dyn_store)
        .await
        .unwrap();
    let (mut session, mut server) = connect(&client).await;
    assert_eq!(
        server.recv_message().await,
        Message::Sync { sync_key: 100 }
    );

    server.send(Message::SyncBegin { sync_key: 100 }).await;
    server.send(Message::SyncEnd { sync_key: 140 }).await;
    // No cursor ack ahead of the pong.
    server.send(Message::Ping).await;
    assert_eq!(server.recv_message().await, Message::Pong);

    assert!(matches!(next_event(&mut session).await, Event::SyncBegin { .. }));
    assert_eq!(
        next_event(&mut session).await,
        Event::SyncEnd {
            scope: SyncScope::Direct,
            cursor: 100,
            caught_up: true,
        }
    );
    assert_eq!(client.cursor(SyncScope::Direct).await, Some(100));

    // The server replays the window; this time the save goes through.
    server.send(Message::SyncBegin { sync_key: 100 }).await;
    server.send(Message::SyncEnd { sync_key: 140 }).await;
    assert_eq!(
        server.recv_message().await,
        Message::SyncKey { sync_key: 140 }
    );
    assert_eq!(store.inner.snapshot().await.direct, 140);
    assert_eq!(client.cursor(SyncScope::Direct).await, Some(140));
}
