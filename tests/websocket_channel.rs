//! End-to-end channel behaviour against a local websocket server.

use std::sync::Arc;
use std::time::Duration;

use chatter::config::ReconnectPolicy;
use chatter::sound::AudioCues;
use chatter::{
    ChannelEvent, ChatSession, Connector, FaultKind, LatestMessages, Message, TransportKind,
    TransportOptions, WireEncoding,
};
use frames::{BOT_MESSAGE, BOT_TYPING, Frame, USER_MESSAGE};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

fn options(encoding: WireEncoding, attempts: u32) -> TransportOptions {
    TransportOptions {
        encoding,
        connect_timeout: Duration::from_millis(500),
        reconnect: ReconnectPolicy {
            attempts,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(50),
        },
    }
}

fn connector(encoding: WireEncoding, attempts: u32) -> Connector {
    Connector::new(tokio::runtime::Handle::current(), options(encoding, attempts))
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("ws://{addr}"))
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = timeout(WAIT, listener.accept()).await.expect("accept timed out").expect("accept");
    tokio_tungstenite::accept_async(tcp).await.expect("handshake")
}

async fn recv_frame(server: &mut WebSocketStream<TcpStream>) -> Frame {
    loop {
        let message = timeout(WAIT, server.next())
            .await
            .expect("server receive timed out")
            .expect("stream ended")
            .expect("server socket error");
        match message {
            WsMessage::Text(text) => return frames::decode_json(text.as_str()).expect("json frame"),
            WsMessage::Binary(bytes) => return frames::decode_frame(&bytes).expect("protobuf frame"),
            _ => {}
        }
    }
}

async fn send_json(server: &mut WebSocketStream<TcpStream>, frame: &Frame) {
    server.send(WsMessage::Text(frames::encode_json(frame).into())).await.expect("server send");
}

fn mount(connector: &Connector, endpoint: &str) -> ChatSession {
    let handle = connector.connect(endpoint, &[TransportKind::WebSocket]);
    ChatSession::mount(handle, "Hi, I'm Botty.", LatestMessages::new(), Arc::new(AudioCues::default()))
}

async fn next_event(session: &mut ChatSession) -> ChannelEvent {
    timeout(WAIT, session.next_event()).await.expect("event timed out").expect("channel closed")
}

// =============================================================
// Messaging
// =============================================================

#[tokio::test]
async fn message_exchange_over_json_frames() {
    let (listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 0);
    let mut session = mount(&connector, &endpoint);
    let mut server = accept(&listener).await;

    session.send_message("hi").expect("send");
    assert_eq!(recv_frame(&mut server).await, Frame::text(USER_MESSAGE, "hi"));

    send_json(&mut server, &Frame::new(BOT_TYPING, serde_json::Value::Null)).await;
    send_json(&mut server, &Frame::text(BOT_MESSAGE, "hello")).await;

    let typing = next_event(&mut session).await;
    assert_eq!(typing, ChannelEvent::TypingSignaled);
    session.apply(typing);
    assert!(session.state().typing_indicator_visible());

    let message = next_event(&mut session).await;
    session.apply(message);
    assert!(!session.state().typing_indicator_visible());
    assert_eq!(
        session.state().messages(),
        &[Message::remote("Hi, I'm Botty."), Message::local("hi"), Message::remote("hello")]
    );
}

#[tokio::test]
async fn protobuf_encoding_sends_binary_frames_and_accepts_them_back() {
    let (listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Protobuf, 0);
    let mut session = mount(&connector, &endpoint);
    let mut server = accept(&listener).await;

    session.send_message("binary please").expect("send");
    let message = timeout(WAIT, server.next()).await.expect("timed out").expect("ended").expect("error");
    let WsMessage::Binary(bytes) = message else {
        panic!("expected a binary message");
    };
    assert_eq!(frames::decode_frame(&bytes).expect("decode"), Frame::text(USER_MESSAGE, "binary please"));

    let reply = frames::encode_frame(&Frame::text(BOT_MESSAGE, "binary reply"));
    server.send(WsMessage::Binary(reply.into())).await.expect("server send");
    assert_eq!(next_event(&mut session).await, ChannelEvent::MessageReceived("binary reply".into()));
}

#[tokio::test]
async fn undecodable_frames_are_skipped() {
    let (listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 0);
    let mut session = mount(&connector, &endpoint);
    let mut server = accept(&listener).await;

    server.send(WsMessage::Text("not a frame".into())).await.expect("send");
    send_json(&mut server, &Frame::text("unknown-event", "x")).await;
    send_json(&mut server, &Frame::text(BOT_MESSAGE, "still here")).await;

    assert_eq!(next_event(&mut session).await, ChannelEvent::MessageReceived("still here".into()));
}

// =============================================================
// Faults
// =============================================================

#[tokio::test]
async fn refused_connection_reports_connect_error() {
    let (listener, endpoint) = bind().await;
    drop(listener);
    let connector = connector(WireEncoding::Json, 0);
    let mut session = mount(&connector, &endpoint);

    let event = next_event(&mut session).await;
    assert_eq!(event, ChannelEvent::FaultOccurred(FaultKind::ConnectError));
    session.apply(event);

    let view = session.render();
    assert_eq!(view.error_banner.as_deref(), Some("There was an error connecting."));
    assert!(view.composer.is_none());
}

#[tokio::test]
async fn silent_server_reports_connect_timeout() {
    let (_listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 0);
    let mut session = mount(&connector, &endpoint);

    assert_eq!(next_event(&mut session).await, ChannelEvent::FaultOccurred(FaultKind::ConnectTimeout));
}

#[tokio::test]
async fn server_close_reports_disconnect_then_reconnect_errors() {
    let (listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 2);
    let mut session = mount(&connector, &endpoint);

    let mut server = accept(&listener).await;
    drop(listener);
    server.close(None).await.expect("close");

    let mut faults = Vec::new();
    for _ in 0..3 {
        let event = next_event(&mut session).await;
        faults.push(event.clone());
        session.apply(event);
    }

    assert_eq!(
        faults,
        vec![
            ChannelEvent::FaultOccurred(FaultKind::Disconnect),
            ChannelEvent::FaultOccurred(FaultKind::ReconnectError),
            ChannelEvent::FaultOccurred(FaultKind::ReconnectError),
        ]
    );
    let view = session.render();
    assert_eq!(view.error_banner.as_deref(), Some("There was an error. Disconnected from Botty."));
    assert!(view.composer.is_none());
}

#[tokio::test]
async fn transport_reconnects_and_flushes_queued_frames() {
    let (listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 3);
    let mut session = mount(&connector, &endpoint);

    let mut first = accept(&listener).await;
    first.close(None).await.expect("close");
    assert_eq!(next_event(&mut session).await, ChannelEvent::FaultOccurred(FaultKind::Disconnect));

    assert!(session.handle().send_message("queued while down"));
    let mut second = accept(&listener).await;
    assert_eq!(recv_frame(&mut second).await, Frame::text(USER_MESSAGE, "queued while down"));
}

#[tokio::test]
async fn remount_after_transport_gives_up_opens_a_new_channel() {
    let (listener, endpoint) = bind().await;
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let connector = connector(WireEncoding::Json, 1);

    let mut first = mount(&connector, &endpoint);
    assert_eq!(next_event(&mut first).await, ChannelEvent::FaultOccurred(FaultKind::ConnectError));
    assert_eq!(next_event(&mut first).await, ChannelEvent::FaultOccurred(FaultKind::ReconnectError));
    let stale = first.handle().clone();
    first.teardown();

    timeout(WAIT, async {
        while !stale.is_closed() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("transport never stopped");
    assert!(!stale.send_message("lost"));
    assert_eq!(connector.open_channels(), 0);

    let listener = TcpListener::bind(addr).await.expect("rebind");
    let mut second = mount(&connector, &endpoint);
    assert!(!second.handle().same_channel(&stale));
    assert!(second.render().composer.is_some());

    let mut server = accept(&listener).await;
    second.send_message("back again").expect("send");
    assert_eq!(recv_frame(&mut server).await, Frame::text(USER_MESSAGE, "back again"));
    assert_eq!(connector.open_channels(), 1);
}

// =============================================================
// Sharing and teardown
// =============================================================

#[tokio::test]
async fn connector_shares_one_channel_per_endpoint() {
    let (_listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 0);

    let a = connector.connect(&endpoint, &[TransportKind::WebSocket]);
    let b = connector.connect(&endpoint, &[TransportKind::WebSocket]);
    let c = connector.connect(&endpoint, &[TransportKind::Polling, TransportKind::WebSocket]);

    assert!(a.same_channel(&b));
    assert!(!a.same_channel(&c));
    assert_eq!(connector.open_channels(), 2);
}

#[tokio::test]
async fn teardown_leaves_no_listeners_on_the_shared_channel() {
    let (listener, endpoint) = bind().await;
    let connector = connector(WireEncoding::Json, 0);
    let first = mount(&connector, &endpoint);
    let second = mount(&connector, &endpoint);
    let _server = accept(&listener).await;

    let handle = first.handle().clone();
    assert_eq!(handle.active_listeners(), 2);

    first.teardown();
    assert_eq!(handle.active_listeners(), 1);
    second.teardown();
    assert_eq!(handle.active_listeners(), 0);
}
