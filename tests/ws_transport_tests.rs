//! Loopback websocket tests against a local tokio-tungstenite server.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, accept_hdr_async};

use voxlink::error::VoxlinkError;
use voxlink::io::TransportLink;
use voxlink::transport::{WsConnectOptions, WsTransport};

#[derive(Clone, Debug)]
struct CapturedHandshake {
    uri: String,
    authorization: Option<String>,
    beta: Option<String>,
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn connect_sends_auth_headers_and_model_query() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener address");

    let captured: Arc<Mutex<Option<CapturedHandshake>>> = Arc::new(Mutex::new(None));
    let captured_server = Arc::clone(&captured);
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept should succeed");
        let mut socket = accept_hdr_async(stream, |request: &Request, response: Response| {
            *captured_server
                .lock()
                .expect("handshake lock should not poison") = Some(CapturedHandshake {
                uri: request.uri().to_string(),
                authorization: header(request, "Authorization"),
                beta: header(request, "OpenAI-Beta"),
            });
            Ok(response)
        })
        .await
        .expect("handshake should succeed");

        socket
            .send(Message::Text(
                r#"{"type":"session.created","session":{"id":"sess_1"}}"#.into(),
            ))
            .await
            .expect("server send should succeed");

        let echoed = socket
            .next()
            .await
            .expect("client frame")
            .expect("client frame should be ok");
        assert_eq!(echoed, Message::Text(r#"{"type":"ping"}"#.into()));

        while let Some(frame) = socket.next().await {
            if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    });

    let mut transport = WsTransport::connect(&WsConnectOptions {
        url: format!("ws://{addr}"),
        api_key: "sk-test".into(),
        model: "gpt-4o-realtime-preview".into(),
    })
    .await
    .expect("connect should succeed");

    let received = transport
        .receive()
        .await
        .expect("receive should succeed")
        .expect("server message");
    assert!(received.contains("session.created"));

    transport
        .send(r#"{"type":"ping"}"#.to_string())
        .await
        .expect("send should succeed");
    transport.close().await.expect("close should succeed");
    server.await.expect("server task should complete");

    let handshake = captured
        .lock()
        .expect("handshake lock should not poison")
        .clone()
        .expect("handshake should be captured");
    assert!(handshake.uri.ends_with("?model=gpt-4o-realtime-preview"));
    assert_eq!(handshake.authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(handshake.beta.as_deref(), Some("realtime=v1"));
}

#[tokio::test]
async fn missing_api_key_fails_before_dialing() {
    let result = WsTransport::connect(&WsConnectOptions {
        url: "ws://127.0.0.1:9".into(),
        api_key: "   ".into(),
        model: "gpt-4o-realtime-preview".into(),
    })
    .await;
    assert!(matches!(result, Err(VoxlinkError::Authentication(_))));
}

#[tokio::test]
async fn split_halves_send_and_receive_independently() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener address");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept should succeed");
        let mut socket = accept_async(stream).await.expect("handshake should succeed");

        let first = socket
            .next()
            .await
            .expect("client frame")
            .expect("client frame should be ok");
        assert_eq!(first, Message::Text("outbound".into()));

        // Binary frames carrying UTF-8 are delivered as protocol messages.
        socket
            .send(Message::Binary(b"inbound".to_vec().into()))
            .await
            .expect("server send should succeed");

        while let Some(frame) = socket.next().await {
            if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    });

    let transport = WsTransport::connect(&WsConnectOptions {
        url: format!("ws://{addr}"),
        api_key: "sk-test".into(),
        model: "gpt-4o-realtime-preview".into(),
    })
    .await
    .expect("connect should succeed");

    let (mut sender, mut receiver) = (Box::new(transport) as Box<dyn TransportLink>).split();
    sender
        .send("outbound".to_string())
        .await
        .expect("send should succeed");
    let inbound = receiver
        .receive()
        .await
        .expect("receive should succeed")
        .expect("server message");
    assert_eq!(inbound, "inbound");

    sender.close().await.expect("close should succeed");
    server.await.expect("server task should complete");
}

#[tokio::test]
async fn server_close_ends_the_inbound_stream() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener address");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept should succeed");
        let mut socket = accept_async(stream).await.expect("handshake should succeed");
        socket
            .close(None)
            .await
            .expect("server close should succeed");
    });

    let mut transport = WsTransport::connect(&WsConnectOptions {
        url: format!("ws://{addr}"),
        api_key: "sk-test".into(),
        model: "gpt-4o-realtime-preview".into(),
    })
    .await
    .expect("connect should succeed");

    assert_eq!(transport.receive().await.expect("receive should succeed"), None);
    server.await.expect("server task should complete");
}
