//! WebSocket transport link.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

use async_trait::async_trait;

use crate::error::{Result, VoxlinkError};
use crate::io::{TransportLink, TransportReceiver, TransportSender};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection parameters for a realtime WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsConnectOptions {
    /// Base endpoint, e.g. `wss://api.openai.com/v1/realtime`.
    pub url: String,
    pub api_key: String,
    pub model: String,
}

/// [`TransportLink`] over a realtime WebSocket connection.
pub struct WsTransport {
    socket: WsStream,
}

impl WsTransport {
    /// Connect and authenticate. The session configuration is not sent here;
    /// that is the coordinator's first message.
    pub async fn connect(options: &WsConnectOptions) -> Result<Self> {
        if options.api_key.trim().is_empty() {
            return Err(VoxlinkError::Authentication("Missing API key".into()));
        }
        let url = build_endpoint_url(&options.url, &options.model)?;

        let mut request = url.into_client_request().map_err(|error| {
            VoxlinkError::Configuration(format!("Invalid websocket URL: {error}"))
        })?;
        let auth_value =
            HeaderValue::from_str(&format!("Bearer {}", options.api_key)).map_err(|error| {
                VoxlinkError::Configuration(format!("Invalid auth header: {error}"))
            })?;
        request.headers_mut().insert("Authorization", auth_value);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (socket, _) = connect_async(request).await.map_err(map_connect_error)?;
        Ok(Self { socket })
    }
}

fn build_endpoint_url(base_url: &str, model: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(VoxlinkError::Configuration(
            "Websocket base URL cannot be empty".into(),
        ));
    }
    let (base, query) = match trimmed.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (trimmed, None),
    };
    // An authority-only base needs an explicit "/" path: the handshake
    // request line is built from the raw path-and-query, and a request
    // target that starts with "?" is rejected by servers.
    let root = match base.split_once("://") {
        Some((_, rest)) if !rest.contains('/') => "/",
        _ => "",
    };
    Ok(match query {
        Some(query) => format!("{base}{root}?{query}&model={model}"),
        None => format!("{base}{root}?model={model}"),
    })
}

fn map_connect_error(error: WsError) -> VoxlinkError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                VoxlinkError::Authentication(format!(
                    "Websocket authentication failed with status {status}"
                ))
            } else {
                VoxlinkError::Transport(format!(
                    "Websocket handshake failed with status {status}"
                ))
            }
        }
        WsError::Io(error) => VoxlinkError::Io(error),
        WsError::Url(error) => {
            VoxlinkError::Configuration(format!("Invalid websocket URL: {error}"))
        }
        other => VoxlinkError::Transport(format!("Websocket connect failed: {other}")),
    }
}

/// Turn one received frame into the next protocol message, if any.
fn frame_to_message(frame: Message) -> Option<Result<Option<String>>> {
    match frame {
        Message::Text(text) => Some(Ok(Some(text.to_string()))),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(Some(text))),
            Err(_) => {
                tracing::warn!("Discarding non-UTF-8 binary frame");
                None
            }
        },
        // Pongs are queued automatically; control frames carry no messages.
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        Message::Close(_) => Some(Ok(None)),
    }
}

fn map_stream_error(error: WsError) -> Result<Option<String>> {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => Ok(None),
        other => Err(VoxlinkError::Transport(format!(
            "Websocket receive failed: {other}"
        ))),
    }
}

#[async_trait]
impl TransportLink for WsTransport {
    async fn send(&mut self, message: String) -> Result<()> {
        self.socket
            .send(Message::Text(message.into()))
            .await
            .map_err(|error| VoxlinkError::Transport(format!("Websocket send failed: {error}")))
    }

    async fn receive(&mut self) -> Result<Option<String>> {
        loop {
            match self.socket.next().await {
                Some(Ok(frame)) => {
                    if let Some(outcome) = frame_to_message(frame) {
                        return outcome;
                    }
                }
                Some(Err(error)) => return map_stream_error(error),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.socket.send(Message::Close(None)).await;
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>) {
        let (sink, stream) = self.socket.split();
        (Box::new(WsSender { sink }), Box::new(WsReceiver { stream }))
    }
}

pub struct WsSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send(&mut self, message: String) -> Result<()> {
        self.sink
            .send(Message::Text(message.into()))
            .await
            .map_err(|error| VoxlinkError::Transport(format!("Websocket send failed: {error}")))
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
        Ok(())
    }
}

pub struct WsReceiver {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportReceiver for WsReceiver {
    async fn receive(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(frame)) => {
                    if let Some(outcome) = frame_to_message(frame) {
                        return outcome;
                    }
                }
                Some(Err(error)) => return map_stream_error(error),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_appends_model_query() {
        assert_eq!(
            build_endpoint_url("wss://api.example.com/v1/realtime", "gpt-4o-realtime-preview")
                .expect("url should build"),
            "wss://api.example.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
        assert_eq!(
            build_endpoint_url("wss://api.example.com/v1/realtime?beta=1", "m")
                .expect("url should build"),
            "wss://api.example.com/v1/realtime?beta=1&model=m"
        );
    }

    #[test]
    fn empty_base_url_is_a_configuration_error() {
        assert!(matches!(
            build_endpoint_url("  ", "m"),
            Err(VoxlinkError::Configuration(_))
        ));
    }

    #[test]
    fn text_and_close_frames_map_to_messages() {
        match frame_to_message(Message::Text("hi".into())) {
            Some(Ok(Some(text))) => assert_eq!(text, "hi"),
            other => panic!("unexpected mapping: {other:?}"),
        }
        assert!(matches!(
            frame_to_message(Message::Close(None)),
            Some(Ok(None))
        ));
        assert!(frame_to_message(Message::Ping(Default::default())).is_none());
        assert!(frame_to_message(Message::Pong(Default::default())).is_none());
    }
}
