//! WebSocket transport over tokio-tungstenite.
//!
//! Credentials travel as HTTP headers on the upgrade request:
//! `X-Api-App-Key`, `X-Api-Access-Key`, `X-Api-Resource-Id` and a
//! per-connection `X-Api-Connect-Id`.

use crate::error::{Result, VoxwireError};
use crate::log::LogSink;
use crate::transport::{ConnectRequest, Connection, FrameReceiver, FrameSender, Inbound, Transport};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Once};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const COMPONENT: &str = "websocket";

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the ring crypto provider once per process for `wss://` endpoints.
fn ensure_crypto_provider(log: &dyn LogSink) {
    CRYPTO_PROVIDER.call_once(|| {
        // Err means the embedding application installed its own provider.
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            log.debug(COMPONENT, "rustls crypto provider already installed");
        }
    });
}

/// Transport that opens one WebSocket per connection.
#[derive(Clone)]
pub struct WebSocketTransport {
    log: Arc<dyn LogSink>,
}

impl WebSocketTransport {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        ensure_crypto_provider(&*log);
        Self { log }
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value).map_err(|e| VoxwireError::ConfigInvalidValue {
        key: name.to_string(),
        message: format!("not a valid header value: {}", e),
    })?;
    headers.insert(name, value);
    Ok(())
}

/// Split connect failures into ones worth retrying and ones that are not.
fn classify_error(error: WsError) -> VoxwireError {
    match error {
        WsError::Http(response) => {
            let status = response.status();
            let message = format!("WebSocket upgrade rejected with HTTP {}", status);
            if status.is_server_error() || status.as_u16() == 429 {
                VoxwireError::transient(message)
            } else {
                VoxwireError::fatal(message)
            }
        }
        WsError::Url(e) => VoxwireError::fatal(format!("Invalid endpoint URL: {}", e)),
        WsError::Tls(e) => VoxwireError::fatal(format!("TLS error: {}", e)),
        WsError::HttpFormat(e) => VoxwireError::fatal(format!("Invalid upgrade request: {}", e)),
        other => VoxwireError::transient(format!("WebSocket error: {}", other)),
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, request: &ConnectRequest) -> Result<Connection> {
        ensure_crypto_provider(&*self.log);

        let mut ws_request = request
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(classify_error)?;
        let headers = ws_request.headers_mut();
        insert_header(headers, "X-Api-App-Key", &request.app_key)?;
        insert_header(headers, "X-Api-Access-Key", &request.access_key)?;
        insert_header(headers, "X-Api-Resource-Id", &request.resource_id)?;
        insert_header(headers, "X-Api-Connect-Id", &request.connect_id)?;

        let (stream, response) = connect_async(ws_request).await.map_err(classify_error)?;
        self.log.debug(
            COMPONENT,
            &format!(
                "connected {} (HTTP {})",
                request.connect_id,
                response.status()
            ),
        );

        let (sink, stream) = stream.split();
        Ok(Connection {
            sender: Box::new(WebSocketSender { sink }),
            receiver: Box::new(WebSocketReceiver {
                stream,
                log: Arc::clone(&self.log),
            }),
        })
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

struct WebSocketSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait::async_trait]
impl FrameSender for WebSocketSender {
    async fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        self.sink
            .send(Message::Binary(frame.into()))
            .await
            .map_err(|e| VoxwireError::transient(format!("Failed to send frame: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(VoxwireError::transient(format!(
                "Failed to close WebSocket: {}",
                e
            ))),
        }
    }
}

struct WebSocketReceiver {
    stream: SplitStream<WsStream>,
    log: Arc<dyn LogSink>,
}

#[async_trait::async_trait]
impl FrameReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<Result<Inbound>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Binary(bytes)) => return Some(Ok(Inbound::Binary(bytes.to_vec()))),
                Ok(Message::Text(text)) => {
                    return Some(Ok(Inbound::Text(text.as_str().to_string())));
                }
                Ok(Message::Close(frame)) => {
                    self.log
                        .debug(COMPONENT, &format!("closed by server: {:?}", frame));
                    return None;
                }
                // Ping/Pong are answered by tungstenite itself.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return None,
                Err(e) => {
                    return Some(Err(VoxwireError::transient(format!(
                        "WebSocket receive failed: {}",
                        e
                    ))));
                }
            }
        }
    }
}
