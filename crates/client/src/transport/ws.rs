//! WebSocket transport on tokio-tungstenite.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use guestcp_protocol::Frame;
use guestcp_protocol::constants::WS_MAX_MESSAGE_SIZE;

use super::{BoxFuture, Channel, Connector};
use crate::error::CopyError;

/// Live connector.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Box<dyn Channel>, CopyError>> {
        Box::pin(async move {
            let mut request = url
                .into_client_request()
                .map_err(|e| CopyError::InvalidEndpoint(e.to_string()))?;
            for (name, value) in headers {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| CopyError::ConnectFailed(format!("header {name}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| CopyError::ConnectFailed(format!("header {name}: {e}")))?;
                request.headers_mut().insert(name, value);
            }

            let mut ws_config = WebSocketConfig::default();
            ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
            ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

            match tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false)
                .await
            {
                Ok((stream, _)) => {
                    debug!(url, "websocket connected");
                    Ok(Box::new(WsChannel { stream }) as Box<dyn Channel>)
                }
                Err(tungstenite::Error::Http(resp)) => {
                    let status = resp.status().as_u16();
                    let body = resp
                        .body()
                        .as_deref()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default();
                    Err(CopyError::UpgradeRejected { status, body })
                }
                Err(e) => Err(CopyError::ConnectFailed(e.to_string())),
            }
        })
    }
}

struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Channel for WsChannel {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), CopyError>> {
        Box::pin(async move {
            let msg = match frame {
                Frame::Text(text) => tungstenite::Message::Text(text.into()),
                Frame::Binary(data) => tungstenite::Message::Binary(data.into()),
            };
            self.stream
                .send(msg)
                .await
                .map_err(|e| CopyError::Transport(e.to_string()))
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Frame>, CopyError>> {
        Box::pin(async move {
            loop {
                let msg = match self.stream.next().await {
                    Some(Ok(msg)) => msg,
                    Some(Err(
                        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                    ))
                    | None => {
                        debug!("websocket stream ended");
                        return Ok(None);
                    }
                    Some(Err(e)) => return Err(CopyError::Transport(e.to_string())),
                };

                match msg {
                    tungstenite::Message::Text(text) => {
                        return Ok(Some(Frame::Text(text.as_str().to_owned())));
                    }
                    tungstenite::Message::Binary(data) => {
                        return Ok(Some(Frame::Binary(data.to_vec())));
                    }
                    tungstenite::Message::Ping(data) => {
                        trace!("received ping, sending pong");
                        let _ = self.stream.send(tungstenite::Message::Pong(data)).await;
                    }
                    tungstenite::Message::Pong(_) => {
                        trace!("received pong");
                    }
                    tungstenite::Message::Close(frame) => {
                        debug!(?frame, "received close frame");
                        return Ok(None);
                    }
                    tungstenite::Message::Frame(_) => {}
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.stream.close(None).await {
                trace!("websocket close: {e}");
            }
        })
    }
}
