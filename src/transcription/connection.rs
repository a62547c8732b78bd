//! Realtime WebSocket connection handling
//!
//! A [`Connector`] opens the duplex channel and hands back a [`Link`]: an
//! outbound text sender plus an inbound event receiver. The WebSocket
//! implementation runs one writer and one reader task per connection;
//! dropping the outbound sender makes the writer send a close frame.

use super::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Inbound channel activity
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A text message
    Message(String),
    /// Protocol-level traffic with no payload (ping, pong)
    Liveness,
    /// Peer closed the channel, with its reason if it sent one
    Closed(Option<String>),
    Error(String),
}

/// An open duplex channel
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Opens realtime channels
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Link, TransportError>;
}

/// Socket-level failures mean the host was never reached
fn connect_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::Io(io) => TransportError::Unreachable(io.to_string()),
        other => TransportError::WebSocket(other),
    }
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<Link, TransportError> {
        let (ws_stream, response) = connect_async(url.as_str()).await.map_err(connect_error)?;
        info!(status = %response.status(), "WebSocket connected");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(text)).await {
                    warn!("WebSocket send failed: {}", e);
                    break;
                }
            }
            if let Err(e) = ws_sink.close().await {
                debug!("WebSocket close failed: {}", e);
            }
            debug!("WebSocket writer finished");
        });

        tokio::spawn(async move {
            while let Some(msg_result) = ws_stream.next().await {
                let event = match msg_result {
                    Ok(Message::Text(text)) => LinkEvent::Message(text),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => LinkEvent::Message(text),
                        Err(_) => LinkEvent::Liveness,
                    },
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        trace!("WebSocket ping/pong");
                        LinkEvent::Liveness
                    }
                    Ok(Message::Close(frame)) => {
                        info!("WebSocket closed by server");
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        let _ = inbound_tx.send(LinkEvent::Closed(reason));
                        break;
                    }
                    Ok(Message::Frame(_)) => continue,
                    Err(e) => {
                        error!("WebSocket receive error: {}", e);
                        let _ = inbound_tx.send(LinkEvent::Error(e.to_string()));
                        break;
                    }
                };
                if inbound_tx.send(event).is_err() {
                    break;
                }
            }
            debug!("WebSocket reader finished");
        });

        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Build the channel URL with `model` and `token` query parameters
///
/// `model` is only added when the endpoint does not already carry one.
pub fn build_ws_url(
    endpoint: &str,
    api_key: &str,
    realtime_model: &str,
) -> Result<Url, TransportError> {
    let mut url = Url::parse(endpoint).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    }

    let add_model =
        !realtime_model.is_empty() && !url.query_pairs().any(|(key, _)| key == "model");
    if add_model || !api_key.is_empty() {
        let mut pairs = url.query_pairs_mut();
        if add_model {
            pairs.append_pair("model", realtime_model);
        }
        if !api_key.is_empty() {
            pairs.append_pair("token", api_key);
        }
    }

    Ok(url)
}

/// URL safe for logs: the token value is masked
pub(crate) fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "token" {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    if !pairs.is_empty() {
        masked.query_pairs_mut().clear().extend_pairs(pairs);
    }
    masked.to_string()
}

/// The engine's end of an open channel
///
/// Inbound events are forwarded into the engine loop by a task tagged with the
/// epoch the channel was opened in. Closing aborts the forwarder and drops the
/// outbound sender, which closes the underlying connection.
pub(crate) struct ChannelHandle {
    outbound: mpsc::UnboundedSender<String>,
    forwarder: JoinHandle<()>,
}

impl ChannelHandle {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<String>, forwarder: JoinHandle<()>) -> Self {
        Self {
            outbound,
            forwarder,
        }
    }

    pub(crate) fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub(crate) fn close(self) {
        self.forwarder.abort();
        drop(self.outbound);
        debug!("Channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ws_url_appends_model_and_token() {
        let url = build_ws_url(
            "wss://api.openai.com/v1/realtime",
            "sk-test",
            "gpt-4o-realtime-preview-2024-12-17",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-12-17&token=sk-test"
        );
    }

    #[test]
    fn test_build_ws_url_keeps_existing_model() {
        let url = build_ws_url("wss://example.com/rt?model=custom", "k", "other").unwrap();
        let models: Vec<String> = url
            .query_pairs()
            .filter(|(k, _)| k == "model")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(models, vec!["custom".to_string()]);
        assert!(url.query_pairs().any(|(k, v)| k == "token" && v == "k"));
    }

    #[test]
    fn test_build_ws_url_without_params_has_no_query() {
        let url = build_ws_url("ws://localhost:8080/rt", "", "").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/rt");
    }

    #[test]
    fn test_build_ws_url_rejects_bad_endpoints() {
        assert!(matches!(
            build_ws_url("https://api.openai.com/v1/realtime", "", "m"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            build_ws_url("not a url", "", "m"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_redacted_masks_token() {
        let url = build_ws_url("wss://example.com/rt", "sk-secret", "m").unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("token=***") || shown.contains("token=%2A%2A%2A"));
        assert!(shown.contains("model=m"));
    }

    #[test]
    fn test_connect_error_separates_unreachable_hosts() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            connect_error(tungstenite::Error::Io(refused)),
            TransportError::Unreachable(_)
        ));
        assert!(matches!(
            connect_error(tungstenite::Error::ConnectionClosed),
            TransportError::WebSocket(_)
        ));
    }

    #[tokio::test]
    async fn test_channel_handle_close_closes_outbound() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(tx, tokio::spawn(async {}));
        assert!(handle.is_open());
        assert!(handle.send("hello".to_string()));
        handle.close();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx.recv().await, None);
    }
}
