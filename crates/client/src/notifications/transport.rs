//! Push transport: opens the notification WebSocket and yields text frames.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::ClientError;

/// Inbound text frames; the stream ends when the connection closes.
pub type FrameStream = BoxStream<'static, Result<String, ClientError>>;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, token: &str) -> Result<FrameStream, ClientError>;
}

/// `ws(s)://<host>/api/notifications?token=<access token>`
pub struct WsConnector {
    endpoint: String,
}

impl WsConnector {
    /// `ws_base` is the server origin with a `ws://` or `wss://` scheme.
    pub fn new(ws_base: &str) -> Self {
        Self {
            endpoint: format!("{}/api/notifications", ws_base.trim_end_matches('/')),
        }
    }

    // The server authenticates the upgrade from the query string, not headers.
    fn url(&self, token: &str) -> String {
        format!("{}?token={}", self.endpoint, urlencoding::encode(token))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, token: &str) -> Result<FrameStream, ClientError> {
        let (stream, response) = tokio_tungstenite::connect_async(self.url(token))
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        debug!(
            component = "notifications",
            event = "notifications.handshake",
            status = response.status().as_u16(),
            endpoint = %self.endpoint,
            "WebSocket handshake complete"
        );

        let frames = stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::Network(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_query_encoded() {
        let connector = WsConnector::new("wss://boards.example.com/");
        assert_eq!(
            connector.url("a b+c/="),
            "wss://boards.example.com/api/notifications?token=a%20b%2Bc%2F%3D"
        );
    }
}
