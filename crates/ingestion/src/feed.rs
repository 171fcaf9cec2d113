//! Live market feed subscription.

use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use pairs_core::config::FeedConfig;
use pairs_core::{Error, Result};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// Raw trade messages for one subscription.
///
/// The stream ending, or yielding an `Err`, means the transport is gone.
pub type FeedStream = BoxStream<'static, Result<String>>;

/// A streaming source of raw trade events.
#[async_trait]
pub trait MarketFeed: Send + Sync + 'static {
    /// Open a live trade subscription for one symbol.
    async fn subscribe(&self, symbol: &str) -> Result<FeedStream>;
}

/// Install the process-wide TLS crypto provider used by `wss://` connections.
///
/// Safe to call more than once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Binance `<symbol>@trade` websocket streams.
#[derive(Debug, Clone)]
pub struct BinanceTradeFeed {
    base_url: String,
}

impl BinanceTradeFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.ws_base_url.clone())
    }

    /// Stream URL for one symbol, e.g. `.../ws/btcusdt@trade`.
    pub fn stream_url(&self, symbol: &str) -> String {
        format!(
            "{}/{}@trade",
            self.base_url.trim_end_matches('/'),
            symbol.to_ascii_lowercase()
        )
    }
}

fn map_message(message: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>) -> Option<Result<String>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(text.to_string())),
        Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
        Ok(Message::Close(frame)) => Some(Err(Error::feed(format!("closed by server: {frame:?}")))),
        // Ping/pong are answered by the websocket layer.
        Ok(_) => None,
        Err(e) => Some(Err(Error::feed(e.to_string()))),
    }
}

#[async_trait]
impl MarketFeed for BinanceTradeFeed {
    async fn subscribe(&self, symbol: &str) -> Result<FeedStream> {
        let url = self.stream_url(symbol);
        debug!(url = %url, "connecting to trade stream");

        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::feed(format!("connect {url}: {e}")))?;

        Ok(ws.filter_map(|message| future::ready(map_message(message))).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        let feed = BinanceTradeFeed::new("wss://stream.binance.com:9443/ws/");
        assert_eq!(
            feed.stream_url("BTCUSDT"),
            "wss://stream.binance.com:9443/ws/btcusdt@trade"
        );
    }

    #[test]
    fn test_map_message() {
        let text = map_message(Ok(Message::Text("{}".into())));
        assert_eq!(text.unwrap().unwrap(), "{}");

        assert!(map_message(Ok(Message::Ping(Default::default()))).is_none());
        assert!(map_message(Ok(Message::Close(None))).unwrap().is_err());
    }
}
