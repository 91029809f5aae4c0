pub mod coinbase;
pub mod synthetic;

use crate::{Bar, Granularity, Product, Tick};

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("{0}")]
    FetchError(String),
    #[error("HTTP {0}: {1}")]
    HttpStatus(u16, String),
    #[error("Parsing: {0}")]
    ParseError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Websocket: {0}")]
    WebsocketError(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(error: reqwest::Error) -> Self {
        AdapterError::FetchError(error.to_string())
    }
}

/// Where bars and live ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Source {
    #[default]
    Coinbase,
    /// Deterministic offline data, no network access.
    Synthetic,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Coinbase => write!(f, "Coinbase"),
            Source::Synthetic => write!(f, "Synthetic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected(Source),
    Disconnected(Source, String),
    Tick(Product, Tick),
}

/// Fetches the ordered bar sequence for `product` in `[start, end]`.
///
/// Failures are returned as-is; nothing is retried and no partial data is substituted.
pub async fn fetch_bars(
    source: Source,
    product: &Product,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Result<Vec<Bar>, AdapterError> {
    if start > end {
        return Err(AdapterError::InvalidRequest(format!(
            "Range starts after it ends: {start} > {end}"
        )));
    }

    match source {
        Source::Coinbase => coinbase::fetch_bars(product, start, end, granularity).await,
        Source::Synthetic => Ok(synthetic::bars(product, start, end, granularity)),
    }
}

/// Live ticker stream for `product`; runs until dropped.
pub fn connect_ticker_stream(source: Source, product: Product) -> BoxStream<'static, Event> {
    match source {
        Source::Coinbase => coinbase::connect_ticker_stream(product).boxed(),
        Source::Synthetic => synthetic::connect_ticker_stream(product).boxed(),
    }
}
