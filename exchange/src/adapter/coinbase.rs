use super::{
    super::{
        Bar, Granularity, Product, Tick,
        connect::{State, connect_ws},
        de_opt_string_to_f64, de_string_to_f64,
        limiter::{self, FixedWindowBucket},
    },
    AdapterError, Event, Source,
};

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use fastwebsockets::{Frame, OpCode};
use iced_futures::{
    futures::{SinkExt, Stream, future::try_join_all},
    stream,
};
use serde::Deserialize;
use serde_json::json;

use std::{sync::LazyLock, time::Duration};
use tokio::sync::Mutex;

const API_DOMAIN: &str = "https://api.exchange.coinbase.com";
const WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";

/// Largest candle count the candles endpoint returns per request.
const MAX_CANDLES: i64 = 300;

/// Public endpoints allow 10 requests per second per IP.
static COINBASE_LIMITER: LazyLock<Mutex<FixedWindowBucket>> =
    LazyLock::new(|| Mutex::new(FixedWindowBucket::new(10, Duration::from_secs(1))));

/// Splits `[start, end]` into request windows of at most [`MAX_CANDLES`] buckets each.
///
/// Consecutive windows share their boundary; the merge step drops the duplicate bar.
fn chunk_ranges(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let span = ChronoDuration::seconds(i64::from(granularity.seconds()) * MAX_CANDLES);

    let mut chunks = vec![];
    let mut chunk_start = start;

    loop {
        let chunk_end = (chunk_start + span).min(end);
        chunks.push((chunk_start, chunk_end));

        if chunk_end >= end {
            break;
        }
        chunk_start = chunk_end;
    }

    chunks
}

fn candles_url(
    product: &Product,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> String {
    format!(
        "{API_DOMAIN}/products/{}/candles?start={}&end={}&granularity={}",
        product.as_str(),
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true),
        granularity.seconds(),
    )
}

/// Rows arrive newest first as `[time, low, high, open, close, volume]`.
fn parse_candles(text: &str) -> Result<Vec<Bar>, AdapterError> {
    let rows: Vec<(i64, f64, f64, f64, f64, f64)> = serde_json::from_str(text).map_err(|e| {
        AdapterError::ParseError(format!("Failed to parse candles: {e}. Response was: {text}"))
    })?;

    Ok(rows
        .into_iter()
        .map(|(time, low, high, open, close, volume)| Bar {
            time,
            open,
            high,
            low,
            close,
            volume,
        })
        .collect())
}

fn merge_chunks(chunks: Vec<Vec<Bar>>) -> Vec<Bar> {
    let mut bars: Vec<Bar> = chunks.into_iter().flatten().collect();

    bars.sort_by_key(|bar| bar.time);
    bars.dedup_by_key(|bar| bar.time);

    bars
}

async fn fetch_chunk(
    product: &Product,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Result<Vec<Bar>, AdapterError> {
    let url = candles_url(product, start, end, granularity);

    let text = limiter::http_request_with_limiter(&url, &COINBASE_LIMITER, 1).await?;
    parse_candles(&text)
}

pub async fn fetch_bars(
    product: &Product,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Result<Vec<Bar>, AdapterError> {
    let chunks = chunk_ranges(start, end, granularity);
    log::debug!(
        "Fetching {product} {granularity} candles from {start} to {end} in {} request(s)",
        chunks.len()
    );

    let responses = try_join_all(
        chunks
            .into_iter()
            .map(|(chunk_start, chunk_end)| fetch_chunk(product, chunk_start, chunk_end, granularity)),
    )
    .await?;

    Ok(merge_chunks(responses))
}

#[derive(Debug, Deserialize)]
struct CoinbaseTicker {
    product_id: String,
    #[serde(deserialize_with = "de_string_to_f64")]
    price: f64,
    time: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_opt_string_to_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string_to_f64")]
    high_24h: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string_to_f64")]
    low_24h: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string_to_f64")]
    open_24h: Option<f64>,
}

impl From<CoinbaseTicker> for Tick {
    fn from(ticker: CoinbaseTicker) -> Self {
        Tick {
            price: ticker.price,
            time: ticker.time,
            volume_24h: ticker.volume_24h.unwrap_or(f64::NAN),
            high_24h: ticker.high_24h.unwrap_or(f64::NAN),
            low_24h: ticker.low_24h.unwrap_or(f64::NAN),
            open_24h: ticker.open_24h.unwrap_or(f64::NAN),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FeedMessage {
    Ticker(CoinbaseTicker),
    Error {
        message: String,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

fn parse_feed_message(payload: &[u8]) -> Result<FeedMessage, AdapterError> {
    serde_json::from_slice(payload).map_err(|e| AdapterError::ParseError(e.to_string()))
}

fn subscribe_message(product: &Product) -> String {
    json!({
        "type": "subscribe",
        "product_ids": [product.as_str()],
        "channels": ["ticker"],
    })
    .to_string()
}

pub fn connect_ticker_stream(product: Product) -> impl Stream<Item = Event> {
    stream::channel(100, async move |mut output| {
        let mut state = State::Disconnected;
        let source = Source::Coinbase;

        loop {
            match &mut state {
                State::Disconnected => match connect_ws(WS_URL).await {
                    Ok(mut websocket) => {
                        let subscribe = subscribe_message(&product);

                        if let Err(e) = websocket
                            .write_frame(Frame::text(fastwebsockets::Payload::Borrowed(
                                subscribe.as_bytes(),
                            )))
                            .await
                        {
                            let _ = output
                                .send(Event::Disconnected(
                                    source,
                                    format!("Failed to subscribe: {e}"),
                                ))
                                .await;
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }

                        log::info!("Subscribed to {product} ticker");
                        state = State::Connected(websocket);
                        let _ = output.send(Event::Connected(source)).await;
                    }
                    Err(e) => {
                        log::warn!("Ticker connection failed: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        let _ = output
                            .send(Event::Disconnected(
                                source,
                                format!("Failed to connect to websocket: {e}"),
                            ))
                            .await;
                    }
                },
                State::Connected(websocket) => match websocket.read_frame().await {
                    Ok(msg) => match msg.opcode {
                        OpCode::Text => match parse_feed_message(&msg.payload) {
                            Ok(FeedMessage::Ticker(ticker)) => {
                                if ticker.product_id == product.as_str() {
                                    let _ = output
                                        .send(Event::Tick(product.clone(), ticker.into()))
                                        .await;
                                }
                            }
                            Ok(FeedMessage::Error { message, reason }) => {
                                let reason = reason.map_or(message.clone(), |r| {
                                    format!("{message}: {r}")
                                });
                                log::error!("Ticker feed error: {reason}");

                                state = State::Disconnected;
                                let _ = output.send(Event::Disconnected(source, reason)).await;
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                            Ok(FeedMessage::Other) => {}
                            Err(e) => log::debug!("Skipping ticker frame: {e}"),
                        },
                        OpCode::Close => {
                            state = State::Disconnected;
                            let _ = output
                                .send(Event::Disconnected(source, "WebSocket closed".to_string()))
                                .await;
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        OpCode::Ping => {
                            let _ = websocket.write_frame(Frame::pong(msg.payload)).await;
                        }
                        _ => {}
                    },
                    Err(e) => {
                        state = State::Disconnected;
                        let _ = output
                            .send(Event::Disconnected(source, format!("WebSocket error: {e}")))
                            .await;
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn candle_columns_map_low_high_open_close() {
        let bars = parse_candles("[[1700000000, 9.5, 12.0, 10.0, 11.0, 42.5]]").unwrap();

        assert_eq!(
            bars,
            vec![Bar {
                time: 1_700_000_000,
                open: 10.0,
                high: 12.0,
                low: 9.5,
                close: 11.0,
                volume: 42.5,
            }]
        );
    }

    #[test]
    fn error_bodies_are_parse_errors() {
        let err = parse_candles(r#"{"message":"NotFound"}"#).unwrap_err();
        assert!(matches!(err, AdapterError::ParseError(_)));
    }

    #[test]
    fn chunks_are_merged_ascending_without_duplicates() {
        let newer = parse_candles("[[300, 1, 2, 1, 2, 1], [240, 1, 2, 1, 2, 1]]").unwrap();
        let older = parse_candles("[[240, 1, 2, 1, 2, 1], [180, 1, 2, 1, 2, 1]]").unwrap();

        let times: Vec<i64> = merge_chunks(vec![newer, older])
            .iter()
            .map(|bar| bar.time)
            .collect();

        assert_eq!(times, vec![180, 240, 300]);
    }

    #[test]
    fn chunk_plan_stays_under_candle_limit() {
        let start = utc(0);
        let end = utc(86_400 * 365);

        let chunks = chunk_ranges(start, end, Granularity::OneHour);

        assert_eq!(chunks.first().map(|c| c.0), Some(start));
        assert_eq!(chunks.last().map(|c| c.1), Some(end));
        assert_eq!(chunks.len(), 30);

        for window in chunks.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
        for (chunk_start, chunk_end) in &chunks {
            let buckets = (*chunk_end - *chunk_start).num_seconds() / 3_600;
            assert!(buckets <= MAX_CANDLES);
        }
    }

    #[test]
    fn empty_range_is_a_single_request() {
        let at = utc(1_700_000_000);
        assert_eq!(chunk_ranges(at, at, Granularity::OneDay), vec![(at, at)]);
    }

    #[test]
    fn candles_url_uses_rfc3339_and_seconds() {
        let product = Product::new("eth-usd").unwrap();
        let url = candles_url(&product, utc(0), utc(3_600), Granularity::OneMinute);

        insta::assert_snapshot!(url, @"https://api.exchange.coinbase.com/products/ETH-USD/candles?start=1970-01-01T00:00:00Z&end=1970-01-01T01:00:00Z&granularity=60");
    }

    #[test]
    fn ticker_message_becomes_tick() {
        let payload = br#"{
            "type": "ticker",
            "sequence": 37475248783,
            "product_id": "BTC-USD",
            "price": "43250.12",
            "open_24h": "42000.00",
            "volume_24h": "18423.5",
            "low_24h": "41800.01",
            "high_24h": "43500",
            "side": "buy",
            "time": "2024-01-15T14:00:00.123456Z",
            "trade_id": 586113911,
            "last_size": "0.001"
        }"#;

        let Ok(FeedMessage::Ticker(ticker)) = parse_feed_message(payload) else {
            panic!("expected a ticker message");
        };
        assert_eq!(ticker.product_id, "BTC-USD");

        let tick = Tick::from(ticker);
        assert_eq!(tick.price, 43_250.12);
        assert_eq!(tick.open_24h, 42_000.0);
        assert_eq!(tick.high_24h, 43_500.0);
        assert_eq!(tick.time.timestamp(), 1_705_327_200);
    }

    #[test]
    fn control_messages_are_recognised() {
        let subscriptions = br#"{"type":"subscriptions","channels":[{"name":"ticker","product_ids":["BTC-USD"]}]}"#;
        assert!(matches!(
            parse_feed_message(subscriptions),
            Ok(FeedMessage::Other)
        ));

        let error = br#"{"type":"error","message":"Failed to subscribe","reason":"FOO-BAR is not a valid product"}"#;
        let Ok(FeedMessage::Error { message, reason }) = parse_feed_message(error) else {
            panic!("expected an error message");
        };
        assert_eq!(message, "Failed to subscribe");
        assert_eq!(reason.as_deref(), Some("FOO-BAR is not a valid product"));
    }

    #[test]
    fn subscribe_message_names_ticker_channel() {
        let product = Product::new("BTC-USD").unwrap();

        insta::assert_snapshot!(
            subscribe_message(&product),
            @r#"{"channels":["ticker"],"product_ids":["BTC-USD"],"type":"subscribe"}"#
        );
    }
}
