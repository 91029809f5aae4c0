//! Offline source producing a smooth, repeatable price walk per product.

use super::{
    super::{Bar, Granularity, Product, Tick},
    Event, Source,
};

use chrono::{DateTime, Utc};
use iced_futures::{
    futures::{SinkExt, Stream},
    stream,
};

use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

fn seed(product: &Product) -> u64 {
    // FNV-1a
    product
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
}

fn base_price(product: &Product) -> f64 {
    100.0 + (seed(product) % 50_000) as f64
}

/// Price of `product` at unix second `time`.
fn price_at(product: &Product, time: i64) -> f64 {
    let phase = (seed(product) % 1_000) as f64;
    let t = time as f64 / 3_600.0 + phase;

    let trend = 0.15 * (t / 720.0).sin();
    let swing = 0.05 * (t / 48.0).sin();
    let ripple = 0.01 * (t / 1.7).sin();

    base_price(product) * (1.0 + trend + swing + ripple)
}

fn volume_at(product: &Product, time: i64, granularity: Granularity) -> f64 {
    let t = time as f64 / f64::from(granularity.seconds()) + (seed(product) % 97) as f64;

    f64::from(granularity.seconds()) * (1.6 + (t * 0.61).sin() + 0.5 * (t * 0.13).cos())
}

/// Bars aligned to `granularity` covering `[start, end]`.
pub fn bars(
    product: &Product,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Vec<Bar> {
    let step = i64::from(granularity.seconds());
    let first = start.timestamp().div_euclid(step) * step;
    let first = if first < start.timestamp() {
        first + step
    } else {
        first
    };

    (0..)
        .map(|n| first + n * step)
        .take_while(|time| *time <= end.timestamp())
        .map(|time| {
            let open = price_at(product, time);
            let close = price_at(product, time + step);
            let wiggle = (open - close).abs().max(open * 0.001);

            Bar {
                time,
                open,
                high: open.max(close) + wiggle * 0.5,
                low: open.min(close) - wiggle * 0.5,
                close,
                volume: volume_at(product, time, granularity),
            }
        })
        .collect()
}

fn tick_at(product: &Product, now: DateTime<Utc>) -> Tick {
    let time = now.timestamp();
    let day_ago = time - 86_400;

    let day = bars(
        product,
        DateTime::from_timestamp(day_ago, 0).unwrap_or(now),
        now,
        Granularity::OneHour,
    );

    Tick {
        price: price_at(product, time),
        time: now,
        volume_24h: day.iter().map(|bar| bar.volume).sum(),
        high_24h: day.iter().map(|bar| bar.high).fold(f64::NAN, f64::max),
        low_24h: day.iter().map(|bar| bar.low).fold(f64::NAN, f64::min),
        open_24h: price_at(product, day_ago),
    }
}

pub fn connect_ticker_stream(product: Product) -> impl Stream<Item = Event> {
    stream::channel(100, async move |mut output| {
        let _ = output.send(Event::Connected(Source::Synthetic)).await;

        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;

            let tick = tick_at(&product, Utc::now());
            if output.send(Event::Tick(product.clone(), tick)).await.is_err() {
                log::debug!("Synthetic ticker for {product} has no listener, stopping");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product() -> Product {
        Product::new("DEMO-USD").unwrap()
    }

    #[test]
    fn bars_are_aligned_ordered_and_consistent() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 30).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();

        let bars = bars(&product(), start, end, Granularity::OneHour);

        assert_eq!(bars.len(), 6);
        assert_eq!(bars[0].time, start.timestamp() - 30 + 3_600);
        assert_eq!(bars.last().map(|b| b.time), Some(end.timestamp()));

        for pair in bars.windows(2) {
            assert_eq!(pair[1].time - pair[0].time, 3_600);
            assert_eq!(pair[1].open, pair[0].close);
        }
        for bar in &bars {
            assert!(bar.low <= bar.open.min(bar.close));
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.volume > 0.0);
        }
    }

    #[test]
    fn same_product_same_data() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

        assert_eq!(
            bars(&product(), start, end, Granularity::OneDay),
            bars(&product(), start, end, Granularity::OneDay)
        );
    }

    #[test]
    fn tick_summarises_last_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let tick = tick_at(&product(), now);

        assert!(tick.price.is_finite());
        assert!(tick.low_24h <= tick.high_24h);
        assert!(tick.volume_24h > 0.0);
    }
}
