pub mod adapter;
pub mod connect;
pub mod limiter;
pub mod session;

pub use adapter::{AdapterError, Event, Source};
pub use session::FeedSession;

use chrono::{DateTime, Datelike, Duration, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

/// One OHLCV sample for a fixed time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket open time, unix seconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn is_up_from(&self, previous_close: f64) -> bool {
        self.close >= previous_close
    }
}

/// Live ticker update, independent of the bar sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub volume_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub open_24h: f64,
}

static PRODUCT_ID: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Z0-9]{2,10}-[A-Z0-9]{2,10}$").expect("product id pattern is valid")
});

/// A `BASE-QUOTE` trading pair, e.g. `BTC-USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Product(String);

impl Product {
    pub fn new(id: &str) -> Result<Self, AdapterError> {
        let id = id.trim().to_uppercase();

        if PRODUCT_ID.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(AdapterError::InvalidRequest(format!(
                "Invalid product id: {id:?}, expected BASE-QUOTE"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Product {
    fn default() -> Self {
        Self("BTC-USD".to_string())
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket widths accepted by the quote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl Granularity {
    pub const ALL: [Granularity; 6] = [
        Granularity::OneMinute,
        Granularity::FiveMinutes,
        Granularity::FifteenMinutes,
        Granularity::OneHour,
        Granularity::SixHours,
        Granularity::OneDay,
    ];

    pub fn seconds(self) -> u32 {
        match self {
            Granularity::OneMinute => 60,
            Granularity::FiveMinutes => 300,
            Granularity::FifteenMinutes => 900,
            Granularity::OneHour => 3_600,
            Granularity::SixHours => 21_600,
            Granularity::OneDay => 86_400,
        }
    }
}

impl TryFrom<u32> for Granularity {
    type Error = AdapterError;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|g| g.seconds() == seconds)
            .ok_or_else(|| {
                AdapterError::InvalidRequest(format!("Unsupported granularity: {seconds}s"))
            })
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::OneMinute => write!(f, "1m"),
            Granularity::FiveMinutes => write!(f, "5m"),
            Granularity::FifteenMinutes => write!(f, "15m"),
            Granularity::OneHour => write!(f, "1h"),
            Granularity::SixHours => write!(f, "6h"),
            Granularity::OneDay => write!(f, "1d"),
        }
    }
}

/// Span of history requested for a chart, with its default bar granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    H1,
    D1,
    D5,
    M1,
    M3,
    M6,
    Ytd,
    #[default]
    Y1,
    Y5,
    All,
}

impl Timeframe {
    pub const ALL: [Timeframe; 10] = [
        Timeframe::H1,
        Timeframe::D1,
        Timeframe::D5,
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M6,
        Timeframe::Ytd,
        Timeframe::Y1,
        Timeframe::Y5,
        Timeframe::All,
    ];

    pub fn granularity(self) -> Granularity {
        match self {
            Timeframe::H1 => Granularity::OneMinute,
            Timeframe::D1 => Granularity::FiveMinutes,
            Timeframe::D5 => Granularity::FifteenMinutes,
            Timeframe::M1 => Granularity::OneHour,
            Timeframe::M3 => Granularity::SixHours,
            Timeframe::M6 | Timeframe::Ytd | Timeframe::Y1 | Timeframe::Y5 | Timeframe::All => {
                Granularity::OneDay
            }
        }
    }

    /// Requested `(start, end)` for this timeframe, ending at `now`.
    ///
    /// Day-based lookbacks start at local midnight, matching what a user reads as
    /// "the last N days" on a chart.
    pub fn range_ending(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let days_back = |days: i64| local_midnight(now - Duration::days(days));

        let start = match self {
            Timeframe::H1 => now - Duration::hours(1),
            Timeframe::D1 => days_back(0),
            Timeframe::D5 => days_back(5),
            Timeframe::M1 => days_back(30),
            Timeframe::M3 => days_back(90),
            Timeframe::M6 => days_back(182),
            Timeframe::Ytd => Local
                .with_ymd_and_hms(now.with_timezone(&Local).year(), 1, 1, 0, 0, 0)
                .earliest()
                .map_or_else(|| days_back(365), |dt| dt.with_timezone(&Utc)),
            Timeframe::Y1 => days_back(365),
            Timeframe::Y5 | Timeframe::All => days_back(5 * 365),
        };

        (start.min(now), now)
    }
}

fn local_midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    let local = at.with_timezone(&Local).date_naive().and_time(NaiveTime::MIN);

    Local
        .from_local_datetime(&local)
        .earliest()
        .map_or(at, |dt| dt.with_timezone(&Utc))
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Timeframe::H1 => "1H",
            Timeframe::D1 => "1D",
            Timeframe::D5 => "5D",
            Timeframe::M1 => "1M",
            Timeframe::M3 => "3M",
            Timeframe::M6 => "6M",
            Timeframe::Ytd => "YTD",
            Timeframe::Y1 => "1Y",
            Timeframe::Y5 => "5Y",
            Timeframe::All => "ALL",
        };
        write!(f, "{label}")
    }
}

pub(crate) fn de_string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

pub(crate) fn de_opt_string_to_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| s.parse::<f64>().map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_ids_are_normalised_and_validated() {
        assert_eq!(Product::new(" btc-usd ").unwrap().as_str(), "BTC-USD");
        assert!(Product::new("BTCUSD").is_err());
        assert!(Product::new("B-USD").is_err());
        assert!(Product::new("BTC-USD;drop").is_err());
    }

    #[test]
    fn granularity_accepts_only_provider_buckets() {
        assert_eq!(Granularity::try_from(900).unwrap(), Granularity::FifteenMinutes);
        assert!(Granularity::try_from(120).is_err());
    }

    #[test]
    fn timeframe_defaults_follow_lookback() {
        assert_eq!(Timeframe::H1.granularity().seconds(), 60);
        assert_eq!(Timeframe::D1.granularity().seconds(), 300);
        assert_eq!(Timeframe::D5.granularity().seconds(), 900);
        assert_eq!(Timeframe::M1.granularity().seconds(), 3_600);
        assert_eq!(Timeframe::M3.granularity().seconds(), 21_600);
        assert_eq!(Timeframe::All.granularity().seconds(), 86_400);
    }

    #[test]
    fn ranges_end_now_and_never_start_after_it() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();

        for timeframe in Timeframe::ALL {
            let (start, end) = timeframe.range_ending(now);
            assert_eq!(end, now);
            assert!(start <= end, "{timeframe} starts after now");
        }

        let (start, _) = Timeframe::H1.range_ending(now);
        assert_eq!(now - start, Duration::hours(1));

        let (start, _) = Timeframe::Y1.range_ending(now);
        assert!(now - start >= Duration::days(364));
        assert!(now - start <= Duration::days(366));
    }
}
