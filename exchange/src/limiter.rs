use crate::adapter::AdapterError;

use reqwest::Response;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("openchart/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
});

pub trait RateLimiter: Send {
    /// Reserves `weight` tokens, returning how long to wait first if the window is spent.
    fn prepare_request(&mut self, weight: usize) -> Option<Duration>;
}

/// Token bucket refilled in full at the start of every window.
#[derive(Debug)]
pub struct FixedWindowBucket {
    max_tokens: usize,
    available_tokens: usize,
    last_refill: Instant,
    window: Duration,
}

impl FixedWindowBucket {
    pub fn new(max_tokens: usize, window: Duration) -> Self {
        Self {
            max_tokens,
            available_tokens: max_tokens,
            last_refill: Instant::now(),
            window,
        }
    }

    fn refill(&mut self, now: Instant) {
        if now.duration_since(self.last_refill) >= self.window {
            self.available_tokens = self.max_tokens;
            self.last_refill = now;
        }
    }

    fn reserve_at(&mut self, weight: usize, now: Instant) -> Option<Duration> {
        self.refill(now);

        if self.available_tokens >= weight {
            self.available_tokens -= weight;
            return None;
        }

        let next_window = self.last_refill + self.window;
        let wait = next_window.saturating_duration_since(now);

        // the caller sleeps into the next window, which then belongs to this request
        self.available_tokens = self.max_tokens.saturating_sub(weight);
        self.last_refill = next_window;

        Some(wait)
    }
}

impl RateLimiter for FixedWindowBucket {
    fn prepare_request(&mut self, weight: usize) -> Option<Duration> {
        self.reserve_at(weight, Instant::now())
    }
}

pub async fn http_request_with_limiter<L: RateLimiter>(
    url: &str,
    limiter: &Mutex<L>,
    weight: usize,
) -> Result<String, AdapterError> {
    let response = rate_limited_get(url, limiter, weight).await?;
    response.text().await.map_err(AdapterError::from)
}

async fn rate_limited_get<L: RateLimiter>(
    url: &str,
    limiter: &Mutex<L>,
    weight: usize,
) -> Result<Response, AdapterError> {
    let wait = limiter.lock().await.prepare_request(weight);

    if let Some(wait) = wait {
        log::debug!("Rate limit reached, waiting {wait:?}");
        tokio::time::sleep(wait).await;
    }

    let response = HTTP_CLIENT.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::warn!("GET {url} returned {status}: {body}");

        return Err(AdapterError::HttpStatus(
            status.as_u16(),
            status
                .canonical_reason()
                .map_or_else(|| body.clone(), str::to_string),
        ));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_serves_until_window_is_spent() {
        let start = Instant::now();
        let mut bucket = FixedWindowBucket::new(3, Duration::from_secs(1));
        bucket.last_refill = start;

        assert_eq!(bucket.reserve_at(1, start), None);
        assert_eq!(bucket.reserve_at(2, start), None);

        let wait = bucket.reserve_at(1, start + Duration::from_millis(400));
        assert_eq!(wait, Some(Duration::from_millis(600)));
    }

    #[test]
    fn bucket_refills_after_window() {
        let start = Instant::now();
        let mut bucket = FixedWindowBucket::new(2, Duration::from_secs(1));
        bucket.last_refill = start;

        assert_eq!(bucket.reserve_at(2, start), None);
        assert_eq!(bucket.reserve_at(2, start + Duration::from_secs(1)), None);
    }

    #[test]
    fn queued_requests_wait_for_successive_windows() {
        let start = Instant::now();
        let mut bucket = FixedWindowBucket::new(1, Duration::from_secs(1));
        bucket.last_refill = start;

        assert_eq!(bucket.reserve_at(1, start), None);
        assert_eq!(bucket.reserve_at(1, start), Some(Duration::from_secs(1)));
        assert_eq!(bucket.reserve_at(1, start), Some(Duration::from_secs(2)));
    }
}
