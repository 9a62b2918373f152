use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Requests-per-minute token bucket shared by every fetch of a run.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    requests_per_min: u64,
    // (tokens available, time of last refill)
    tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_min: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                requests_per_min,
                tokens: Mutex::new((requests_per_min as f64, Instant::now())),
            }),
        }
    }

    /// Waits until one request may be sent. A zero rate never waits.
    pub async fn acquire(&self) {
        let capacity = self.inner.requests_per_min as f64;
        if capacity <= 0.0 {
            return;
        }
        let refill_rate = capacity / 60.0; // tokens per second
        loop {
            let mut guard = self.inner.tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                return;
            }
            let wait = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(wait.max(0.001))).await;
        }
    }
}
