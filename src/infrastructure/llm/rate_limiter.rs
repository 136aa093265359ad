use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

/// Token bucket rate limiter for completion requests
///
/// Capacity equals the refill rate (at least one token), so a burst of up
/// to one second's worth of requests goes through immediately and the rest
/// are spaced out.
pub struct TokenBucketRateLimiter {
    state: Mutex<Bucket>,
    capacity: f64,
    refill_rate: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// `requests_per_second` must be positive; non-positive values are clamped
    /// to one request per minute
    pub fn new(requests_per_second: f64) -> Self {
        let refill_rate = if requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0 / 60.0
        };
        let capacity = refill_rate.max(1.0);

        Self {
            state: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_rate)
            };

            sleep(wait).await;
        }
    }
}
