use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};

/// Minimum delay between consecutive requests across all workers.
pub struct RateLimiter {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: AsyncMutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_spaces_out_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let started = Instant::now();
        for _ in 0..4 {
            limiter.wait().await;
        }
        // first call is free
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(600) && waited < Duration::from_millis(700));
    }
}
