use log::debug;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Process-wide gate that keeps consecutive requests at least `min_interval`
/// apart. One instance is shared by every endpoint of an upstream.
pub struct IntervalLimiter {
    min_interval: Duration,
    // 最近一次(或已预约的)请求发出时间
    last_request: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    // min_interval为0时不做任何等待
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request may be issued and returns how long it waited.
    ///
    /// The slot is reserved before sleeping, so concurrent callers queue up
    /// one interval apart instead of waking together.
    pub async fn acquire(&self) -> Duration {
        let (now, issue_at) = {
            let mut last_request = self.last_request.lock().await;
            let now = Instant::now();
            let issue_at = self.next_slot(*last_request, now);
            *last_request = Some(issue_at);
            (now, issue_at)
        };

        let wait = issue_at.saturating_duration_since(now);
        if !wait.is_zero() {
            debug!("IntervalLimiter sleeping for {:?} to respect rate limits", wait);
            tokio::time::sleep_until(issue_at).await;
        }
        wait
    }

    fn next_slot(&self, last_request: Option<Instant>, now: Instant) -> Instant {
        match last_request {
            Some(prev) => std::cmp::max(now, prev + self.min_interval),
            None => now,
        }
    }
}
