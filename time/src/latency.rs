use std::time::{Duration, Instant};

/// Logs how long a scope took when dropped.
pub struct LatencyGuard {
    label: String,
    start: Instant,
}

impl LatencyGuard {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::debug!(
            "{} took {} us, {} ms",
            self.label,
            elapsed.as_micros(),
            elapsed.as_millis()
        );
    }
}
