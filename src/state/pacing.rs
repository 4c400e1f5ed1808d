use crate::config::SchedulerConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks request spacing for the single origin being harvested
///
/// Owned by the scheduler task, which is the only writer of
/// `last_request_time`.
#[derive(Debug, Clone)]
pub struct PacingState {
    /// Number of outbound requests made in this run
    pub request_count: u64,

    /// Timestamp of the last outbound request
    pub last_request_time: Option<Instant>,

    /// Minimum spacing between any two requests
    pub min_interval: Duration,
}

impl PacingState {
    /// Creates a pacing state from the configured request budget
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            request_count: 0,
            last_request_time: None,
            min_interval: min_interval(config.requests_per_second),
        }
    }

    /// Checks if a request may be sent at `now`
    pub fn can_request(&self, now: Instant) -> bool {
        self.time_until_next_request(now).is_none()
    }

    /// Records that a request was made
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Widens the spacing, e.g. to honour a robots.txt crawl delay
    pub fn widen_interval(&mut self, interval: Duration) {
        self.min_interval = self.min_interval.max(interval);
    }

    /// Returns None if a request can be made now, or the duration to wait otherwise
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }
}

/// Spacing implied by a requests-per-second budget
pub fn min_interval(requests_per_second: f64) -> Duration {
    Duration::from_secs_f64(1.0 / requests_per_second)
}
