//! Progress and ETA reporting for long-running stages

use std::fmt;
use std::time::{Duration, Instant};

/// Counts finished units of work against a known total
#[derive(Debug, Clone)]
pub struct Progress {
    total: u64,
    done: u64,
    started: Instant,
}

/// Point-in-time view of a `Progress`
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub done: u64,
    pub total: u64,
    pub percent: u64,
    pub elapsed: Duration,
    pub remaining: Option<Duration>,
    /// Units per minute
    pub rate: f64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            done: 0,
            started: Instant::now(),
        }
    }

    pub fn tick(&mut self) {
        self.done += 1;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        snapshot_at(self.done, self.total, self.started.elapsed())
    }
}

/// Derives percent, throughput and ETA from counters and elapsed time
pub fn snapshot_at(done: u64, total: u64, elapsed: Duration) -> ProgressSnapshot {
    let percent = if total == 0 {
        100
    } else {
        (done.min(total) * 100 + total / 2) / total
    };

    let minutes = elapsed.as_secs_f64() / 60.0;
    let rate = if minutes > 0.0 {
        done as f64 / minutes
    } else {
        0.0
    };

    let remaining = if rate > 0.0 {
        let left = total.saturating_sub(done) as f64;
        Some(Duration::from_secs_f64(left / rate * 60.0))
    } else {
        None
    };

    ProgressSnapshot {
        done,
        total,
        percent,
        elapsed,
        remaining,
        rate,
    }
}

/// Formats a duration as `Xh Ym Zs`
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!(
        "{}h {}m {}s",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eta = self
            .remaining
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        write!(
            f,
            "{}/{} ({}%) | Elapsed: {} | ETA: {} | Rate: {:.2}/min",
            self.done,
            self.total,
            self.percent,
            format_duration(self.elapsed),
            eta,
            self.rate
        )
    }
}
