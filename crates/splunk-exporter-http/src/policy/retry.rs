//! Backoff schedule for transient Splunk failures.

use std::time::Duration;

/// How often and how patiently a failed request is repeated.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Each wait is the previous one times this factor, up to `max_backoff`.
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

impl RetryConfig {
    /// Fail on the first error.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Waits between consecutive attempts of one request; exhausted once
    /// `max_retries` waits have been handed out.
    pub fn delays(&self) -> Delays {
        Delays {
            next: self.config.initial_backoff.min(self.config.max_backoff),
            remaining: self.config.max_retries,
            multiplier: self.config.multiplier,
            cap: self.config.max_backoff,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    remaining: u32,
    multiplier: u32,
    cap: Duration,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.next;
        self.next = delay.checked_mul(self.multiplier).unwrap_or(self.cap).min(self.cap);
        Some(delay)
    }
}
