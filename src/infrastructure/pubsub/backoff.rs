//! Exponential Backoff with jitter (±20%) and a retry cap

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectSettings;

const JITTER: f64 = 0.2;

/// Reconnect delay schedule.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_retries: u32,
    current: Duration,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(settings: &ReconnectSettings) -> Self {
        Self {
            initial: settings.initial_delay(),
            max: settings.max_delay().max(settings.initial_delay()),
            multiplier: settings.multiplier.max(1.0),
            max_retries: settings.max_retries,
            current: settings.initial_delay(),
            attempts: 0,
        }
    }

    /// Next delay, or `None` once the retry cap is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;

        let base = self.current;
        let grown = base.as_secs_f64() * self.multiplier;
        self.current = Duration::from_secs_f64(grown.min(self.max.as_secs_f64()));

        let factor = rand::rng().random_range((1.0 - JITTER)..=(1.0 + JITTER));
        Some(Duration::from_secs_f64(base.as_secs_f64() * factor))
    }

    /// Forget previous failures after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
