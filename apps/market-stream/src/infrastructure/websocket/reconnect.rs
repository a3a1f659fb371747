//! Reconnection Policy
//!
//! Exponential backoff with jitter. Successive delays never decrease and never
//! exceed the cap; the policy is reset once market data flows on a connection.
//! There is no attempt limit: the client retries until cancelled or until a
//! fatal error.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: f64,
    /// Extra random delay as a fraction of the nominal delay (0.2 = up to +20%).
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl ReconnectConfig {
    /// Create configuration from [`StreamSettings`].
    #[must_use]
    pub const fn from_settings(settings: &StreamSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: settings.reconnect_jitter,
        }
    }
}

/// Stateful backoff calculator for one client.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    nominal: Duration,
    last_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            nominal: initial_delay,
            last_delay: Duration::ZERO,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt.
    ///
    /// Never less than the previous delay, never more than `max_delay`.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);

        let jittered = self.nominal.saturating_add(self.jitter(self.nominal));
        let delay = jittered.max(self.last_delay).min(self.config.max_delay);

        self.last_delay = delay;
        self.nominal = self.grow(self.nominal);

        delay
    }

    /// Reset after a connection delivered market data.
    pub const fn reset(&mut self) {
        self.nominal = self.config.initial_delay;
        self.last_delay = Duration::ZERO;
        self.attempt_count = 0;
    }

    /// Attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn grow(&self, delay: Duration) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let scaled = (delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }

    fn jitter(&self, delay: Duration) -> Duration {
        let factor = self.config.jitter_factor;
        if factor.is_nan() || factor <= 0.0 || delay.is_zero() {
            return Duration::ZERO;
        }

        // Never more jitter than the cap allows; also keeps the range finite.
        #[allow(clippy::cast_precision_loss)]
        let range =
            (delay.as_millis() as f64 * factor).min(self.config.max_delay.as_millis() as f64);
        if !range.is_finite() || range <= 0.0 {
            return Duration::ZERO;
        }
        let extra: f64 = rand::rng().random_range(0.0..=range);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(extra as u64)
    }
}
