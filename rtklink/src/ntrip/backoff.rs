use std::time::Duration;

use rand::Rng;

use super::ClientOptions;

/// Growth factor between consecutive reconnection delays
const BACKOFF_MULTIPLIER: f64 = 1.5;
const JITTER_MIN: f64 = 0.9;
const JITTER_MAX: f64 = 1.1;

/// Exponential backoff with ±10% jitter:
/// `min(max_delay, base_delay * 1.5^attempt) * jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ClientOptions::default())
    }
}

impl From<&ClientOptions> for ReconnectPolicy {
    fn from(options: &ClientOptions) -> Self {
        Self {
            base_delay: options.base_reconnect_delay,
            max_delay: options.max_reconnect_delay,
            max_attempts: options.max_reconnect_attempts,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnection number `attempt + 1` with a fixed jitter
    /// factor, clamped to `[0.9, 1.1]`.
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let jitter = if jitter.is_finite() {
            jitter.clamp(JITTER_MIN, JITTER_MAX)
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * BACKOFF_MULTIPLIER.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped * jitter)
    }

    /// [`ReconnectPolicy::delay_for`] with random jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        self.delay_for(attempt, jitter)
    }
}

/// Reconnection bookkeeping, reset by every successful connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectState {
    pub attempts: u32,
    pub last_failure_reason: Option<String>,
}

impl ReconnectState {
    pub fn can_retry(&self, policy: &ReconnectPolicy) -> bool {
        self.attempts < policy.max_attempts
    }

    pub(crate) fn record_failure(&mut self, reason: String) {
        self.last_failure_reason = Some(reason);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
