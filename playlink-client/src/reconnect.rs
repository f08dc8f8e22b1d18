//! Reconnection policies
//!
//! The connection supervisor asks its policy for a delay before every
//! reconnect attempt. A policy answers `None` when it has given up, which
//! sends the connection to the failed state until the host explicitly
//! restarts it. Policies are stateful (they count attempts) and are reset
//! whenever a connection is successfully established.

use rand::Rng;
use std::time::Duration;

/// Decides whether and when the next reconnect attempt happens.
pub trait ReconnectPolicy: Send + Sync {
    /// Delay before the next attempt, or `None` to give up.
    ///
    /// Each call advances the internal attempt counter.
    fn next_delay(&mut self) -> Option<Duration>;

    /// Forget all attempt history. Called after every successful connect
    /// and on an explicit restart.
    fn reset(&mut self);
}

/// Exponential backoff with a cap, an attempt limit and optional jitter.
///
/// Delay for attempt `n` (zero-based) is `base * multiplier^n`, capped at
/// `cap`. With jitter enabled, up to a quarter of the computed delay is
/// added on top so that many clients losing the same server do not retry
/// in lockstep.
///
/// # Examples
///
/// ```
/// use playlink_client::reconnect::{ExponentialBackoff, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30))
///     .with_jitter(false);
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    multiplier: f64,
    cap: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    current_attempt: u32,
}

impl Default for ExponentialBackoff {
    /// 100ms doubling up to 30s, at most 10 attempts, jitter on.
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
    }
}

impl ExponentialBackoff {
    /// Create a policy with the given base and cap, doubling each attempt,
    /// giving up after 10 attempts, with jitter enabled.
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            multiplier: 2.0,
            cap,
            max_attempts: Some(10),
            jitter: true,
            current_attempt: 0,
        }
    }

    /// Set the growth factor between attempts. Values below 1.0 are
    /// clamped to 1.0.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Give up after `attempts` consecutive failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Never give up.
    pub fn with_unlimited_attempts(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Attempts made since the last reset.
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.current_attempt >= max {
                return None;
            }
        }

        // Clamp the exponent so powi stays finite for unlimited policies.
        let exponent = self.current_attempt.min(63) as i32;
        let base_ms = self.base.as_millis() as f64;
        let capped_ms = (base_ms * self.multiplier.powi(exponent)).min(self.cap.as_millis() as f64);
        let mut delay_ms = capped_ms as u64;
        self.current_attempt += 1;

        if self.jitter {
            let jitter_max = delay_ms / 4;
            if jitter_max > 0 {
                delay_ms += rand::thread_rng().gen_range(0..=jitter_max);
            }
        }

        Some(Duration::from_millis(delay_ms))
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// The same delay before every attempt. Mostly useful in tests and on
/// local networks where backoff growth buys nothing.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
    current_attempt: u32,
}

impl FixedDelay {
    /// Retry forever with the given delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            current_attempt: 0,
        }
    }

    /// Give up after `attempts` consecutive failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.current_attempt >= max {
                return None;
            }
        }
        self.current_attempt += 1;
        Some(self.delay)
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// Give up on the first failure. The connection goes straight to the
/// failed state and stays there until restarted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
