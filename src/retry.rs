//! Bounded retry with backoff.
//!
//! Every wait in the boot cycle is a fixed number of polls with a delay
//! between them.  [`Retry`] makes the bound explicit so a wait always
//! terminates by exhausting its attempts, never by luck.

use embedded_hal::delay::DelayNs;
use log::debug;

/// How the interval grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same interval every time.
    Fixed,
    /// Multiply by `factor` after each attempt, capped at `max_interval_ms`.
    Exponential { factor: u32, max_interval_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval_ms: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, interval_ms: u32) -> Self {
        Self {
            max_attempts,
            interval_ms,
            backoff: Backoff::Fixed,
        }
    }

    /// Upper bound on the total time spent waiting, in milliseconds.
    pub fn worst_case_ms(&self) -> u64 {
        let mut retry = Retry::new(*self);
        let mut total = 0u64;
        while retry.next_attempt() {
            if !retry.is_exhausted() {
                total += u64::from(retry.interval_ms());
                retry.advance_interval();
            }
        }
        total
    }
}

/// Progress through a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Retry {
    policy: RetryPolicy,
    attempt: u32,
    interval_ms: u32,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            interval_ms: policy.interval_ms,
        }
    }

    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Delay before the next attempt.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    /// Start another attempt.  Returns `false` once the budget is spent.
    pub fn next_attempt(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.attempt += 1;
        true
    }

    fn advance_interval(&mut self) {
        if let Backoff::Exponential {
            factor,
            max_interval_ms,
        } = self.policy.backoff
        {
            self.interval_ms = self.interval_ms.saturating_mul(factor).min(max_interval_ms);
        }
    }

    /// Sleep for the current interval, then grow it per the backoff.
    pub fn wait<D: DelayNs + ?Sized>(&mut self, delay: &mut D) {
        delay.delay_ms(self.interval_ms);
        self.advance_interval();
    }
}

/// The condition never held within the attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
}

/// Check `ready` up to `policy.max_attempts` times, waiting between checks.
///
/// `ready` receives the device so it can query the same resource whose
/// delay provider is used for waiting.  No delay follows the final check.
/// Returns the number of checks it took.
pub fn poll_until<D, F>(policy: RetryPolicy, dev: &mut D, mut ready: F) -> Result<u32, RetryExhausted>
where
    D: DelayNs + ?Sized,
    F: FnMut(&mut D) -> bool,
{
    let mut retry = Retry::new(policy);
    while retry.next_attempt() {
        if ready(dev) {
            return Ok(retry.attempt());
        }
        if retry.is_exhausted() {
            break;
        }
        debug!(
            "Retry: attempt {}/{} not ready, waiting {} ms",
            retry.attempt(),
            retry.max_attempts(),
            retry.interval_ms()
        );
        retry.wait(dev);
    }
    Err(RetryExhausted {
        attempts: retry.attempt(),
    })
}
