//! Retry delays for per-item deletes.

use std::time::Duration;

use rand::Rng;

use amnesia_core::{AmnesiaError, RetryPolicy};

/// Exponential backoff driven by a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
}

impl Backoff {
    /// Start a fresh sequence of delays.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Retries handed out so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before retrying after `error`.
    ///
    /// A provider-supplied `retry_after` is used as is and never jittered;
    /// otherwise the policy's exponential delay applies.
    pub fn next_delay(&mut self, error: &AmnesiaError) -> Duration {
        let retry = self.retries;
        self.retries += 1;

        if let Some(wait) = error.retry_after() {
            return wait;
        }

        let base = self.policy.base_delay(retry);
        if self.policy.jitter {
            // 0.5x to 1.5x
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            Duration::from_secs_f64(base.as_secs_f64() * factor)
        } else {
            base
        }
    }

    /// Start over.
    pub fn reset(&mut self) {
        self.retries = 0;
    }
}
