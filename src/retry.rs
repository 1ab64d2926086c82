// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry helpers.
//!
//! - [`poll_immediate`] runs an operation now and then at a fixed interval until it
//!   succeeds, fails permanently, or a ceiling elapses. The detectors use it to wait
//!   for a database process that is still starting.
//! - [`ItemExponentialBackoff`] computes the per-pod requeue delay of the controller
//!   from the number of consecutive failures of that pod.

use crate::constants::{
    CONNECT_RETRY_CEILING_SECS, CONNECT_RETRY_INTERVAL_SECS, REQUEUE_BASE_DELAY_MILLIS,
    REQUEUE_MAX_DELAY_SECS,
};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Fixed-interval polling bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait between attempts
    pub interval: Duration,
    /// Total time after which polling gives up
    pub ceiling: Duration,
}

impl Default for PollSettings {
    /// 5 second interval, 5 minute ceiling.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(CONNECT_RETRY_INTERVAL_SECS),
            ceiling: Duration::from_secs(CONNECT_RETRY_CEILING_SECS),
        }
    }
}

/// Outcome of a poll that did not succeed.
#[derive(Debug)]
pub enum PollError<E> {
    /// The operation returned an error that is not worth retrying
    Failed(E),
    /// Every attempt within the ceiling returned a retryable error
    TimedOut {
        elapsed: Duration,
        attempts: u32,
        last_error: E,
    },
}

/// Run `operation` immediately, then every `settings.interval` while it returns an
/// error for which `retry_if` holds, until `settings.ceiling` has elapsed.
///
/// The wait is a plain sleep of the calling task; other tasks keep running.
///
/// # Errors
///
/// - [`PollError::Failed`] as soon as `operation` returns a non-retryable error
/// - [`PollError::TimedOut`] when the ceiling elapses with only retryable errors
pub async fn poll_immediate<T, E, F, Fut, R>(
    settings: PollSettings,
    operation_name: &str,
    mut operation: F,
    retry_if: R,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts = attempts,
                        elapsed = ?start.elapsed(),
                        "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(err) if retry_if(&err) => err,
            Err(err) => return Err(PollError::Failed(err)),
        };

        let elapsed = start.elapsed();
        if elapsed + settings.interval > settings.ceiling {
            return Err(PollError::TimedOut {
                elapsed,
                attempts,
                last_error: err,
            });
        }

        warn!(
            operation = operation_name,
            attempt = attempts,
            retry_after = ?settings.interval,
            error = %err,
            "Operation not ready, will retry"
        );
        tokio::time::sleep(settings.interval).await;
    }
}

/// Per-pod exponential backoff: `base * 2^failures`, capped at `max`.
#[derive(Clone, Debug)]
pub struct ItemExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl Default for ItemExponentialBackoff {
    /// 5ms base, 1000s cap, no jitter.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(REQUEUE_BASE_DELAY_MILLIS),
            max: Duration::from_secs(REQUEUE_MAX_DELAY_SECS),
            randomization_factor: 0.0,
        }
    }
}

impl ItemExponentialBackoff {
    /// Delay before the next attempt of a pod that has failed `failures` times before.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2_u32.saturating_pow(failures);
        let capped = self.base.saturating_mul(factor).min(self.max);
        self.apply_jitter(capped)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::rng().random_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
