//! Bounded retry policy with exponential backoff.
//!
//! One policy shape serves every mutating call site; only the numbers differ
//! between membership changes (critical path) and mark cleanup (cosmetic).
//!
//! # Retry Policy
//!
//! - `max_attempts` counts the initial attempt (3 = initial + 2 retries)
//! - Delay before retry `n` (0-based): `initial_delay * 2^n`, capped at `max_delay`
//! - Jitter: down-jitter up to `jitter_factor` (multiplier in [1 - jitter, 1.0])
//! - A server-provided `retry_after` replaces the computed delay when it is
//!   positive and no longer than `max_retry_after`
//!
//! # Retryable Conditions
//!
//! Only [`PlatformError::Transient`]. A terminal error ends the loop on the
//! attempt that produced it.

use std::future::Future;
use std::time::Duration;

use crate::PlatformError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Backoff delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum computed backoff delay.
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
    /// Longest server-requested wait that is honored.
    pub max_retry_after: Duration,
}

impl RetryPolicy {
    /// Membership grant/revoke: few attempts, generous spacing.
    #[must_use]
    pub fn membership() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.25,
            max_retry_after: Duration::from_secs(5),
        }
    }

    /// Mark cleanup: 50ms, 100ms, capped at 200ms.
    #[must_use]
    pub fn marks() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            jitter_factor: 0.0,
            max_retry_after: Duration::from_secs(1),
        }
    }

    /// Single attempt, no waiting.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
            max_retry_after: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::membership()
    }
}

/// Calculate retry delay with exponential backoff and jitter.
///
/// - `backoff_step`: 0 before first retry, 1 before second, etc.
/// - Respects a server-provided hint if present and in range.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    policy: &RetryPolicy,
    hint: Option<Duration>,
) -> Duration {
    if let Some(hint) = hint
        && hint > Duration::ZERO
        && hint <= policy.max_retry_after
    {
        return hint;
    }

    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(policy.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * policy.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Outcome of a retried operation.
///
/// This is a sum type that structurally distinguishes success from the two
/// ways of giving up, so callers cannot log a terminal rejection as if it
/// were a rate-limit exhaustion.
#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T> {
    Success(T),
    /// A non-retryable error; `attempts` includes the failing one.
    Terminal { attempts: u32, error: PlatformError },
    /// Every attempt failed transiently.
    Exhausted { attempts: u32, error: PlatformError },
}

impl<T> RetryOutcome<T> {
    pub fn into_result(self) -> Result<T, PlatformError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Terminal { error, .. } | Self::Exhausted { error, .. } => Err(error),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Success(_) => None,
            Self::Terminal { attempts, .. } | Self::Exhausted { attempts, .. } => Some(*attempts),
        }
    }
}

/// Run `attempt` until it succeeds, fails terminally, or the policy's
/// attempt budget is spent.
///
/// `attempt` is called once per try and must build a fresh future each time.
pub async fn run_with_retry<T, F, Fut>(
    operation: &'static str,
    policy: &RetryPolicy,
    mut attempt: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut tries = 0;

    loop {
        tries += 1;
        let error = match attempt().await {
            Ok(value) => return RetryOutcome::Success(value),
            Err(error) => error,
        };

        if !error.is_transient() {
            return RetryOutcome::Terminal {
                attempts: tries,
                error,
            };
        }

        if tries >= max_attempts {
            return RetryOutcome::Exhausted {
                attempts: tries,
                error,
            };
        }

        let delay = calculate_retry_delay(tries - 1, policy, error.retry_after());
        tracing::debug!(
            operation,
            error = %error,
            attempt = tries,
            delay_ms = delay.as_millis(),
            "Retrying after transient failure"
        );
        tokio::time::sleep(delay).await;
    }
}
