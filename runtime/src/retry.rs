//! Bounded retry with randomized exponential backoff.
//!
//! Contention retry is an explicit, inspectable policy: a fixed attempt budget and a
//! capped backoff curve, with "full jitter" so that colliding callers spread out instead
//! of colliding again in lockstep.
//!
//! # Example
//!
//! ```rust
//! use seqalloc_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .initial_delay(Duration::from_millis(10))
//!     .max_delay(Duration::from_millis(500))
//!     .multiplier(2.0)
//!     .build();
//!
//! let retried = retry_with_predicate(
//!     &policy,
//!     |_attempt| async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("conflict"),
//! )
//! .await;
//! assert_eq!(retried.map(|r| r.value), Ok(42));
//! # Ok(())
//! # }
//! ```

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5 (first try included)
/// - `initial_delay`: 10ms
/// - `max_delay`: 500ms
/// - `multiplier`: 2.0 (delay ceiling doubles each retry)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included. Zero behaves as one.
    pub max_attempts: u32,
    /// Backoff ceiling before the first retry
    pub initial_delay: Duration,
    /// Maximum backoff ceiling (cap for exponential growth)
    pub max_delay: Duration,
    /// Growth factor of the backoff ceiling
    pub multiplier: f64,
}

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MULTIPLIER: f64 = 2.0;

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// The effective attempt budget (never below one).
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff ceiling after the given failed attempt (0-based).
    ///
    /// `initial_delay * multiplier ^ retry`, capped at `max_delay`.
    /// Computed in nanoseconds, so sub-millisecond delays still grow.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_nanos = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent);

        if !delay_nanos.is_finite() || delay_nanos >= self.max_delay.as_nanos() as f64 {
            self.max_delay
        } else if delay_nanos <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(delay_nanos as u64)
        }
    }

    /// A uniformly random delay in `[0, delay_for_attempt(retry)]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let ceiling = self.delay_for_attempt(retry).as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Set the attempt budget (first try included).
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the backoff ceiling before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum backoff ceiling.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the growth factor of the backoff ceiling.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            initial_delay: self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY),
            max_delay: self.max_delay.unwrap_or(DEFAULT_MAX_DELAY),
            multiplier: self.multiplier.unwrap_or(DEFAULT_MULTIPLIER),
        }
    }
}

/// A successful result together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// The operation's result.
    pub value: T,
    /// Attempts made, the successful one included.
    pub attempts: u32,
}

/// Why [`retry_with_predicate`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt in the budget failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The error of the final attempt.
        last_error: E,
    },
    /// An attempt failed with an error the predicate refused to retry.
    Aborted {
        /// Attempts made, the failing one included.
        attempts: u32,
        /// The non-retryable error.
        error: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} attempts: {last_error}"),
            Self::Aborted { attempts, error } => {
                write!(f, "aborted on attempt {attempts}: {error}")
            }
        }
    }
}

/// Retry an async operation while `is_retryable` accepts its errors.
///
/// The operation receives the 1-based attempt number. Between attempts the task
/// sleeps for [`RetryPolicy::jittered_delay`]; no lock is held while sleeping.
///
/// # Errors
///
/// - [`RetryError::Aborted`] as soon as an error is not retryable
/// - [`RetryError::Exhausted`] once the attempt budget is spent
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let budget = policy.attempt_budget();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(RetryError::Aborted {
                        attempts: attempt,
                        error,
                    });
                }

                if attempt >= budget {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }

                let delay = policy.jittered_delay(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_us = delay.as_micros(),
                    error = %error,
                    "Attempt failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
