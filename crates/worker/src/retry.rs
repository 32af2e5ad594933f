//! Retry driver with attempt limits and backoff.
//!
//! Every error is treated as retryable; there is no transient/permanent
//! classification at this layer.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Attempt limit and backoff schedule for a fallible operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
	/// Exactly one attempt.
	Never,
	/// Constant delay between attempts.
	Fixed { max_attempts: usize, delay_ms: u64 },
	/// Delay doubles after each failure, capped at `max_delay_ms`.
	Exponential {
		max_attempts: usize,
		initial_delay_ms: u64,
		max_delay_ms: u64,
	},
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::Exponential {
			max_attempts: 4,
			initial_delay_ms: 200,
			max_delay_ms: 5_000,
		}
	}
}

impl RetryPolicy {
	/// Total attempts allowed, including the first. Never less than one.
	pub fn max_attempts(&self) -> usize {
		match self {
			Self::Never => 1,
			Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => (*max_attempts).max(1),
		}
	}

	/// Delay to wait after failed attempt number `attempt` (1-based), or
	/// `None` once the attempt budget is spent.
	pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
		if attempt >= self.max_attempts() {
			return None;
		}
		match self {
			Self::Never => None,
			Self::Fixed { delay_ms, .. } => Some(Duration::from_millis(*delay_ms)),
			Self::Exponential {
				initial_delay_ms,
				max_delay_ms,
				..
			} => {
				let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
				let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
				let delay = initial_delay_ms.saturating_mul(factor).min(*max_delay_ms);
				Some(Duration::from_millis(delay))
			}
		}
	}
}

/// One failed attempt that will be retried.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
	/// 1-based index of the attempt that failed.
	pub attempt: usize,
	/// Backoff before the next attempt.
	pub delay: Duration,
	/// Error returned by the attempt.
	pub error: &'a E,
}

/// Result of a [`retry`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
	/// An attempt succeeded.
	Succeeded { value: T, attempts: usize },
	/// Every allowed attempt failed; carries the last error.
	Exhausted { error: E, attempts: usize },
	/// The token fired before an attempt succeeded.
	Cancelled { attempts: usize },
}

impl<T, E> RetryOutcome<T, E> {
	/// Number of attempts started.
	pub fn attempts(&self) -> usize {
		match self {
			Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
		}
	}
}

/// Runs `op` until it succeeds, the policy is exhausted or `cancel` fires.
///
/// `op` receives the 1-based attempt number. `on_retry` is invoked for each
/// failure that will be followed by another attempt. Cancellation preempts
/// both an in-flight attempt and a backoff sleep.
pub async fn retry<T, E, F, Fut, O>(policy: &RetryPolicy, cancel: &CancellationToken, mut op: F, mut on_retry: O) -> RetryOutcome<T, E>
where
	F: FnMut(usize) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: Display,
	O: FnMut(&RetryAttempt<'_, E>),
{
	let mut attempt = 0usize;
	loop {
		if cancel.is_cancelled() {
			return RetryOutcome::Cancelled { attempts: attempt };
		}
		attempt = attempt.wrapping_add(1);

		let result = tokio::select! {
			biased;
			_ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt },
			res = op(attempt) => res,
		};

		let error = match result {
			Ok(value) => return RetryOutcome::Succeeded { value, attempts: attempt },
			Err(error) => error,
		};

		let Some(delay) = policy.delay_after(attempt) else {
			tracing::trace!(attempt, error = %error, "worker.retry.exhausted");
			return RetryOutcome::Exhausted { error, attempts: attempt };
		};

		on_retry(&RetryAttempt {
			attempt,
			delay,
			error: &error,
		});

		if !delay.is_zero() {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt },
				_ = tokio::time::sleep(delay) => {}
			}
		}
	}
}
