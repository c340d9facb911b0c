//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::Result;

/// Governs [`retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub jitter_bound: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(500),
			jitter_bound: Duration::from_millis(100),
		}
	}
}

impl RetryPolicy {
	/// Policy that never sleeps; for tests and already-settled pages.
	pub fn immediate(max_attempts: u32) -> Self {
		Self {
			max_attempts,
			base_delay: Duration::ZERO,
			jitter_bound: Duration::ZERO,
		}
	}

	/// Attempts actually made; a zero budget still runs the action once.
	pub fn attempts(&self) -> u32 {
		self.max_attempts.max(1)
	}

	/// Deterministic part of the sleep after failed attempt `attempt` (1-based).
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16);
		self.base_delay.saturating_mul(1 << exponent)
	}

	/// Full sleep after failed attempt `attempt`, with `jitter` drawn from [0, jitter_bound).
	pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
		self.backoff(attempt) + jitter.min(self.jitter_bound)
	}

	fn sample_jitter(&self) -> Duration {
		if self.jitter_bound.is_zero() {
			return Duration::ZERO;
		}
		rand::rng().random_range(Duration::ZERO..self.jitter_bound)
	}
}

/// Runs `action` until it succeeds, fails fatally, or the policy is exhausted.
///
/// The error of the last attempt is returned as produced by `action`.
/// Errors classified [`crate::ErrorKind::Fatal`] end the loop immediately.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut action: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let attempts = policy.attempts();
	let mut attempt = 1;

	loop {
		match action().await {
			Ok(value) => {
				if attempt > 1 {
					debug!(target = "pw-chat", %label, attempt, "succeeded after retry");
				}
				return Ok(value);
			}
			Err(err) if !err.is_retryable() => {
				debug!(target = "pw-chat", %label, attempt, error = %err, "fatal error, not retrying");
				return Err(err);
			}
			Err(err) if attempt >= attempts => {
				warn!(target = "pw-chat", %label, attempts, error = %err, "retries exhausted");
				return Err(err);
			}
			Err(err) => {
				let delay = policy.delay_with_jitter(attempt, policy.sample_jitter());
				warn!(
					target = "pw-chat",
					%label,
					attempt,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"attempt failed, backing off"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
		}
	}
}
