//! Bounded retry policy for transport failures.

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;
use txpipe_config::RetryConfig;

/// How often and how patiently a request that failed in transport is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Retries after the first attempt. Zero disables retrying.
	pub max_retries: u32,
	pub initial_backoff: Duration,
	pub max_backoff: Duration,
}

impl RetryPolicy {
	pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
		Self {
			max_retries,
			initial_backoff,
			max_backoff,
		}
	}

	/// A policy that never retries.
	pub fn none() -> Self {
		Self::new(0, Duration::ZERO, Duration::ZERO)
	}

	/// Fresh backoff schedule for one retried operation.
	///
	/// The attempt count bounds retrying, so the schedule itself never gives up.
	pub(crate) fn backoff(&self) -> ExponentialBackoff {
		ExponentialBackoffBuilder::new()
			.with_initial_interval(self.initial_backoff)
			.with_max_interval(self.max_backoff)
			.with_max_elapsed_time(None)
			.build()
	}

	/// Delay before the next retry, falling back to the ceiling if the
	/// schedule is exhausted.
	pub(crate) fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
		use backoff::backoff::Backoff;
		backoff
			.next_backoff()
			.unwrap_or(self.max_backoff)
			.min(self.max_backoff)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from(&RetryConfig::default())
	}
}

impl From<&RetryConfig> for RetryPolicy {
	fn from(config: &RetryConfig) -> Self {
		Self::new(
			config.max_retries,
			Duration::from_millis(config.initial_backoff_ms),
			Duration::from_millis(config.max_backoff_ms),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_matches_config_defaults() {
		let policy = RetryPolicy::default();
		assert_eq!(policy.max_retries, 3);
		assert_eq!(policy.initial_backoff, Duration::from_millis(500));
		assert_eq!(policy.max_backoff, Duration::from_millis(5000));
	}

	#[test]
	fn test_delays_stay_below_ceiling() {
		let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(400));
		let mut backoff = policy.backoff();

		for _ in 0..10 {
			let delay = policy.next_delay(&mut backoff);
			assert!(delay <= Duration::from_millis(400));
		}
	}
}
