//! Module for the adaptive delay between requests to the same site

use std::time::Duration;

/// Delay used when none is given
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(3);
/// Lower bound of the delay
pub const MIN_DELAY: Duration = Duration::from_secs(1);
/// Upper bound of the delay
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Amount of consecutive successes after which the delay starts shrinking
const SHRINK_AFTER_SUCCESSES: u32 = 10;
/// Amount of consecutive failures after which a warning is logged
const WARN_AFTER_FAILURES: u32 = 3;

/// Adaptive delay between requests
///
/// Every success after the first 10 consecutive ones shrinks the delay by ×0.8,
/// every failure grows it by ×1.5 (×2 for rate-limit errors)
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiter {
	current:   Duration,
	min:       Duration,
	max:       Duration,
	successes: u32,
	failures:  u32,
}

impl Default for RateLimiter {
	fn default() -> Self {
		return Self::new(DEFAULT_INITIAL_DELAY);
	}
}

impl RateLimiter {
	/// Create a new limiter starting at `initial`, clamped to the bounds
	/// A `initial` of zero disables the limiter (bounds are zero as well)
	pub fn new(initial: Duration) -> Self {
		if initial.is_zero() {
			return Self {
				current:   Duration::ZERO,
				min:       Duration::ZERO,
				max:       Duration::ZERO,
				successes: 0,
				failures:  0,
			};
		}

		return Self {
			current:   initial.clamp(MIN_DELAY, MAX_DELAY),
			min:       MIN_DELAY,
			max:       MAX_DELAY,
			successes: 0,
			failures:  0,
		};
	}

	/// Get the current delay
	pub fn delay(&self) -> Duration {
		return self.current;
	}

	/// Record a successful request
	pub fn record_success(&mut self) {
		self.successes = self.successes.saturating_add(1);
		self.failures = 0;

		if self.successes > SHRINK_AFTER_SUCCESSES && self.current > self.min {
			self.current = self.current.mul_f64(0.8).max(self.min);
		}
	}

	/// Record a failed request
	pub fn record_failure(&mut self, is_rate_limit: bool) {
		self.failures = self.failures.saturating_add(1);
		self.successes = 0;

		let factor = if is_rate_limit { 2.0 } else { 1.5 };
		self.current = self.current.mul_f64(factor).min(self.max);

		if self.failures >= WARN_AFTER_FAILURES {
			warn!(
				"{} consecutive failures, increased request delay to {:.1}s",
				self.failures,
				self.current.as_secs_f64()
			);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_defaults() {
		let limiter = RateLimiter::default();
		assert_eq!(Duration::from_secs(3), limiter.delay());

		assert_eq!(MIN_DELAY, RateLimiter::new(Duration::from_millis(10)).delay());
		assert_eq!(MAX_DELAY, RateLimiter::new(Duration::from_secs(600)).delay());
		assert_eq!(Duration::ZERO, RateLimiter::new(Duration::ZERO).delay());
	}

	#[test]
	fn test_shrink_after_successes() {
		let mut limiter = RateLimiter::new(Duration::from_secs(10));

		for _ in 0..10 {
			limiter.record_success();
		}
		// not yet more than 10
		assert_eq!(Duration::from_secs(10), limiter.delay());

		limiter.record_success();
		assert_eq!(Duration::from_secs(8), limiter.delay());

		for _ in 0..100 {
			limiter.record_success();
		}
		assert_eq!(MIN_DELAY, limiter.delay());
	}

	#[test]
	fn test_grow_on_failure() {
		let mut limiter = RateLimiter::new(Duration::from_secs(2));

		limiter.record_failure(false);
		assert_eq!(Duration::from_secs(3), limiter.delay());

		limiter.record_failure(true);
		assert_eq!(Duration::from_secs(6), limiter.delay());

		for _ in 0..10 {
			limiter.record_failure(true);
		}
		assert_eq!(MAX_DELAY, limiter.delay());
	}

	#[test]
	fn test_failure_resets_successes() {
		let mut limiter = RateLimiter::new(Duration::from_secs(10));

		for _ in 0..10 {
			limiter.record_success();
		}
		limiter.record_failure(false);
		assert_eq!(Duration::from_secs(15), limiter.delay());

		// counting starts again
		limiter.record_success();
		assert_eq!(Duration::from_secs(15), limiter.delay());
	}

	#[test]
	fn test_disabled() {
		let mut limiter = RateLimiter::new(Duration::ZERO);

		limiter.record_failure(true);
		assert_eq!(Duration::ZERO, limiter.delay());
	}
}
