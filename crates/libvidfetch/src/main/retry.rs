//! Module for retrying failed downloads with exponential backoff

use std::time::Duration;

use crate::main::download::{
	DownloadFailure,
	FailureKind,
};

/// Lower-cased phrases in errors that indicate a temporary (network) problem
const TRANSIENT_INDICATORS: &[&str] = &[
	"timeout",
	"timed out",
	"network",
	"503",
	"429",
	"rate limit",
	"connection reset",
	"temporary failure",
];

/// Lower-cased phrases in errors that indicate the site is limiting requests
const RATE_LIMIT_INDICATORS: &[&str] = &["429", "rate limit", "too many requests"];

/// Check if `msg` describes a transient error that is worth retrying
pub fn is_transient(msg: &str) -> bool {
	let lower = msg.to_lowercase();

	return TRANSIENT_INDICATORS.iter().any(|v| return lower.contains(v));
}

/// Check if `msg` describes the site limiting requests
pub fn is_rate_limited(msg: &str) -> bool {
	let lower = msg.to_lowercase();

	return RATE_LIMIT_INDICATORS.iter().any(|v| return lower.contains(v));
}

/// How often and how long to wait between retries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	/// Amount of retries after the first attempt
	pub max_retries: u32,
	/// Delay before the first retry, doubled for every following retry
	pub base_delay:  Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		return Self {
			max_retries: 3,
			base_delay:  Duration::from_secs(2),
		};
	}
}

impl RetryPolicy {
	/// Get the delay before retry `retry` (0-based)
	pub fn delay_for(&self, retry: u32) -> Duration {
		return self.base_delay.saturating_mul(2u32.saturating_pow(retry));
	}
}

/// Run `op` until it succeeds, fails with a non-transient error or all retries are used up
///
/// `op` gets the 1-based attempt number, `on_retry` is called before sleeping with (retry number 1-based, delay, failure)
/// Returns the last result and the amount of attempts made
pub fn retry<T, F, R>(policy: &RetryPolicy, mut op: F, mut on_retry: R) -> (Result<T, DownloadFailure>, u32)
where
	F: FnMut(u32) -> Result<T, DownloadFailure>,
	R: FnMut(u32, Duration, &DownloadFailure),
{
	let mut attempt: u32 = 0;

	loop {
		attempt += 1;

		let failure = match op(attempt) {
			Ok(v) => return (Ok(v), attempt),
			Err(err) => err,
		};

		let retries_done = attempt - 1;

		if failure.kind != FailureKind::Transient || retries_done >= policy.max_retries {
			return (Err(failure), attempt);
		}

		let delay = policy.delay_for(retries_done);
		debug!(
			"Retrying after transient error in {}s: {}",
			delay.as_secs_f32(),
			failure.message
		);
		on_retry(retries_done + 1, delay, &failure);

		if !delay.is_zero() {
			std::thread::sleep(delay);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn no_delay() -> RetryPolicy {
		return RetryPolicy {
			base_delay: Duration::ZERO,
			..Default::default()
		};
	}

	#[test]
	fn test_delays() {
		let policy = RetryPolicy::default();

		assert_eq!(3, policy.max_retries);
		assert_eq!(Duration::from_secs(2), policy.delay_for(0));
		assert_eq!(Duration::from_secs(4), policy.delay_for(1));
		assert_eq!(Duration::from_secs(8), policy.delay_for(2));
	}

	#[test]
	fn test_is_transient() {
		assert!(is_transient("Read timed out."));
		assert!(is_transient("HTTP Error 503: Service Unavailable"));
		assert!(is_transient("HTTP Error 429: Too Many Requests"));
		assert!(is_transient("[Errno 104] Connection reset by peer"));
		assert!(is_transient("Temporary failure in name resolution"));
		assert!(is_transient("Network is unreachable"));
		assert!(!is_transient("HTTP Error 404: Not Found"));
		assert!(!is_transient("Video unavailable"));
	}

	#[test]
	fn test_is_rate_limited() {
		assert!(is_rate_limited("HTTP Error 429: Too Many Requests"));
		assert!(is_rate_limited("Rate limit exceeded"));
		assert!(!is_rate_limited("HTTP Error 503"));
	}

	#[test]
	fn test_retry_until_success() {
		let mut retries = Vec::new();

		let (res, attempts) = retry(
			&no_delay(),
			|attempt| {
				if attempt < 3 {
					return Err(DownloadFailure::new(FailureKind::Transient, "timed out"));
				}
				return Ok(attempt);
			},
			|retry, _, _| retries.push(retry),
		);

		assert_eq!(Ok(3), res);
		assert_eq!(3, attempts);
		assert_eq!(vec![1, 2], retries);
	}

	#[test]
	fn test_retry_gives_up() {
		let mut calls = 0;

		let (res, attempts) = retry(
			&no_delay(),
			|_| -> Result<(), DownloadFailure> {
				calls += 1;
				return Err(DownloadFailure::new(FailureKind::Transient, "503"));
			},
			|_, _, _| (),
		);

		// first attempt plus 3 retries
		assert_eq!(4, attempts);
		assert_eq!(4, calls);
		assert_eq!(Err(DownloadFailure::new(FailureKind::Transient, "503")), res);
	}

	#[test]
	fn test_no_retry_on_permanent() {
		for kind in [FailureKind::NeedsCookies, FailureKind::Unsupported, FailureKind::Other] {
			let (res, attempts) = retry(
				&no_delay(),
				|_| -> Result<(), DownloadFailure> {
					return Err(DownloadFailure::new(kind, "nope"));
				},
				|_, _, _| panic!("Expected no retry"),
			);

			assert_eq!(1, attempts);
			assert_eq!(Some(kind), res.err().map(|v| return v.kind));
		}
	}
}
