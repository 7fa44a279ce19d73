//! Module that contains all logic for spawning the "ytdl" command

use std::{
	ffi::OsString,
	sync::LazyLock,
};

use chrono::NaiveDate;
use regex::Regex;

use super::{
	VERSION_TIMEOUT,
	wait_with_timeout,
};

/// Binary name to spawn for the youtube-dl process
pub const YTDL_BIN_NAME: &str = "yt-dlp";

/// The minimal youtube-dl(p) version that is expected to be used.
///
/// Newer versions can be used, but vidfetch is build around this as the minimal in mind.
pub const MINIMAL_YTDL_VERSION: NaiveDate = NaiveDate::from_ymd_opt(2023, 3, 4).unwrap();

/// Create a new [YTDL_BIN_NAME] [duct::Expression] with the given arguments
#[inline]
#[must_use]
pub fn base_ytdl<I, U>(args: I) -> duct::Expression
where
	I: IntoIterator<Item = U>,
	U: Into<OsString>,
{
	return duct::cmd(YTDL_BIN_NAME, args);
}

/// Test if ytdl is installed and reachable and return the version found.
/// Warns if the version is lower than [MINIMAL_YTDL_VERSION].
///
/// This function is not automatically called in the library, it is recommended to run this in any binary trying to run libvidfetch.
pub fn require_ytdl_installed() -> Result<String, crate::Error> {
	return match ytdl_version() {
		Ok(v) => {
			match ytdl_parse_version_naivedate(&v) {
				Ok(date) => warn_minimal_version(date),
				Err(err) => debug!("Could not parse ytdl version as a date: {err}"),
			}

			return Ok(v);
		},
		Err(err) => {
			error!("Could not start or find yt-dlp! Error: {}", err);

			return Err(crate::Error::custom_ioerror_location(
				std::io::ErrorKind::NotFound,
				"yt-dlp Version could not be determined, is it installed and reachable?",
				format!("{} in PATH", YTDL_BIN_NAME),
			));
		},
	};
}

/// Warn if a version lower than the minimal is used
fn warn_minimal_version(ytdl_version: NaiveDate) {
	if ytdl_version < MINIMAL_YTDL_VERSION {
		warn!(
			"Used {} version ({}) is lower than the recommended minimal {}",
			YTDL_BIN_NAME,
			ytdl_version.format("%Y.%m.%d"),
			MINIMAL_YTDL_VERSION.format("%Y.%m.%d"),
		);
	}
}

/// Regex to parse the version from a "youtube-dl --version" output
/// cap1: version (date)
static YTDL_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	return Regex::new(r"(?mi)^(\d{4}\.\d{1,2}\.\d{1,2})").unwrap();
});

/// Get Version of `yt-dlp`
#[inline]
pub fn ytdl_version() -> Result<String, crate::Error> {
	let output = wait_with_timeout(base_ytdl(["--version"]), VERSION_TIMEOUT, YTDL_BIN_NAME)?;

	if !output.success {
		return Err(crate::Error::command_unsuccessful("yt-dlp did not successfully exit!"));
	}

	return ytdl_parse_version(&output.stdout);
}

/// Internal Function to parse the input to a ytdl version with regex
#[inline]
fn ytdl_parse_version(input: &str) -> Result<String, crate::Error> {
	return Ok(YTDL_VERSION_REGEX
		.captures_iter(input)
		.next()
		.ok_or_else(|| return crate::Error::no_captures("YTDL Version could not be determined"))?[1]
		.to_owned());
}

/// Try to parse a given `input`, which is a youtube-dl(p) version, as a [NaiveDate](chrono::NaiveDate).
pub fn ytdl_parse_version_naivedate(input: &str) -> Result<NaiveDate, crate::Error> {
	let version = ytdl_parse_version(input)?;

	let date = NaiveDate::parse_from_str(&version, "%Y.%m.%d").map_err(|err| {
		return crate::Error::other(format!("Could not parse \"{version}\" as a date: {err}"));
	})?;

	return Ok(date);
}

#[cfg(test)]
mod test {
	use chrono::NaiveDate;

	use super::*;

	#[test]
	fn test_ytdl_parse_version_invalid_input() {
		assert_eq!(
			ytdl_parse_version("hello"),
			Err(crate::Error::no_captures("YTDL Version could not be determined"))
		);
	}

	#[test]
	fn test_ytdl_parse_version_valid_static_input() {
		assert_eq!(ytdl_parse_version("2023.03.04\n"), Ok("2023.03.04".to_owned()));
	}

	#[test]
	fn test_parse_naivedate() {
		assert_eq!(
			NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
			ytdl_parse_version_naivedate("2024.01.01").unwrap()
		);
		assert!(ytdl_parse_version_naivedate("2024.13.01").is_err());
	}

	#[test]
	fn test_minimal_version() {
		assert_eq!(NaiveDate::from_ymd_opt(2023, 3, 4).unwrap(), MINIMAL_YTDL_VERSION);
	}

	#[test]
	#[ignore = "CI Install not present currently"]
	fn test_ytdl_spawn() {
		assert!(ytdl_version().is_ok());
	}
}
