//! Module for all spawning of external binaries and helpers to wait on them

use std::{
	ffi::OsString,
	process::Output,
	time::{
		Duration,
		Instant,
	},
};

use crate::error::IOErrorToError;

pub mod ffmpeg;
pub mod ytdl;

/// Timeout for fetching metadata of a single media
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for listing all entries of a channel
pub const CHANNEL_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for downloading a single media
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Timeout for converting a single media
pub const CONVERT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Timeout for version checks
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval in which a running process is checked for having exited
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Internal Struct for easily adding various types that resolve to [`OsString`] and output a [`Vec<OsString>`]
/// exists because [std::process::Command] is too overkill to use for a argument collection for having to use [duct] later
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArgsHelper(Vec<OsString>);
impl ArgsHelper {
	/// Create a new instance of ArgsHelper
	pub fn new() -> Self {
		return Self(Vec::default());
	}

	/// Add a new Argument to the list, added at the end and converted to a [`OsString`]
	/// Returns the input reference to "self" for chaining
	pub fn arg<U>(&mut self, arg: U) -> &mut Self
	where
		U: Into<OsString>,
	{
		self.0.push(arg.into());

		return self;
	}

	/// Add all arguments from the iterator, in order
	pub fn args<I, U>(&mut self, args: I) -> &mut Self
	where
		I: IntoIterator<Item = U>,
		U: Into<OsString>,
	{
		self.0.extend(args.into_iter().map(Into::into));

		return self;
	}

	/// Convert Self to the inner value
	/// Consumes self
	pub fn into_inner(self) -> Vec<OsString> {
		return self.0;
	}
}

impl From<ArgsHelper> for Vec<OsString> {
	fn from(v: ArgsHelper) -> Self {
		return v.into_inner();
	}
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedOutput {
	/// Whether the process exited with code 0
	pub success: bool,
	/// Lossy decoded STDOUT
	pub stdout:  String,
	/// Lossy decoded STDERR
	pub stderr:  String,
}

impl From<Output> for CapturedOutput {
	fn from(value: Output) -> Self {
		return Self {
			success: value.status.success(),
			stdout:  String::from_utf8_lossy(&value.stdout).into_owned(),
			stderr:  String::from_utf8_lossy(&value.stderr).into_owned(),
		};
	}
}

/// Run `expr` with STDOUT and STDERR captured and kill it once `timeout` has passed
///
/// A non-0 exit code is not a [Err], see [`CapturedOutput::success`]
/// `name` is used for error messages and logging
pub fn wait_with_timeout(expr: duct::Expression, timeout: Duration, name: &str) -> Result<CapturedOutput, crate::Error> {
	let handle = expr
		.stdin_null()
		.stdout_capture()
		.stderr_capture()
		.unchecked()
		.start()
		.attach_location_err(format!("{name} spawn"))?;

	let deadline = Instant::now() + timeout;

	loop {
		// "try_wait" only returns "Some" once the process has actually exited
		if let Some(output) = handle.try_wait().attach_location_err(format!("{name} try_wait"))? {
			return Ok(CapturedOutput::from(output.clone()));
		}

		if Instant::now() >= deadline {
			warn!("{name} did not finish within {}s, killing it", timeout.as_secs());
			if let Err(err) = handle.kill() {
				debug!("Killing {name} failed: {err}");
			}

			return Err(crate::Error::timeout(format!(
				"{name} did not finish within {}s (timed out)",
				timeout.as_secs()
			)));
		}

		std::thread::sleep(POLL_INTERVAL);
	}
}

/// Check if the error is a [std::io::ErrorKind::NotFound] from trying to spawn a binary
pub fn is_not_found(err: &crate::Error) -> bool {
	return matches!(err.inner(), crate::error::ErrorInner::IoError(io, _) if io.kind() == std::io::ErrorKind::NotFound);
}
