//! Module for downloading a single media with yt-dlp

use std::{
	io::{
		BufRead,
		BufReader,
	},
	path::{
		Path,
		PathBuf,
	},
	sync::atomic::{
		AtomicBool,
		Ordering,
	},
	time::{
		Duration,
		Instant,
	},
};

use parse_linetype::{
	CustomParseType,
	LineType,
};

use crate::{
	data::video_info::VideoInfo,
	error::IOErrorToError,
	main::{
		convert::convert_if_needed,
		cookies::{
			CookieSource,
			cookie_args,
			cookie_hint,
			is_douyin_url,
			needs_cookie_error,
		},
		retry::is_transient,
	},
	spawn::{
		DOWNLOAD_TIMEOUT,
		METADATA_TIMEOUT,
		wait_with_timeout,
		ytdl::{
			YTDL_BIN_NAME,
			base_ytdl,
		},
	},
	traits::download_options::DownloadOptions,
};

pub mod assemble_cmd;
pub mod parse_linetype;

/// Message for Douyin urls, which yt-dlp cannot reliably download
pub const DOUYIN_UNSUPPORTED_MSG: &str = "Douyin videos are currently not supported. Use the \"save to device\" function of the Douyin app or a browser extension instead.";
/// Message for cookie errors while cookies were given
pub const COOKIES_EXPIRED_MSG: &str = "Cookies may be expired. Try re-authenticating or use a different browser.";

/// Interval in which the download watchdog checks the deadline
const WATCHDOG_INTERVAL: Duration = Duration::from_millis(200);

/// Classification of a failed download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// Temporary (network) problem, worth retrying
	Transient,
	/// Login cookies are missing or expired
	NeedsCookies,
	/// The site is not supported
	Unsupported,
	/// Anything else
	Other,
}

/// A failed download, as data instead of a [crate::Error] so that batches can continue
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadFailure {
	pub kind:    FailureKind,
	pub message: String,
}

impl DownloadFailure {
	/// Create a new failure
	pub fn new<M: Into<String>>(kind: FailureKind, message: M) -> Self {
		return Self {
			kind,
			message: message.into(),
		};
	}

	/// Classify `message` as either [FailureKind::Transient] or [FailureKind::Other]
	pub fn classify<M: Into<String>>(message: M) -> Self {
		let message = message.into();

		if is_transient(&message) {
			return Self::new(FailureKind::Transient, message);
		}

		return Self::new(FailureKind::Other, message);
	}
}

impl std::fmt::Display for DownloadFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		return f.write_str(&self.message);
	}
}

impl From<crate::Error> for DownloadFailure {
	fn from(value: crate::Error) -> Self {
		return Self::classify(value.to_string());
	}
}

/// Successfully downloaded media
#[derive(Debug, Clone, PartialEq)]
pub struct Downloaded {
	/// Title as reported by yt-dlp
	pub title:         Option<String>,
	/// Final path of the media
	pub output_file:   PathBuf,
	/// Whether the media has been converted to mp4+h264+aac
	pub was_converted: bool,
}

/// Outcome of downloading a single url, including retries
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
	pub url:           String,
	pub title:         Option<String>,
	pub output_file:   Option<PathBuf>,
	pub was_converted: bool,
	/// Amount of attempts made
	pub attempts:      u32,
	pub failure:       Option<DownloadFailure>,
}

impl DownloadResult {
	/// Create the result from the outcome of [download_single]
	pub fn from_outcome<U: Into<String>>(url: U, outcome: Result<Downloaded, DownloadFailure>, attempts: u32) -> Self {
		let url = url.into();

		return match outcome {
			Ok(v) => Self {
				url,
				title: v.title,
				output_file: Some(v.output_file),
				was_converted: v.was_converted,
				attempts,
				failure: None,
			},
			Err(failure) => Self {
				url,
				title: None,
				output_file: None,
				was_converted: false,
				attempts,
				failure: Some(failure),
			},
		};
	}

	/// Get whether the download was successful
	pub fn success(&self) -> bool {
		return self.failure.is_none();
	}

	/// Get whether the download failed because of missing cookies
	pub fn needs_cookies(&self) -> bool {
		return self
			.failure
			.as_ref()
			.is_some_and(|v| return v.kind == FailureKind::NeedsCookies);
	}
}

/// Enum for hooks to know what is currently happening with a single download
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadProgress {
	/// Metadata has been fetched
	/// values: (title)
	MetadataFetched(String),
	/// The actual download has started
	/// values: (id, title)
	SingleStarting(String, String),
	/// The download has progressed
	/// values: (percent)
	SingleProgress(u8),
	/// The media is being converted
	Converting,
	/// The media is done
	/// values: (final path)
	SingleFinished(PathBuf),
}

/// Summary of everything parsed from the output of a download command
#[derive(Debug, Clone, PartialEq, Default)]
struct StdoutSummary {
	/// Title from "PARSE_START"
	title:      Option<String>,
	/// Path from "MOVE"
	final_path: Option<PathBuf>,
	/// Last "ERROR:" line
	last_error: Option<String>,
}

/// Download a single url into `output_dir`
///
/// Assumes ytdl has already been checked to exist (like using [`crate::spawn::ytdl::require_ytdl_installed`])
/// Every problem is returned as a classified [DownloadFailure], retrying is up to the caller
pub fn download_single<A: DownloadOptions + ?Sized, C: FnMut(DownloadProgress)>(
	options: &A,
	url: &str,
	output_dir: &Path,
	mut pgcb: C,
) -> Result<Downloaded, DownloadFailure> {
	let cookie_source = options.cookie_source();
	let cookies = cookie_args(url, cookie_source, options.cookie_store());

	std::fs::create_dir_all(output_dir).attach_path_err(output_dir)?;

	// fetch the metadata first to detect cookie problems early and to estimate the size
	let metadata_args = assemble_cmd::assemble_metadata_command(&cookies, url);
	let metadata = wait_with_timeout(base_ytdl(metadata_args), METADATA_TIMEOUT, "yt-dlp metadata")?;

	if !metadata.success {
		return Err(classify_metadata_failure(url, &metadata.stderr, cookie_source));
	}

	let info = VideoInfo::from_json(&metadata.stdout).map_err(|err| {
		debug!("Parsing metadata failed: {err}");
		return DownloadFailure::new(FailureKind::Other, "Failed to parse video information");
	})?;

	if let Some(title) = &info.title {
		pgcb(DownloadProgress::MetadataFetched(title.clone()));
	}

	let video_format = assemble_cmd::format_string(options, Some(&info));
	let args = assemble_cmd::assemble_download_command(
		options,
		&video_format,
		&cookies,
		output_dir,
		chrono::Local::now().date_naive(),
		url,
	);

	let summary = run_download(options, url, args, &mut pgcb)?;

	let Some(output_file) = summary.final_path.filter(|v| return v.exists()) else {
		return Err(DownloadFailure::new(
			FailureKind::Other,
			"Download completed but file not found",
		));
	};

	let title = summary.title.or(info.title);

	if options.audio_only() || !options.convert() {
		pgcb(DownloadProgress::SingleFinished(output_file.clone()));
		return Ok(Downloaded {
			title,
			output_file,
			was_converted: false,
		});
	}

	pgcb(DownloadProgress::Converting);

	let converted = convert_if_needed(&output_file)
		.map_err(|err| return DownloadFailure::new(FailureKind::Other, format!("Conversion failed: {err}")))?;

	let was_converted = converted.is_some();
	let output_file = converted.unwrap_or(output_file);

	pgcb(DownloadProgress::SingleFinished(output_file.clone()));

	return Ok(Downloaded {
		title,
		output_file,
		was_converted,
	});
}

/// Get the most useful error message of a yt-dlp STDERR output
fn error_message(stderr: &str) -> String {
	let errors: Vec<&str> = stderr
		.lines()
		.map(str::trim)
		.filter(|v| return v.starts_with("ERROR:"))
		.collect();

	if !errors.is_empty() {
		return errors.join("\n");
	}

	let trimmed = stderr.trim();

	if trimmed.is_empty() {
		return format!("{YTDL_BIN_NAME} exited unsuccessfully");
	}

	return trimmed.to_owned();
}

/// Classify a failed metadata fetch
fn classify_metadata_failure(url: &str, stderr: &str, cookie_source: &CookieSource) -> DownloadFailure {
	if is_douyin_url(url) {
		return DownloadFailure::new(FailureKind::Unsupported, DOUYIN_UNSUPPORTED_MSG);
	}

	return classify_ytdl_failure(url, error_message(stderr), cookie_source);
}

/// Classify a yt-dlp error message, taking cookies into account
fn classify_ytdl_failure(url: &str, message: String, cookie_source: &CookieSource) -> DownloadFailure {
	if *cookie_source != CookieSource::Disabled && needs_cookie_error(&message) {
		if cookie_source.is_explicit() {
			return DownloadFailure::new(FailureKind::NeedsCookies, COOKIES_EXPIRED_MSG);
		}

		return DownloadFailure::new(FailureKind::NeedsCookies, cookie_hint(url));
	}

	return DownloadFailure::classify(message);
}

/// Spawn the download command and parse its output until it exits or [DOWNLOAD_TIMEOUT] is reached
fn run_download<A: DownloadOptions + ?Sized, C: FnMut(DownloadProgress)>(
	options: &A,
	url: &str,
	args: Vec<std::ffi::OsString>,
	pgcb: &mut C,
) -> Result<StdoutSummary, DownloadFailure> {
	// merge stderr into stdout
	let ytdl_child = duct::cmd(YTDL_BIN_NAME, args)
		.stdin_null()
		.stderr_to_stdout()
		.unchecked()
		.reader()
		.attach_location_err("duct ytdl reader")?;

	let finished = AtomicBool::new(false);
	let timed_out = AtomicBool::new(false);

	let summary = std::thread::scope(|s| {
		// watchdog to kill the download once the deadline is reached, because reading lines blocks
		s.spawn(|| {
			let deadline = Instant::now() + DOWNLOAD_TIMEOUT;

			while !finished.load(Ordering::Acquire) {
				if Instant::now() >= deadline {
					timed_out.store(true, Ordering::Release);
					if let Err(err) = ytdl_child.kill() {
						debug!("Killing ytdl after timeout failed: {err}");
					}
					break;
				}

				std::thread::sleep(WATCHDOG_INTERVAL);
			}
		});

		let summary = handle_stdout(options.print_command_log(), BufReader::new(&ytdl_child), &mut *pgcb);
		finished.store(true, Ordering::Release);

		return summary;
	});

	if timed_out.load(Ordering::Acquire) {
		return Err(DownloadFailure::new(
			FailureKind::Transient,
			format!("Download timed out after {} minutes", DOWNLOAD_TIMEOUT.as_secs() / 60),
		));
	}

	let success = wait_reader(&ytdl_child)?;

	if !success {
		let message = summary
			.last_error
			.clone()
			.unwrap_or_else(|| return format!("{YTDL_BIN_NAME} exited with a non-0 code"));

		return Err(classify_ytdl_failure(url, message, options.cookie_source()));
	}

	return Ok(summary);
}

/// Wait until the reader's process has exited, returns whether it exited successfully
fn wait_reader(ytdl_child: &duct::ReaderHandle) -> Result<bool, crate::Error> {
	loop {
		// wait loop, because a "ReaderHandle" does not implement "wait", only "try_wait"
		if let Some(output) = ytdl_child.try_wait().attach_location_err("duct ytdl try_wait")? {
			return Ok(output.status.success());
		}

		std::thread::sleep(Duration::from_millis(100)); // sleep to save some time between the next wait (to not cause constant cpu spike)
	}
}

/// Helper function to handle the output from a spawned ytdl command
#[inline]
fn handle_stdout<C: FnMut(DownloadProgress), R: BufRead>(print_stdout: bool, reader: R, mut pgcb: C) -> StdoutSummary {
	let mut summary = StdoutSummary::default();

	for line in reader.lines() {
		let line = match line {
			Ok(v) => v,
			Err(err) => {
				debug!("duct lines reader errored: {}", err);
				break;
			},
		};

		// only print STDOUT to output when requested
		if print_stdout {
			trace!("ytdl [STDOUT]: \"{}\"", line);
		}

		let Some(linetype) = LineType::try_from_line(&line) else {
			if !line.is_empty() {
				debug!("No type has been found for line \"{}\"", line);
			}
			continue;
		};

		match linetype {
			LineType::Ffmpeg | LineType::ProviderSpecific | LineType::Generic => (),
			LineType::Download => {
				if let Some(percent) = linetype.try_get_download_percent(&line) {
					pgcb(DownloadProgress::SingleProgress(percent));
				}
			},
			LineType::Custom => match linetype.try_get_parse_helper(&line) {
				Some(CustomParseType::Start(extractor, id, title)) => {
					debug!("Found PARSE_START: \"{extractor}\" \"{id}\" \"{title}\"");
					pgcb(DownloadProgress::SingleStarting(id, title.clone()));
					summary.title = Some(title);
				},
				Some(CustomParseType::Move(extractor, id, path)) => {
					debug!("Found MOVE: \"{extractor}\" \"{id}\" \"{}\"", path.display());
					summary.final_path = Some(path);
				},
				None => debug!("Custom line could not be parsed: \"{line}\""),
			},
			LineType::Error => {
				// the following is using debug printing, because the line may include escape characters
				warn!("Encountered youtube-dl error: {:#?}", line);
				summary.last_error = Some(line);
			},
			LineType::Warning => {
				// ytdl warnings are non-fatal, but should still be logged
				info!("youtube-dl: {:#?}", line);
			},
		}
	}

	return summary;
}

#[cfg(test)]
pub(crate) mod test_utils {
	use std::path::PathBuf;

	use crate::{
		main::cookies::{
			CookieSource,
			CookieStore,
		},
		traits::download_options::{
			DownloadOptions,
			Quality,
		},
	};

	/// Test Implementation for [`DownloadOptions`]
	#[derive(Debug, Clone)]
	pub struct TestOptions {
		pub audio_only:        bool,
		pub quality:           Option<Quality>,
		pub embed_subs:        bool,
		pub convert:           bool,
		pub max_size_gb:       f64,
		pub download_path:     PathBuf,
		pub cookie_source:     CookieSource,
		pub cookie_store:      Option<CookieStore>,
		pub extra_arguments:   Vec<PathBuf>,
		pub print_command_log: bool,
	}

	impl Default for TestOptions {
		fn default() -> Self {
			return Self {
				audio_only:        false,
				quality:           None,
				embed_subs:        false,
				convert:           false,
				max_size_gb:       2.0,
				download_path:     PathBuf::default(),
				cookie_source:     CookieSource::None,
				cookie_store:      None,
				extra_arguments:   Vec::default(),
				print_command_log: false,
			};
		}
	}

	impl DownloadOptions for TestOptions {
		fn audio_only(&self) -> bool {
			return self.audio_only;
		}

		fn quality(&self) -> Option<Quality> {
			return self.quality;
		}

		fn embed_subs(&self) -> bool {
			return self.embed_subs;
		}

		fn convert(&self) -> bool {
			return self.convert;
		}

		fn max_size_gb(&self) -> f64 {
			return self.max_size_gb;
		}

		fn download_path(&self) -> &std::path::Path {
			return &self.download_path;
		}

		fn cookie_source(&self) -> &CookieSource {
			return &self.cookie_source;
		}

		fn cookie_store(&self) -> Option<&CookieStore> {
			return self.cookie_store.as_ref();
		}

		fn extra_ytdl_arguments(&self) -> Vec<&std::ffi::OsStr> {
			return self.extra_arguments.iter().map(|v| return v.as_os_str()).collect();
		}

		fn print_command_log(&self) -> bool {
			return self.print_command_log;
		}
	}
}
