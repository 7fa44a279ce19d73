//! Utils for the `vidfetch` binary

use crate::clap_conf::CliDerive;
use indicatif::{
	MultiProgress,
	ProgressBar,
	ProgressDrawTarget,
};
use libvidfetch::{
	error::IOErrorToError,
	spawn::ffmpeg::ffmpeg_version,
};
use std::{
	borrow::Cow,
	io::Write,
	sync::RwLock,
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Helper function to set the progressbar to a draw target if mode is interactive
pub fn set_progressbar(bar: &ProgressBar, main_args: &CliDerive) {
	if main_args.is_interactive() {
		bar.set_draw_target(ProgressDrawTarget::stderr());
	}
}

/// Helper function to create a [MultiProgress] that only draws if mode is interactive
pub fn new_multi_progress(main_args: &CliDerive) -> MultiProgress {
	if main_args.is_interactive() {
		return MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
	}

	return MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
}

/// Warn if ffmpeg is not installed, downloads still work, but nothing can be merged or converted
/// Returns whether ffmpeg is available
pub fn warn_ffmpeg_missing() -> bool {
	if let Err(err) = ffmpeg_version() {
		warn!("Could not start or find ffmpeg! Error: {}", err);
		eprintln!("ffmpeg was not found, conversion will be skipped (see \"vidfetch deps\")");

		return false;
	}

	return true;
}

/// Check if a process with `pid` is still running
pub fn is_pid_alive(pid: u32) -> bool {
	let pid = sysinfo::Pid::from_u32(pid);
	let mut s = sysinfo::System::new();
	s.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);

	return s.process(pid).is_some();
}

/// Termination state shared with the ctrl-c handler
#[derive(Debug, Default)]
pub struct Terminate {
	/// Amount of times termination has been requested
	requests: usize,
}

impl Terminate {
	/// Create a new instance without any requests
	pub const fn new() -> Self {
		return Self { requests: 0 };
	}

	/// Add a termination request
	/// Returns the amount of requests so far
	pub fn request(&mut self) -> usize {
		self.requests = self.requests.saturating_add(1);

		return self.requests;
	}

	/// Get if termination has been requested at least once
	pub fn termination_requested(&self) -> bool {
		return self.requests > 0;
	}
}

/// Global termination state
pub static TERMINATE: RwLock<Terminate> = RwLock::new(Terminate::new());

/// Exit code used when a second termination request forces the exit
const FORCED_EXIT_CODE: i32 = 130;

/// Install the ctrl-c handler
/// The first request lets running downloads finish, the second one exits immediately
pub fn setup_termination_handler() -> Result<(), crate::Error> {
	return ctrlc::set_handler(|| {
		let requests = match TERMINATE.write() {
			Ok(mut v) => v.request(),
			Err(_) => usize::MAX,
		};

		if requests > 1 {
			eprintln!("Forcing exit");
			std::process::exit(FORCED_EXIT_CODE);
		}

		eprintln!("Termination requested, waiting for running downloads to finish (press again to force)");
	})
	.map_err(|err| return crate::Error::other(format!("Failed to set termination handler: {err}")));
}

/// Helper to quickly check for termination
pub fn termination_requested() -> bool {
	// a poisoned lock means the handler panicked, treat that as a request
	return TERMINATE.read().map_or(true, |v| return v.termination_requested());
}

/// Get input from STDIN with "possible" or "default"
/// if using "default", remember to set a character in "possible" to upper-case
pub fn get_input(msg: &str, possible: &[&'static str], default: &'static str) -> Result<String, crate::Error> {
	let possible_converted = possible.iter().map(|v| return v.to_lowercase()).collect::<Vec<String>>();
	// dont use "possible_converted" for the shown string, because otherwise the default will not be shown anymore
	let possible_converted_string = possible.join("/");

	loop {
		let input = read_line(&format!("{msg} [{possible_converted_string}]: "))?.to_lowercase();

		// return default if empty and default is set
		if input.is_empty() {
			if default.is_empty() {
				// special case when empty, to more emphasize that its empty
				println!("... Invalid Input: (Empty)");
				continue;
			}

			return Ok(default.to_owned());
		}

		if possible_converted.contains(&input) {
			return Ok(input);
		}

		println!("... Invalid Input: \"{input}\"");
	}
}

/// Ask for a value with `msg` until `parse` accepts it
/// Empty input returns [`None`]
pub fn get_parsed_input<T, F>(msg: &str, parse: F) -> Result<Option<T>, crate::Error>
where
	F: Fn(&str) -> Result<T, String>,
{
	loop {
		let input = read_line(&format!("{msg}: "))?;

		if input.is_empty() {
			return Ok(None);
		}

		match parse(&input) {
			Ok(v) => return Ok(Some(v)),
			Err(err) => println!("... Invalid Input: {err}"),
		}
	}
}

/// Print `prompt` and read a single trimmed line from STDIN
fn read_line(prompt: &str) -> Result<String, crate::Error> {
	print!("{prompt}");
	// ensure the message is printed before reading
	std::io::stdout().flush().attach_location_err("stdout flush")?;

	let mut input = String::new();
	let read = std::io::stdin().read_line(&mut input).attach_location_err("stdin read_line")?;

	if read == 0 {
		return Err(crate::Error::other("STDIN was closed while waiting for input"));
	}

	return Ok(input.trim().to_owned());
}

/// Get the display width of `grapheme`
fn grapheme_width(grapheme: &str) -> usize {
	let width = grapheme.width();

	#[cfg(feature = "workaround_fe0f")]
	if grapheme.contains('\u{fe0f}') {
		return width.max(2);
	}

	return width;
}

/// Truncate `msg` to fit into `display_pos` display positions
/// if `add_dots` is set, "..." is added when truncated (and counted in `display_pos`)
pub fn truncate_message_display_pos<M>(msg: &M, display_pos: usize, add_dots: bool) -> Cow<'_, str>
where
	M: AsRef<str> + ?Sized,
{
	/// The dots to add when truncated
	const DOTS: &str = "...";

	let msg = msg.as_ref();
	let total: usize = msg.graphemes(true).map(grapheme_width).sum();

	if total <= display_pos {
		return Cow::Borrowed(msg);
	}

	let available = if add_dots {
		display_pos.saturating_sub(DOTS.len())
	} else {
		display_pos
	};

	let mut used = 0;
	let mut out = String::with_capacity(msg.len());

	for grapheme in msg.graphemes(true) {
		let width = grapheme_width(grapheme);

		if used + width > available {
			break;
		}

		used += width;
		out.push_str(grapheme);
	}

	if add_dots && display_pos >= DOTS.len() {
		out.push_str(DOTS);
	}

	return Cow::Owned(out);
}

/// Truncate `msg` to the current terminal width minus `reserved` display positions
/// truncation is required because indicatif would do new-lines otherwise
pub fn truncate_message_term_width<M>(msg: &M, reserved: usize) -> String
where
	M: AsRef<str> + ?Sized,
{
	let display_width_available = terminal_size::terminal_size().map(|(w, _h)| {
		return (w.0 as usize).saturating_sub(reserved);
	});

	let Some(display_width_available) = display_width_available else {
		return msg.as_ref().into();
	};

	return truncate_message_display_pos(msg, display_width_available, true).to_string();
}
