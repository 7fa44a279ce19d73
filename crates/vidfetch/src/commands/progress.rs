//! Module for displaying the progress of batches and forwarding their transitions

use std::{
	collections::HashMap,
	sync::LazyLock,
};

use colored::{
	Color,
	Colorize,
};
use indicatif::{
	MultiProgress,
	ProgressBar,
	ProgressStyle,
};
use libvidfetch::{
	data::job_state::JobStatus,
	main::{
		batch::{
			BatchHooks,
			BatchItem,
			BatchProgress,
			StateRecorder,
		},
		download::DownloadResult,
	},
};
use parking_lot::Mutex;

use crate::{
	clap_conf::CliDerive,
	utils,
};

/// Static for easily referencing the 100% length for a progressbar
pub const PG_PERCENT_100: u64 = 100;
/// Static size the Download Progress Style will take (plus some spacers)
/// currently accounts for `[000/000] [00:00:00] ### `
pub const STYLE_STATIC_SIZE: usize = 30;

/// ProgressBar Style for a single download, will look like `[1/10] [00:00:00] [#>-] CustomMsg`
pub static DOWNLOAD_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
	return ProgressStyle::default_bar()
		.template("{prefix:.dim} [{elapsed_precise}] {wide_bar:.cyan/blue} {msg}")
		.expect("Expected ProgressStyle template to be valid")
		.progress_chars("#>-");
});

/// ProgressBar Style for the overall batch, will look like `Total [00:00:00] [#>-] 1/10`
static OVERALL_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
	return ProgressStyle::default_bar()
		.template("{prefix:.bold} [{elapsed_precise}] {wide_bar:.green/white} {pos}/{len}")
		.expect("Expected ProgressStyle template to be valid")
		.progress_chars("#>-");
});

/// Displays the progress of a batch, either as progress bars (interactive) or as plain lines
pub struct BatchDisplay<'a> {
	main_args: &'a CliDerive,
	multi:     MultiProgress,
	overall:   ProgressBar,
	/// Progress bars of running items, by item index
	bars:      Mutex<HashMap<usize, ProgressBar>>,
	/// Display label of each item ("[1/10]"), by item index
	labels:    HashMap<usize, String>,
}

impl<'a> BatchDisplay<'a> {
	/// Create a new display for `items`
	pub fn new(main_args: &'a CliDerive, items: &[BatchItem]) -> Self {
		let total = items.len();
		let labels = items
			.iter()
			.enumerate()
			.map(|(pos, item)| return (item.index, format!("[{}/{}]", pos + 1, total)))
			.collect();

		let multi = utils::new_multi_progress(main_args);
		let overall = multi.add(ProgressBar::new(total as u64).with_style(OVERALL_STYLE.clone()));
		overall.set_prefix("Total");

		return Self {
			main_args,
			multi,
			overall,
			bars: Mutex::new(HashMap::new()),
			labels,
		};
	}

	/// Get the label of item `index`
	fn label(&self, index: usize) -> &str {
		return self.labels.get(&index).map_or("[?]", String::as_str);
	}

	/// Print a line without breaking the progress bars
	fn line(&self, msg: String) {
		if self.main_args.is_interactive() {
			if let Err(err) = self.multi.println(&msg) {
				debug!("Failed to print above progress bars: {err}");
			}
		} else {
			println!("{msg}");
		}
	}

	/// Run `f` with the progress bar of item `index`, if it exists
	fn with_bar<F: FnOnce(&ProgressBar)>(&self, index: usize, f: F) {
		if let Some(bar) = self.bars.lock().get(&index) {
			f(bar);
		}
	}

	/// Handle a single progress event
	pub fn handle(&self, progress: BatchProgress) {
		match progress {
			BatchProgress::JobStarting(index, url) => {
				if self.main_args.is_interactive() {
					let bar = self.multi.insert_before(
						&self.overall,
						ProgressBar::new(PG_PERCENT_100).with_style(DOWNLOAD_STYLE.clone()),
					);
					bar.set_prefix(self.label(index).to_owned());
					bar.set_message(utils::truncate_message_term_width(&url, STYLE_STATIC_SIZE));

					self.bars.lock().insert(index, bar);
				} else {
					self.line(format!("{} Starting {url}", self.label(index)));
				}
			},
			BatchProgress::JobTitle(index, title) => {
				self.with_bar(index, |bar| {
					bar.set_message(utils::truncate_message_term_width(&title, STYLE_STATIC_SIZE));
				});
			},
			BatchProgress::JobProgress(index, percent) => {
				self.with_bar(index, |bar| {
					bar.set_position(u64::from(percent));
				});
			},
			BatchProgress::JobConverting(index) => {
				self.with_bar(index, |bar| {
					bar.set_position(PG_PERCENT_100);
					bar.set_message("Converting to mp4");
				});
				if !self.main_args.is_interactive() {
					self.line(format!("{} Converting to mp4", self.label(index)));
				}
			},
			BatchProgress::JobRetrying(index, retry, delay, msg) => {
				self.line(format!(
					"{} Retry {retry} in {}s: {msg}",
					self.label(index),
					delay.as_secs()
				));
			},
			BatchProgress::JobFinished(index, result) => {
				// lock is released before the bar is removed
				let bar = self.bars.lock().remove(&index);
				if let Some(bar) = bar {
					bar.finish_and_clear();
					self.multi.remove(&bar);
				}
				self.overall.inc(1);
				self.line(self.finished_line(index, &result));
			},
		}
	}

	/// Format the line for a finished item
	fn finished_line(&self, index: usize, result: &DownloadResult) -> String {
		let label = self.label(index);
		let name = result.title.as_deref().unwrap_or(&result.url);

		if let Some(failure) = &result.failure {
			return format!("{label} {} {name}: {}", "Failed".color(Color::Red), failure.message);
		}

		let path = result
			.output_file
			.as_ref()
			.map_or_else(String::new, |v| return format!(" -> {}", v.display()));

		return format!("{label} {} {name}{path}", "Done".color(Color::Green));
	}

	/// Finish all progress bars
	pub fn finish(&self) {
		for (_, bar) in self.bars.lock().drain() {
			bar.finish_and_clear();
		}
		self.overall.finish_and_clear();
	}
}

/// [BatchHooks] that display the progress and optionally persist every transition
pub struct DisplayHooks<'a> {
	pub display:  BatchDisplay<'a>,
	/// Records transitions into the state file, if set
	pub recorder: Option<StateRecorder>,
}

impl BatchHooks for DisplayHooks<'_> {
	fn on_transition(&self, index: usize, status: JobStatus, result: Option<&DownloadResult>) -> Result<(), crate::Error> {
		let Some(recorder) = &self.recorder else {
			return Ok(());
		};

		return recorder.record(index, status, result);
	}

	fn on_progress(&self, progress: BatchProgress) {
		self.display.handle(progress);
	}

	fn should_terminate(&self) -> bool {
		return utils::termination_requested();
	}
}

#[cfg(test)]
mod test {
	use std::path::PathBuf;

	use super::*;
	use crate::clap_conf::{
		CommandDeps,
		SubCommands,
	};
	use libvidfetch::main::download::{
		DownloadFailure,
		Downloaded,
		FailureKind,
	};

	fn cli() -> CliDerive {
		return CliDerive {
			verbosity:    0,
			explicit_tty: Some(false),
			force_color:  false,
			subcommands:  SubCommands::Deps(CommandDeps { install: false }),
		};
	}

	fn items() -> Vec<BatchItem> {
		return [3, 7]
			.into_iter()
			.map(|index| {
				return BatchItem {
					index,
					url: format!("https://youtu.be/{index}"),
					output_dir: PathBuf::from("/out"),
				};
			})
			.collect();
	}

	#[test]
	fn test_labels() {
		let main_args = cli();
		let display = BatchDisplay::new(&main_args, &items());

		assert_eq!("[1/2]", display.label(3));
		assert_eq!("[2/2]", display.label(7));
		assert_eq!("[?]", display.label(0));
	}

	#[test]
	fn test_finished_line() {
		colored::control::set_override(false);
		let main_args = cli();
		let display = BatchDisplay::new(&main_args, &items());

		let done = DownloadResult::from_outcome(
			"https://youtu.be/3",
			Ok(Downloaded {
				title:         Some("Hello".to_owned()),
				output_file:   PathBuf::from("/out/Hello.mp4"),
				was_converted: false,
			}),
			1,
		);
		assert_eq!("[1/2] Done Hello -> /out/Hello.mp4", display.finished_line(3, &done));

		let failed = DownloadResult::from_outcome(
			"https://youtu.be/7",
			Err(DownloadFailure::new(FailureKind::Other, "Video unavailable")),
			1,
		);
		assert_eq!(
			"[2/2] Failed https://youtu.be/7: Video unavailable",
			display.finished_line(7, &failed)
		);
	}

	#[test]
	fn test_hooks_without_recorder() {
		let main_args = cli();
		let hooks = DisplayHooks {
			display:  BatchDisplay::new(&main_args, &items()),
			recorder: None,
		};

		assert!(hooks.on_transition(3, JobStatus::Running, None).is_ok());
		hooks.on_progress(BatchProgress::JobProgress(3, 50));
		hooks.display.finish();
	}

	#[test]
	fn test_bar_updates_and_removal() {
		colored::control::set_override(false);
		let main_args = cli();
		let display = BatchDisplay::new(&main_args, &items());

		let bar = ProgressBar::hidden();
		display.bars.lock().insert(3, bar.clone());

		display.handle(BatchProgress::JobProgress(3, 40));
		assert_eq!(40, bar.position());
		// unknown items are ignored
		display.handle(BatchProgress::JobProgress(7, 90));
		assert_eq!(40, bar.position());

		display.handle(BatchProgress::JobConverting(3));
		assert_eq!(PG_PERCENT_100, bar.position());

		display.handle(BatchProgress::JobFinished(
			3,
			DownloadResult::from_outcome(
				"https://youtu.be/3",
				Err(DownloadFailure::new(FailureKind::Other, "Video unavailable")),
				1,
			),
		));
		assert!(display.bars.lock().is_empty());
		assert!(bar.is_finished());
		assert_eq!(1, display.overall.position());

		display.bars.lock().insert(7, ProgressBar::hidden());
		display.finish();
		assert!(display.bars.lock().is_empty());
	}
}
