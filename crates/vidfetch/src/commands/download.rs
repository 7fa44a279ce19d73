use std::{
	collections::HashSet,
	path::Path,
};

use colored::{
	Color,
	Colorize,
};
use indicatif::{
	ProgressBar,
	ProgressDrawTarget,
};
use libvidfetch::{
	chrono::Local,
	main::{
		batch::{
			BatchItem,
			BatchSettings,
			run_batch,
		},
		cookies::{
			cookie_hint,
			site_for_url,
		},
		download::{
			DownloadFailure,
			DownloadProgress,
			DownloadResult,
			FailureKind,
			download_single,
		},
		export::{
			FailedEntry,
			write_failed_log,
		},
		rate_limit::DEFAULT_INITIAL_DELAY,
		report::batch_summary,
		retry::{
			RetryPolicy,
			retry,
		},
	},
	spawn::ytdl::require_ytdl_installed,
	utils::ensure_dir,
};

use crate::{
	clap_conf::{
		CliDerive,
		CommandDownload,
	},
	commands::progress::{
		BatchDisplay,
		DOWNLOAD_STYLE,
		DisplayHooks,
		PG_PERCENT_100,
		STYLE_STATIC_SIZE,
	},
	state::DownloadState,
	utils,
};

/// Handler function for the "download" subcommand
/// This function is mainly to keep the code structured and sorted
#[inline]
pub fn command_download(main_args: &CliDerive, sub_args: &CommandDownload) -> Result<(), crate::Error> {
	let ytdl_version = require_ytdl_installed()?;
	info!("Using yt-dlp version {}", ytdl_version);
	let has_ffmpeg = utils::warn_ffmpeg_missing();

	let download_path = ensure_dir(&sub_args.options.output_path)?;
	let download_state = DownloadState::new(&sub_args.options, download_path.clone(), has_ffmpeg);

	if let [url] = sub_args.urls.as_slice() {
		return download_one(main_args, &download_state, url, &download_path);
	}

	return download_many(main_args, sub_args, &download_state, &download_path);
}

/// Download a single url with retries and a progress bar
fn download_one(
	main_args: &CliDerive,
	download_state: &DownloadState,
	url: &str,
	download_path: &Path,
) -> Result<(), crate::Error> {
	let pgbar = ProgressBar::with_draw_target(Some(PG_PERCENT_100), ProgressDrawTarget::hidden())
		.with_style(DOWNLOAD_STYLE.clone());
	pgbar.set_prefix("[1/1]");
	utils::set_progressbar(&pgbar, main_args);

	let interactive = main_args.is_interactive();

	let pgcb = |progress: DownloadProgress| {
		match progress {
			DownloadProgress::MetadataFetched(title) | DownloadProgress::SingleStarting(_, title) => {
				if interactive {
					pgbar.set_message(utils::truncate_message_term_width(&title, STYLE_STATIC_SIZE));
				}
			},
			DownloadProgress::SingleProgress(percent) => pgbar.set_position(u64::from(percent)),
			DownloadProgress::Converting => {
				pgbar.set_position(PG_PERCENT_100);
				pgbar.set_message("Converting to mp4");
				if !interactive {
					println!("Converting to mp4");
				}
			},
			DownloadProgress::SingleFinished(_) => (),
		}
	};

	if !interactive {
		println!("Downloading {url}");
	}

	let (outcome, attempts) = retry(
		&RetryPolicy::default(),
		|_attempt| {
			pgbar.reset();
			return download_single(download_state, url, download_path, &pgcb);
		},
		|retry, delay, failure: &DownloadFailure| {
			let msg = format!("Retry {retry} in {}s: {}", delay.as_secs(), failure.message);
			if interactive {
				pgbar.println(msg);
			} else {
				println!("{msg}");
			}
		},
	);

	pgbar.finish_and_clear();

	let result = DownloadResult::from_outcome(url, outcome, attempts);

	match &result.failure {
		None => {
			let name = result.title.as_deref().unwrap_or(url);
			let converted = if result.was_converted { " (converted to mp4)" } else { "" };
			println!("{} {name}{converted}", "Downloaded".color(Color::Green));

			if let Some(path) = &result.output_file {
				println!("Saved to \"{}\"", path.display());
			}

			return Ok(());
		},
		Some(failure) => {
			if failure.kind == FailureKind::NeedsCookies {
				println!("{}", cookie_hint(url).color(Color::Yellow));
			}

			return Err(crate::Error::other(format!(
				"Download of \"{url}\" failed after {attempts} attempt(s): {}",
				failure.message
			)));
		},
	}
}

/// Download multiple urls as a batch, write the failure log and print a summary
fn download_many(
	main_args: &CliDerive,
	sub_args: &CommandDownload,
	download_state: &DownloadState,
	download_path: &Path,
) -> Result<(), crate::Error> {
	let items: Vec<BatchItem> = sub_args
		.urls
		.iter()
		.enumerate()
		.map(|(index, url)| {
			return BatchItem {
				index,
				url: url.clone(),
				output_dir: download_path.to_owned(),
			};
		})
		.collect();

	let settings = BatchSettings {
		parallel:      sub_args.options.parallel,
		retry:         RetryPolicy::default(),
		initial_delay: DEFAULT_INITIAL_DELAY,
	};

	println!(
		"Downloading {} URLs into \"{}\" ({} at a time)",
		items.len(),
		download_path.display(),
		settings.parallel
	);

	let hooks = DisplayHooks {
		display:  BatchDisplay::new(main_args, &items),
		recorder: None,
	};

	let outcome = run_batch(items, download_state, &settings, &hooks);
	hooks.display.finish();
	let outcome = outcome?;

	let failed: Vec<&DownloadResult> = outcome
		.results
		.iter()
		.map(|(_, v)| return v)
		.filter(|v| return !v.success())
		.collect();

	if !failed.is_empty() {
		let entries: Vec<FailedEntry> = failed
			.iter()
			.map(|v| {
				return FailedEntry {
					url:   v.url.clone(),
					error: v.failure.as_ref().map(|f| return f.message.clone()).unwrap_or_default(),
				};
			})
			.collect();

		let log_path = write_failed_log(download_path, &entries, Local::now().naive_local())?;
		println!("Failed downloads were written to \"{}\"", log_path.display());
	}

	println!("{}", batch_summary(outcome.success_count(), outcome.failed_count()));

	if outcome.terminated {
		let not_started = sub_args.urls.len() - outcome.results.len();
		println!("Stopped early, {not_started} URL(s) were not started");
	}

	for hint in cookie_hints(&failed) {
		println!("{}", hint.color(Color::Yellow));
	}

	return Ok(());
}

/// Get one cookie hint per site of all results that failed because of missing cookies
fn cookie_hints(failed: &[&DownloadResult]) -> Vec<String> {
	let mut seen = HashSet::new();

	return failed
		.iter()
		.filter(|v| return v.needs_cookies())
		.filter(|v| return seen.insert(site_for_url(&v.url).map(|site| return site.domain)))
		.map(|v| return cookie_hint(&v.url))
		.collect();
}

#[cfg(test)]
mod test {
	use super::*;

	fn failed(url: &str, kind: FailureKind) -> DownloadResult {
		return DownloadResult::from_outcome(url, Err(DownloadFailure::new(kind, "failed")), 1);
	}

	#[test]
	fn test_cookie_hints() {
		let results = [
			failed("https://www.bilibili.com/video/BV1", FailureKind::NeedsCookies),
			failed("https://www.bilibili.com/video/BV2", FailureKind::NeedsCookies),
			failed("https://www.weibo.com/tv/show/1", FailureKind::NeedsCookies),
			failed("https://www.youtube.com/watch?v=a", FailureKind::Other),
		];
		let refs: Vec<&DownloadResult> = results.iter().collect();

		let hints = cookie_hints(&refs);

		assert_eq!(2, hints.len());
		assert!(hints[0].starts_with("B站 requires login cookies."));
		assert!(hints[1].starts_with("微博 requires login cookies."));
	}

	#[test]
	fn test_cookie_hints_none() {
		let results = [failed("https://www.youtube.com/watch?v=a", FailureKind::Transient)];
		let refs: Vec<&DownloadResult> = results.iter().collect();

		assert!(cookie_hints(&refs).is_empty());
	}
}
