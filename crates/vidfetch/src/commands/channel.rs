use std::path::Path;

use colored::{
	Color,
	Colorize,
};
use libvidfetch::{
	chrono::Local,
	data::{
		channel::{
			ChannelInfo,
			Platform,
			VideoMetadata,
		},
		job_state::{
			ChannelJob,
			Job,
			JobStatus,
			StateFile,
			StateLock,
		},
	},
	main::{
		batch::{
			BatchItem,
			BatchSettings,
			StateRecorder,
			run_batch,
		},
		channel::{
			ChannelFilter,
			channel_cookie_args,
			channel_output_dir,
			detect_platform,
			extract_channel,
			parse_filter_date,
		},
		cookies::{
			available_browsers,
			cookie_hint,
		},
		export::export_csv,
		report::channel_report,
		retry::RetryPolicy,
	},
	spawn::ytdl::require_ytdl_installed,
	utils::{
		ensure_dir,
		thousands,
	},
};

use crate::{
	clap_conf::{
		CliDerive,
		CommandChannel,
	},
	commands::progress::{
		BatchDisplay,
		DisplayHooks,
	},
	state::DownloadState,
	utils,
};

/// Amount of latest videos selected when nothing else was chosen
const DEFAULT_LATEST_COUNT: usize = 10;

/// Handler function for the "channel" subcommand
/// This function is mainly to keep the code structured and sorted
pub fn command_channel(main_args: &CliDerive, sub_args: &CommandChannel) -> Result<(), crate::Error> {
	let ytdl_version = require_ytdl_installed()?;
	info!("Using yt-dlp version {}", ytdl_version);
	let has_ffmpeg = utils::warn_ffmpeg_missing();

	let Some(platform) = detect_platform(&sub_args.url) else {
		return Err(crate::Error::other(format!(
			"Unsupported channel url \"{}\", supported are youtube, bilibili, xiaohongshu, tiktok and vimeo",
			sub_args.url
		)));
	};

	let base_dir = ensure_dir(&sub_args.options.output_path)?;
	// the lock is released when dropped at the end of this function
	let _lock = StateLock::acquire(&base_dir, utils::is_pid_alive)?;
	let mut state = StateFile::load(&base_dir)?;

	let download_state = DownloadState::new(&sub_args.options, base_dir.clone(), has_ffmpeg);
	let cookie_source = sub_args.options.cookie_source();

	let existing = state.find_channel(&sub_args.url);

	let channel_idx = match existing {
		Some(idx) if sub_args.resume => {
			let channel = &mut state.channels[idx];
			let pending = channel.reset_for_resume(cookie_source.is_explicit());
			let counts = channel.counts();

			println!(
				"Resuming \"{}\": {} to download, {} already done",
				channel.channel.channel_name,
				pending.len(),
				counts.done
			);
			if counts.needs_cookies > 0 {
				println!(
					"{}",
					format!(
						"{} video(s) still need cookies, provide them with --cookies-from-browser or --cookies",
						counts.needs_cookies
					)
					.color(Color::Yellow)
				);
			}

			state.save(&base_dir)?;
			idx
		},
		_ => {
			if sub_args.resume {
				println!("No previous download of this channel found, starting a new one");
			}

			let Some(channel) = new_channel_job(main_args, sub_args, platform, &base_dir)? else {
				return Ok(());
			};

			let idx = state.upsert_channel(channel);
			state.save(&base_dir)?;
			idx
		},
	};

	let channel = &state.channels[channel_idx];
	let items: Vec<BatchItem> = channel
		.pending_indexes()
		.into_iter()
		.map(|index| {
			return BatchItem {
				index,
				url: channel.jobs[index].url.clone(),
				output_dir: channel.output_dir.clone(),
			};
		})
		.collect();

	if items.is_empty() {
		println!("Nothing to download");
	} else {
		println!(
			"Downloading {} video(s) into \"{}\"",
			items.len(),
			channel.output_dir.display()
		);
	}

	let settings = BatchSettings {
		parallel:      sub_args.options.parallel,
		retry:         RetryPolicy::default(),
		initial_delay: sub_args.initial_delay(),
	};

	let hooks = DisplayHooks {
		display:  BatchDisplay::new(main_args, &items),
		recorder: Some(StateRecorder::new(state, &base_dir, channel_idx)),
	};

	let outcome = run_batch(items, &download_state, &settings, &hooks);
	hooks.display.finish();

	let Some(recorder) = hooks.recorder else {
		return Err(crate::Error::other("Expected the state recorder to be set"));
	};
	let mut state = recorder.into_state();
	let outcome = outcome?;

	let channel = &state.channels[channel_idx];

	let csv_path = export_csv(channel, &channel.output_dir, Local::now().date_naive())?;
	println!("{}", channel_report(channel));
	println!("Video list exported to \"{}\"", csv_path.display());

	if channel.counts().needs_cookies > 0 {
		println!("{}", cookie_hint(&sub_args.url).color(Color::Yellow));
	}

	if outcome.terminated {
		println!("Stopped early, continue with \"vidfetch channel --resume {}\"", sub_args.url);
	} else if channel.jobs.iter().any(|v| return v.status != JobStatus::Done) {
		println!("Some videos were not downloaded, retry them with \"vidfetch channel --resume {}\"", sub_args.url);
	}

	state.remove_finished();
	state.save(&base_dir)?;

	return Ok(());
}

/// List the channel, select the videos and create the job for it
/// Returns [`None`] if nothing was selected
fn new_channel_job(
	main_args: &CliDerive,
	sub_args: &CommandChannel,
	platform: Platform,
	base_dir: &Path,
) -> Result<Option<ChannelJob>, crate::Error> {
	let cookie_store = sub_args.options.cookie_store();
	let (cookie_args, hint) = channel_cookie_args(
		platform,
		&sub_args.url,
		&sub_args.options.cookie_source(),
		cookie_store.as_ref(),
		&available_browsers(),
	);

	if let Some(hint) = hint {
		println!("{}", hint.color(Color::Yellow));
	}

	println!("Fetching channel information, this may take a while");
	let (info, entries) = extract_channel(&sub_args.url, &cookie_args)?;

	print_channel_info(&info);

	if entries.is_empty() {
		println!("The channel does not have any videos");
		return Ok(None);
	}

	let filter = match sub_args.selection() {
		Some(v) => v,
		None if main_args.is_interactive() => ask_filter(entries.len())?,
		None => {
			println!("No selection given, downloading the latest {DEFAULT_LATEST_COUNT} videos");
			ChannelFilter::latest(DEFAULT_LATEST_COUNT)
		},
	};

	let selected = filter.apply(entries);

	if selected.is_empty() {
		println!("No videos match the selection");
		return Ok(None);
	}

	println!("Selected {} video(s)", selected.len());

	let output_dir = channel_output_dir(base_dir, platform, &info.channel_name, Local::now().date_naive());

	return Ok(Some(ChannelJob::new(sub_args.url.clone(), info, output_dir, jobs_for(selected))));
}

/// Create the jobs for the selected entries
fn jobs_for(selected: Vec<VideoMetadata>) -> Vec<Job> {
	return selected.into_iter().map(Job::from_metadata).collect();
}

/// Print the basic information about a channel
fn print_channel_info(info: &ChannelInfo) {
	println!("Channel: {} ({})", info.channel_name.bold(), info.platform);
	if let Some(followers) = info.follower_count {
		println!("Followers: {}", thousands(followers));
	}
	println!("Videos: {}", info.video_count);
}

/// Ask the user which videos of the `total` to download
fn ask_filter(total: usize) -> Result<ChannelFilter, crate::Error> {
	let input = utils::get_input(
		&format!("Download the [L]atest videos, [a]ll {total} videos or use a [c]ustom filter?"),
		&["L", "a", "c"],
		"l",
	)?;

	return match input.as_str() {
		"l" => {
			let count = utils::get_parsed_input(
				&format!("How many of the latest videos? (default {DEFAULT_LATEST_COUNT})"),
				parse_count,
			)?;

			Ok(ChannelFilter::latest(count.unwrap_or(DEFAULT_LATEST_COUNT)))
		},
		"a" => Ok(ChannelFilter::default()),
		"c" => {
			println!("Leave a filter empty to not use it");

			Ok(ChannelFilter {
				date_after:  utils::get_parsed_input("Uploaded on or after (YYYY-MM-DD)", parse_date)?,
				date_before: utils::get_parsed_input("Uploaded on or before (YYYY-MM-DD)", parse_date)?,
				min_views:   utils::get_parsed_input("Minimal views", parse_views)?,
				count:       utils::get_parsed_input("Maximal amount of videos (latest first)", parse_count)?,
			})
		},
		_ => unreachable!("get_input should only return a OK value from the possible array"),
	};
}

/// Parse a positive count
fn parse_count(input: &str) -> Result<usize, String> {
	return match input.parse::<usize>() {
		Ok(0) => Err("has to be at least 1".to_owned()),
		Ok(v) => Ok(v),
		Err(err) => Err(err.to_string()),
	};
}

/// Parse a view count, allowing "," and "_" as separators
fn parse_views(input: &str) -> Result<u64, String> {
	let cleaned: String = input.chars().filter(|c| return !matches!(c, ',' | '_')).collect();

	return cleaned.parse::<u64>().map_err(|err| return err.to_string());
}

/// Parse a filter date
fn parse_date(input: &str) -> Result<libvidfetch::chrono::NaiveDate, String> {
	return parse_filter_date(input).map_err(|err| return err.to_string());
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_parse_count() {
		assert_eq!(Ok(5), parse_count("5"));
		assert!(parse_count("0").is_err());
		assert!(parse_count("-1").is_err());
		assert!(parse_count("five").is_err());
	}

	#[test]
	fn test_parse_views() {
		assert_eq!(Ok(10_000), parse_views("10,000"));
		assert_eq!(Ok(1_000_000), parse_views("1_000_000"));
		assert!(parse_views("many").is_err());
	}

	#[test]
	fn test_parse_date() {
		assert_eq!(libvidfetch::chrono::NaiveDate::from_ymd_opt(2024, 3, 1), parse_date("2024-03-01").ok());
		assert!(parse_date("01.03.2024").is_err());
	}

	#[test]
	fn test_jobs_for() {
		let jobs = jobs_for(vec![
			VideoMetadata {
				id: "a".to_owned(),
				title: "A".to_owned(),
				url: "https://youtu.be/a".to_owned(),
				..Default::default()
			},
			VideoMetadata {
				id: "b".to_owned(),
				title: "B".to_owned(),
				url: "https://youtu.be/b".to_owned(),
				..Default::default()
			},
		]);

		assert_eq!(2, jobs.len());
		assert_eq!("https://youtu.be/a", jobs[0].url);
		assert!(jobs.iter().all(|v| return v.status == JobStatus::Pending));
	}

	#[test]
	fn test_state_lock_held_by_self() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-channel")
			.tempdir()
			.expect("Expected a temp dir to be created");

		let lock = StateLock::acquire(tmp.path(), utils::is_pid_alive).expect("Expected lock to be acquired");
		assert!(lock.path().exists());
		drop(lock);
		assert!(!tmp.path().join(libvidfetch::data::job_state::LOCK_FILE_NAME).exists());
	}
}
