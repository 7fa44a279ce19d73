//! Module for the human readable reports shown after downloads

use std::fmt::Write;

use crate::{
	data::job_state::{
		ChannelJob,
		JobStatus,
	},
	main::export::file_size,
	utils::thousands,
};

/// Width of the separator lines of [channel_report]
const CHANNEL_SEPARATOR_WIDTH: usize = 60;
/// Width of the separator lines of [batch_summary]
const BATCH_SEPARATOR_WIDTH: usize = 50;

/// Create the report for a finished (or stopped) channel download
pub fn channel_report(channel: &ChannelJob) -> String {
	let separator = "=".repeat(CHANNEL_SEPARATOR_WIDTH);
	let counts = channel.counts();
	let total = channel.jobs.len();

	let metas: Vec<_> = channel.jobs.iter().filter_map(|v| return v.metadata.as_ref()).collect();
	let total_views: u64 = metas.iter().map(|v| return v.view_count.unwrap_or(0)).sum();
	let total_likes: u64 = metas.iter().map(|v| return v.like_count.unwrap_or(0)).sum();
	let total_comments: u64 = metas.iter().map(|v| return v.comment_count.unwrap_or(0)).sum();
	let total_duration: f64 = metas.iter().map(|v| return v.duration.unwrap_or(0.0)).sum();

	let total_size: u64 = channel
		.jobs
		.iter()
		.filter(|v| return v.status == JobStatus::Done)
		.filter_map(|v| return file_size(v.output_file.as_deref()))
		.sum();

	let followers = channel
		.channel
		.follower_count
		.map_or_else(|| return "N/A".to_owned(), thousands);

	// writing into a String cannot fail
	let mut out = String::new();
	let _ = writeln!(out, "{separator}");
	let _ = writeln!(out, "Channel download report");
	let _ = writeln!(out, "{separator}");

	let _ = writeln!(out, "\nChannel:");
	let _ = writeln!(out, "  Platform: {}", channel.channel.platform);
	let _ = writeln!(out, "  Name: {}", channel.channel.channel_name);
	let _ = writeln!(out, "  Followers: {followers}");

	let _ = writeln!(out, "\nDownload statistics:");
	let _ = writeln!(out, "  Total videos: {total}");
	let _ = writeln!(out, "  Downloaded: {}", counts.done);
	let _ = writeln!(out, "  Failed: {}", counts.failed + counts.needs_cookies);
	if counts.needs_cookies > 0 {
		let _ = writeln!(out, "    (of which need cookies: {})", counts.needs_cookies);
	}
	if counts.pending + counts.running > 0 {
		let _ = writeln!(out, "  Not yet downloaded: {}", counts.pending + counts.running);
	}
	let _ = writeln!(out, "  Total file size: {:.2} MB", total_size as f64 / 1024.0 / 1024.0);

	let _ = writeln!(out, "\nTotals:");
	let _ = writeln!(out, "  Views: {}", thousands(total_views));
	let _ = writeln!(out, "  Likes: {}", thousands(total_likes));
	let _ = writeln!(out, "  Comments: {}", thousands(total_comments));

	if total > 0 {
		let amount = total as f64;
		let avg_duration = total_duration / amount;
		let avg_views = (total_views as f64 / amount).round() as u64;
		let avg_likes = (total_likes as f64 / amount).round() as u64;

		let _ = writeln!(out, "\n  Averages:");
		let _ = writeln!(out, "    - Duration: {:.0} s ({:.1} min)", avg_duration, avg_duration / 60.0);
		let _ = writeln!(out, "    - Views: {}", thousands(avg_views));
		let _ = writeln!(out, "    - Likes: {}", thousands(avg_likes));
	}

	let failures: Vec<_> = channel
		.jobs
		.iter()
		.enumerate()
		.filter(|(_, v)| return matches!(v.status, JobStatus::Failed | JobStatus::NeedsCookies))
		.collect();

	if !failures.is_empty() {
		let _ = writeln!(out, "\nFailures:");
		for (i, job) in failures {
			let _ = writeln!(out, "  [{}] {}", i + 1, job.url);
			let _ = writeln!(out, "      Error: {}", job.error.as_deref().unwrap_or("unknown"));
		}
	}

	let _ = write!(out, "\n{separator}");

	return out;
}

/// Create the summary of a url batch
pub fn batch_summary(success: usize, failed: usize) -> String {
	let separator = "=".repeat(BATCH_SEPARATOR_WIDTH);

	return format!(
		"{separator}\nBatch download complete:\n  Success: {success} video(s)\n  Failed: {failed} video(s)\n{separator}"
	);
}
