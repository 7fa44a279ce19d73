//! Module for exporting channel results as csv and writing failure logs

use std::{
	io::Write,
	path::{
		Path,
		PathBuf,
	},
};

use chrono::{
	NaiveDate,
	NaiveDateTime,
};

use crate::{
	data::{
		channel::VideoMetadata,
		job_state::{
			ChannelJob,
			Job,
			JobStatus,
		},
	},
	error::IOErrorToError,
	utils::sanitize_filename,
};

/// UTF-8 byte order mark, so that spreadsheet applications detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// File name of the failure log for url batches
pub const FAILED_LOG_NAME: &str = "failed.log";

/// Header of the exported csv
pub const CSV_HEADER: [&str; 16] = [
	"platform",
	"video_id",
	"title",
	"url",
	"duration",
	"upload_date",
	"view_count",
	"like_count",
	"comment_count",
	"repost_count",
	"coin_count",
	"favorite_count",
	"thumbnail",
	"download_date",
	"file_size",
	"status",
];

/// Get the exported status of a job
pub fn status_label(status: JobStatus) -> &'static str {
	return match status {
		JobStatus::Done => "success",
		JobStatus::Failed | JobStatus::NeedsCookies => "failed",
		JobStatus::Pending | JobStatus::Running => "pending",
	};
}

/// Get the size of `path` in bytes, if it exists
pub fn file_size(path: Option<&Path>) -> Option<u64> {
	return path
		.and_then(|v| return std::fs::metadata(v).ok())
		.filter(std::fs::Metadata::is_file)
		.map(|v| return v.len());
}

/// Format bytes as megabytes with 2 decimals ("1.50MB")
pub fn format_megabytes(bytes: u64) -> String {
	return format!("{:.2}MB", bytes as f64 / 1024.0 / 1024.0);
}

/// Get the csv file name for a channel
pub fn csv_file_name(channel_name: &str) -> String {
	return format!("{}_videos.csv", sanitize_filename(channel_name));
}

/// Format a optional count, missing counts are "0"
fn count(value: Option<u64>) -> String {
	return value.unwrap_or(0).to_string();
}

/// Assemble a single csv row for `job`
fn job_row(platform: &str, job: &Job, download_date: &str) -> Vec<String> {
	let fallback;
	let meta = match &job.metadata {
		Some(v) => v,
		None => {
			fallback = VideoMetadata {
				id: job.id.clone(),
				title: job.title.clone(),
				url: job.url.clone(),
				..Default::default()
			};
			&fallback
		},
	};

	let size = if job.status == JobStatus::Done {
		file_size(job.output_file.as_deref()).map(format_megabytes)
	} else {
		None
	};

	return vec![
		platform.to_owned(),
		meta.id.clone(),
		meta.title.clone(),
		meta.url.clone(),
		meta.duration.unwrap_or(0.0).to_string(),
		meta.upload_date.clone().unwrap_or_default(),
		count(meta.view_count),
		count(meta.like_count),
		count(meta.comment_count),
		count(meta.repost_count),
		count(meta.coin_count),
		count(meta.favorite_count),
		meta.thumbnail.clone().unwrap_or_default(),
		download_date.to_owned(),
		size.unwrap_or_else(|| return "N/A".to_owned()),
		status_label(job.status).to_owned(),
	];
}

/// Write the csv (including the BOM) of all jobs of `channel` into `writer`
pub fn write_csv<W: Write>(mut writer: W, channel: &ChannelJob, download_date: NaiveDate) -> Result<(), crate::Error> {
	writer.write_all(UTF8_BOM).attach_location_err("csv bom")?;

	let mut csv_writer = csv::Writer::from_writer(writer);
	let date = download_date.format("%Y-%m-%d").to_string();

	csv_writer.write_record(CSV_HEADER)?;

	for job in &channel.jobs {
		csv_writer.write_record(job_row(channel.channel.platform.as_str(), job, &date))?;
	}

	csv_writer.flush().attach_location_err("csv flush")?;

	return Ok(());
}

/// Export all jobs of `channel` as csv into `dir`
/// Returns the path of the written file
pub fn export_csv(channel: &ChannelJob, dir: &Path, download_date: NaiveDate) -> Result<PathBuf, crate::Error> {
	std::fs::create_dir_all(dir).attach_path_err(dir)?;

	let path = dir.join(csv_file_name(&channel.channel.channel_name));
	let file = std::fs::File::create(&path).attach_path_err(&path)?;

	write_csv(std::io::BufWriter::new(file), channel, download_date)?;
	info!("Exported csv to \"{}\"", path.display());

	return Ok(path);
}

/// A single entry of the failure log
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
	pub url:   String,
	pub error: String,
}

/// Format the failure log
pub fn format_failed_log(entries: &[FailedEntry], now: NaiveDateTime) -> String {
	let mut out = format!("Failed downloads - {}\n", now.format("%Y-%m-%d %H:%M:%S"));
	out.push_str(&"=".repeat(50));
	out.push('\n');

	for entry in entries {
		out.push_str(&format!("URL: {}\nError: {}\n\n", entry.url, entry.error));
	}

	return out;
}

/// Write the failure log into `dir`, overwriting a existing one
/// Returns the path of the written file
pub fn write_failed_log(dir: &Path, entries: &[FailedEntry], now: NaiveDateTime) -> Result<PathBuf, crate::Error> {
	let path = dir.join(FAILED_LOG_NAME);

	std::fs::write(&path, format_failed_log(entries, now)).attach_path_err(&path)?;

	return Ok(path);
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::data::channel::{
		ChannelInfo,
		Platform,
	};

	fn channel_job(jobs: Vec<Job>) -> ChannelJob {
		return ChannelJob::new(
			"https://www.youtube.com/@someone",
			ChannelInfo {
				platform:       Platform::Youtube,
				channel_name:   "Some: Channel".to_owned(),
				channel_url:    "https://www.youtube.com/@someone".to_owned(),
				follower_count: None,
				video_count:    jobs.len(),
			},
			PathBuf::from("/out"),
			jobs,
		);
	}

	#[test]
	fn test_labels() {
		assert_eq!("success", status_label(JobStatus::Done));
		assert_eq!("failed", status_label(JobStatus::Failed));
		assert_eq!("failed", status_label(JobStatus::NeedsCookies));
		assert_eq!("pending", status_label(JobStatus::Running));
		assert_eq!("pending", status_label(JobStatus::Pending));

		assert_eq!("1.50MB", format_megabytes(1024 * 1024 * 3 / 2));
		assert_eq!("0.00MB", format_megabytes(0));

		assert_eq!("Some Channel_videos.csv", csv_file_name("Some: Channel"));
	}

	#[test]
	fn test_write_csv() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-export")
			.tempdir()
			.expect("Expected a temp dir to be created");
		let media = tmp.path().join("a1.mp4");
		std::fs::write(&media, vec![0u8; 1024 * 1024]).unwrap();

		let mut done = Job::from_metadata(VideoMetadata {
			id: "a1".to_owned(),
			title: "Hello, World".to_owned(),
			url: "https://youtu.be/a1".to_owned(),
			duration: Some(61.0),
			upload_date: Some("20240101".to_owned()),
			view_count: Some(1200),
			thumbnail: Some("https://i.ytimg.com/a1.jpg".to_owned()),
			..Default::default()
		});
		done.status = JobStatus::Done;
		done.output_file = Some(media);

		let mut failed = Job::new("b2", "https://youtu.be/b2", "Second");
		failed.status = JobStatus::Failed;

		let pending = Job::new("c3", "https://youtu.be/c3", "Third");

		let mut out = Vec::new();
		write_csv(&mut out, &channel_job(vec![done, failed, pending]), NaiveDate::from_ymd_opt(2024, 2, 3).unwrap())
			.expect("Expected csv to be written");

		assert!(out.starts_with(UTF8_BOM));
		let text = String::from_utf8(out[UTF8_BOM.len()..].to_vec()).unwrap();
		let lines: Vec<&str> = text.lines().collect();

		assert_eq!(
			vec![
				"platform,video_id,title,url,duration,upload_date,view_count,like_count,comment_count,repost_count,coin_count,favorite_count,thumbnail,download_date,file_size,status",
				"youtube,a1,\"Hello, World\",https://youtu.be/a1,61,20240101,1200,0,0,0,0,0,https://i.ytimg.com/a1.jpg,2024-02-03,1.00MB,success",
				"youtube,b2,Second,https://youtu.be/b2,0,,0,0,0,0,0,0,,2024-02-03,N/A,failed",
				"youtube,c3,Third,https://youtu.be/c3,0,,0,0,0,0,0,0,,2024-02-03,N/A,pending",
			],
			lines
		);
	}

	#[test]
	fn test_export_csv_file_name() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-export")
			.tempdir()
			.expect("Expected a temp dir to be created");

		let path = export_csv(&channel_job(Vec::new()), tmp.path(), NaiveDate::from_ymd_opt(2024, 2, 3).unwrap())
			.expect("Expected export to work");

		assert_eq!(tmp.path().join("Some Channel_videos.csv"), path);
		assert!(path.exists());
	}

	#[test]
	fn test_failed_log() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-export")
			.tempdir()
			.expect("Expected a temp dir to be created");
		let now = NaiveDate::from_ymd_opt(2024, 2, 3)
			.unwrap()
			.and_hms_opt(10, 20, 30)
			.unwrap();

		let entries = vec![
			FailedEntry {
				url:   "https://youtu.be/a".to_owned(),
				error: "Video unavailable".to_owned(),
			},
			FailedEntry {
				url:   "https://youtu.be/b".to_owned(),
				error: "HTTP Error 503".to_owned(),
			},
		];

		let path = write_failed_log(tmp.path(), &entries, now).expect("Expected log to be written");

		assert_eq!(tmp.path().join("failed.log"), path);
		assert_eq!(
			format!(
				"Failed downloads - 2024-02-03 10:20:30\n{}\nURL: https://youtu.be/a\nError: Video unavailable\n\nURL: https://youtu.be/b\nError: HTTP Error 503\n\n",
				"=".repeat(50)
			),
			std::fs::read_to_string(&path).unwrap()
		);
	}
}
