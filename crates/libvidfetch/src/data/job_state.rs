//! Module for the persisted state of channel batch jobs
//!
//! The state is stored as json in [`STATE_FILE_NAME`] in the base output directory and is written after every status change

use std::{
	fs::File,
	io::{
		BufReader,
		BufWriter,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
};

use chrono::{
	DateTime,
	Utc,
};
use serde::{
	Deserialize,
	Serialize,
};

use crate::{
	data::channel::{
		ChannelInfo,
		VideoMetadata,
	},
	error::IOErrorToError,
};

/// File name of the state file, relative to the base output directory
pub const STATE_FILE_NAME: &str = "download_state.json";
/// File name of the lock file, relative to the base output directory
pub const LOCK_FILE_NAME: &str = "download_state.lock";
/// Current version of the state file format
pub const STATE_VERSION: u32 = 1;

/// Status of a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
	#[default]
	Pending,
	Running,
	Done,
	Failed,
	NeedsCookies,
}

impl JobStatus {
	/// Get whether this status will not change anymore without user interaction
	pub fn is_final(&self) -> bool {
		return matches!(self, Self::Done | Self::Failed | Self::NeedsCookies);
	}
}

impl std::fmt::Display for JobStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		return f.write_str(match self {
			Self::Pending => "pending",
			Self::Running => "running",
			Self::Done => "done",
			Self::Failed => "failed",
			Self::NeedsCookies => "needs-cookies",
		});
	}
}

/// A single media to download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub id:          String,
	pub url:         String,
	pub title:       String,
	#[serde(default)]
	pub status:      JobStatus,
	/// Amount of download attempts over all runs
	#[serde(default)]
	pub attempts:    u32,
	#[serde(default)]
	pub error:       Option<String>,
	#[serde(default)]
	pub output_file: Option<PathBuf>,
	/// Listing metadata, kept for exports after resuming
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata:    Option<VideoMetadata>,
}

impl Job {
	/// Create a new pending job
	pub fn new<I: Into<String>, U: Into<String>, T: Into<String>>(id: I, url: U, title: T) -> Self {
		return Self {
			id:          id.into(),
			url:         url.into(),
			title:       title.into(),
			status:      JobStatus::Pending,
			attempts:    0,
			error:       None,
			output_file: None,
			metadata:    None,
		};
	}

	/// Create a new pending job from listing metadata
	pub fn from_metadata(meta: VideoMetadata) -> Self {
		let mut job = Self::new(meta.id.clone(), meta.url.clone(), meta.title.clone());
		job.metadata = Some(meta);

		return job;
	}
}

/// Counts of jobs per status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
	pub pending:       usize,
	pub running:       usize,
	pub done:          usize,
	pub failed:        usize,
	pub needs_cookies: usize,
}

impl StatusCounts {
	/// Total amount of jobs counted
	pub fn total(&self) -> usize {
		return self.pending + self.running + self.done + self.failed + self.needs_cookies;
	}
}

/// All jobs of one channel download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelJob {
	/// The url the channel download was started with, used to find the channel again
	#[serde(default)]
	pub source_url: String,
	#[serde(flatten)]
	pub channel:    ChannelInfo,
	pub output_dir: PathBuf,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	#[serde(default)]
	pub jobs:       Vec<Job>,
}

impl ChannelJob {
	/// Create a new channel job started from `source_url`, with the current time as creation time
	pub fn new<S: Into<String>>(source_url: S, channel: ChannelInfo, output_dir: PathBuf, jobs: Vec<Job>) -> Self {
		let now = Utc::now();

		return Self {
			source_url: source_url.into(),
			channel,
			output_dir,
			created_at: now,
			updated_at: now,
			jobs,
		};
	}

	/// Count all jobs by status
	pub fn counts(&self) -> StatusCounts {
		let mut counts = StatusCounts::default();

		for job in &self.jobs {
			match job.status {
				JobStatus::Pending => counts.pending += 1,
				JobStatus::Running => counts.running += 1,
				JobStatus::Done => counts.done += 1,
				JobStatus::Failed => counts.failed += 1,
				JobStatus::NeedsCookies => counts.needs_cookies += 1,
			}
		}

		return counts;
	}

	/// Prepare the jobs for being run again
	///
	/// - `running` (interrupted) and `failed` jobs become `pending`
	/// - `needs-cookies` jobs only become `pending` when `has_cookies` is set
	/// - `done` jobs are kept
	///
	/// Returns the indexes of all jobs that are `pending` afterwards
	pub fn reset_for_resume(&mut self, has_cookies: bool) -> Vec<usize> {
		for job in &mut self.jobs {
			let reset = match job.status {
				JobStatus::Running | JobStatus::Failed => true,
				JobStatus::NeedsCookies => has_cookies,
				JobStatus::Pending | JobStatus::Done => false,
			};

			if reset {
				job.status = JobStatus::Pending;
				job.error = None;
			}
		}

		return self.pending_indexes();
	}

	/// Get the indexes of all `pending` jobs, in order
	pub fn pending_indexes(&self) -> Vec<usize> {
		return self
			.jobs
			.iter()
			.enumerate()
			.filter(|(_, job)| return job.status == JobStatus::Pending)
			.map(|(i, _)| return i)
			.collect();
	}

	/// Mark the channel as modified
	pub fn touch(&mut self) {
		self.updated_at = Utc::now();
	}

	/// Check if this channel was started from `url` or lists as `url`
	/// A trailing "/" is ignored
	pub fn matches_url(&self, url: &str) -> bool {
		let url = normalize_url(url);

		return (!self.source_url.is_empty() && normalize_url(&self.source_url) == url)
			|| normalize_url(&self.channel.channel_url) == url;
	}
}

/// The whole state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
	pub version:  u32,
	#[serde(default)]
	pub channels: Vec<ChannelJob>,
}

impl Default for StateFile {
	fn default() -> Self {
		return Self {
			version:  STATE_VERSION,
			channels: Vec::new(),
		};
	}
}

impl StateFile {
	/// Get the path of the state file in `base_dir`
	pub fn path_in(base_dir: &Path) -> PathBuf {
		return base_dir.join(STATE_FILE_NAME);
	}

	/// Load the state file from `base_dir`
	/// Returns a empty state if the file does not exist yet
	pub fn load(base_dir: &Path) -> Result<Self, crate::Error> {
		let path = Self::path_in(base_dir);

		if !path.exists() {
			debug!("No state file at \"{}\", starting empty", path.display());
			return Ok(Self::default());
		}

		if !path.is_file() {
			return Err(crate::Error::not_a_file("State path exists but is not a file", &path));
		}

		let reader = BufReader::new(File::open(&path).attach_path_err(&path)?);
		let state: Self = serde_json::from_reader(reader)?;

		if state.version > STATE_VERSION {
			warn!(
				"State file version {} is newer than the supported version {}",
				state.version, STATE_VERSION
			);
		}

		return Ok(state);
	}

	/// Save the state file to `base_dir`
	/// The file is first written to a temporary file and then renamed over the old state
	pub fn save(&self, base_dir: &Path) -> Result<(), crate::Error> {
		let path = Self::path_in(base_dir);
		let tmp_path = base_dir.join(format!("{STATE_FILE_NAME}.tmp"));

		std::fs::create_dir_all(base_dir).attach_path_err(base_dir)?;

		{
			let mut writer = BufWriter::new(File::create(&tmp_path).attach_path_err(&tmp_path)?);
			serde_json::to_writer_pretty(&mut writer, self)?;
			writer.write_all(b"\n").attach_path_err(&tmp_path)?;
			writer
				.into_inner()
				.map_err(std::io::IntoInnerError::into_error)
				.attach_path_err(&tmp_path)?
				.sync_all()
				.attach_path_err(&tmp_path)?;
		}

		std::fs::rename(&tmp_path, &path).attach_path_err(&path)?;

		return Ok(());
	}

	/// Find the index of the channel that was started from (or lists as) `url`
	pub fn find_channel(&self, url: &str) -> Option<usize> {
		return self.channels.iter().position(|v| return v.matches_url(url));
	}

	/// Insert `channel` or replace the channel with the same source url
	/// Returns the index of the channel
	pub fn upsert_channel(&mut self, channel: ChannelJob) -> usize {
		if let Some(index) = self.find_channel(&channel.source_url) {
			self.channels[index] = channel;
			return index;
		}

		self.channels.push(channel);
		return self.channels.len() - 1;
	}

	/// Remove all channels that have no unfinished jobs anymore
	pub fn remove_finished(&mut self) {
		self.channels.retain(|v| {
			return v.jobs.iter().any(|job| return job.status != JobStatus::Done);
		});
	}
}

/// Normalize a url for comparing
fn normalize_url(url: &str) -> &str {
	return url.trim().trim_end_matches('/');
}

/// Lock on a state directory, removed when dropped
///
/// The lock file contains the pid of the owning process
#[derive(Debug)]
pub struct StateLock {
	path: PathBuf,
}

impl StateLock {
	/// Try to acquire the lock for `base_dir`
	///
	/// An existing lock is only taken over when `is_alive` returns `false` for the pid stored in it
	pub fn acquire<F: Fn(u32) -> bool>(base_dir: &Path, is_alive: F) -> Result<Self, crate::Error> {
		let path = base_dir.join(LOCK_FILE_NAME);

		std::fs::create_dir_all(base_dir).attach_path_err(base_dir)?;

		if path.exists() {
			let content = std::fs::read_to_string(&path).attach_path_err(&path)?;

			match content.trim().parse::<u32>() {
				Ok(pid) if pid != std::process::id() && is_alive(pid) => {
					return Err(crate::Error::state_locked(
						format!("State is in use by process {pid}"),
						&path,
					));
				},
				Ok(pid) => debug!("Taking over stale state lock of pid {pid}"),
				Err(_) => debug!("Taking over unreadable state lock"),
			}
		}

		std::fs::write(&path, std::process::id().to_string()).attach_path_err(&path)?;

		return Ok(Self { path });
	}

	/// Get the path of the lock file
	pub fn path(&self) -> &Path {
		return &self.path;
	}
}

impl Drop for StateLock {
	fn drop(&mut self) {
		if let Err(err) = std::fs::remove_file(&self.path) {
			debug!("Could not remove state lock \"{}\": {err}", self.path.display());
		}
	}
}
