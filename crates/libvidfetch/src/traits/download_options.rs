//! Module for the options of downloading a single media

use std::{
	ffi::OsStr,
	path::Path,
	str::FromStr,
};

use crate::main::cookies::{
	CookieSource,
	CookieStore,
};

/// Forced maximal video height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
	P1080,
	P720,
	P480,
}

impl Quality {
	/// Get the maximal height in pixels
	pub fn height(&self) -> u32 {
		return match self {
			Self::P1080 => 1080,
			Self::P720 => 720,
			Self::P480 => 480,
		};
	}
}

impl FromStr for Quality {
	type Err = crate::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		return match s.trim().to_lowercase().trim_end_matches('p') {
			"1080" => Ok(Self::P1080),
			"720" => Ok(Self::P720),
			"480" => Ok(Self::P480),
			_ => Err(crate::Error::other(format!(
				"Unknown quality \"{s}\", expected one of 1080p, 720p, 480p"
			))),
		};
	}
}

impl std::fmt::Display for Quality {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		return write!(f, "{}p", self.height());
	}
}

/// Options specific for the [`crate::main::download::download_single`] function
///
/// Has to be [Sync], because batches share one instance between all workers
pub trait DownloadOptions: Sync {
	/// Get if the output should be audio-only (mp3)
	fn audio_only(&self) -> bool;
	/// Get the forced maximal quality, [`None`] to decide automatically
	fn quality(&self) -> Option<Quality>;
	/// Get if subtitles should be downloaded and embedded
	fn embed_subs(&self) -> bool;
	/// Get if media that is not mp4+h264+aac should be converted
	fn convert(&self) -> bool;
	/// Get the size in GB above which the automatic quality is limited to 1080p
	fn max_size_gb(&self) -> f64;
	/// Get the path to where the Media should be downloaded to, when no other directory is given
	fn download_path(&self) -> &Path;
	/// Get where cookies should come from
	fn cookie_source(&self) -> &CookieSource;
	/// Get the store of saved per-site cookie files, if any
	fn cookie_store(&self) -> Option<&CookieStore>;
	/// Get Extra Arguments that should be added to the ytdl command
	fn extra_ytdl_arguments(&self) -> Vec<&OsStr>;
	/// Get wheter or not to print out Command STDOUT (in this case ytdl)
	/// With this returning `true`, the STDOUT output is printed with [`log::trace`]
	fn print_command_log(&self) -> bool;
}
